//! The request-serving pipeline.
//!
//! A serve request is a path plus query parameters. The pipeline resolves the
//! storage identifier those parameters imply, tries to read it, and treats a
//! miss as data, not as failure:
//!
//! ```text
//! resolve key → cache read
//!   hit  → respond
//!   miss → no transform params?        → not found
//!          source read → missing?      → not found
//!          transform → write-through*  → respond      (* unless cache=false)
//! ```
//!
//! [`AssetPipeline`] is the explicit context object owning the storage
//! backend, naming strategy, and preset table. It is constructed once at
//! startup and handed to every request handler; there is no ambient global.
//! All methods take `&self` and the pipeline is `Send + Sync`, so callers may
//! drive it from whatever worker pool they run. Concurrent requests for the
//! same not-yet-cached variant are allowed to race; the duplicate transforms
//! produce equivalent output and the cache write is last-write-wins.

use crate::cache_key;
use crate::config::AssetServerConfig;
use crate::naming::{HashedNamingStrategy, NamingStrategy};
use crate::storage::{LocalStorageBackend, StorageBackend, StorageError, UrlContext};
use crate::transform::{self, PresetRegistry, PreviewConfig, TransformError, TransformSpec};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// An inbound request: the asset path plus its query parameters.
///
/// The query is a map, so parameter order can never influence behavior.
#[derive(Debug, Clone, Default)]
pub struct ServeRequest {
    pub path: String,
    pub query: BTreeMap<String, String>,
}

impl ServeRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Build a request from a raw query string like `w=150&h=150&mode=crop`.
    /// Later duplicates of a key win.
    pub fn from_query_str(path: impl Into<String>, query: &str) -> Self {
        let mut request = Self::new(path);
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some((k, v)) => request.query.insert(k.to_string(), v.to_string()),
                None => request.query.insert(pair.to_string(), String::new()),
            };
        }
        request
    }
}

/// A served payload.
#[derive(Debug, Clone)]
pub struct ServeResponse {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Storage(StorageError),
}

impl ServeError {
    /// HTTP-style status for the outer serving layer.
    pub fn status(&self) -> u16 {
        match self {
            ServeError::NotFound(_) => 404,
            ServeError::Transform(_) | ServeError::Storage(_) => 500,
        }
    }
}

impl From<StorageError> for ServeError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => ServeError::NotFound(id),
            other => ServeError::Storage(other),
        }
    }
}

/// Pipeline context: storage, naming, presets, preview bounds.
///
/// Built once at startup from [`AssetServerConfig`]; the preset table is
/// immutable afterwards and safe for unsynchronized concurrent reads.
pub struct AssetPipeline {
    storage: Arc<dyn StorageBackend>,
    pub(crate) naming: Box<dyn NamingStrategy>,
    presets: PresetRegistry,
    pub(crate) preview: PreviewConfig,
}

impl AssetPipeline {
    /// Production wiring: local storage under the configured upload dir,
    /// hashed-directory naming, built-in presets merged with the config's.
    pub fn new(config: &AssetServerConfig) -> Result<Self, StorageError> {
        let storage = LocalStorageBackend::new(
            &config.upload_dir,
            config.route.clone(),
            config.url_prefix.clone(),
        )?;
        Ok(Self::with_backend(
            Arc::new(storage),
            Box::new(HashedNamingStrategy::new()),
            config.preset_registry(),
            config.preview,
        ))
    }

    /// Assemble a pipeline from explicit parts (alternative backends, tests).
    pub fn with_backend(
        storage: Arc<dyn StorageBackend>,
        naming: Box<dyn NamingStrategy>,
        presets: PresetRegistry,
        preview: PreviewConfig,
    ) -> Self {
        Self {
            storage,
            naming,
            presets,
            preview,
        }
    }

    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }

    pub fn presets(&self) -> &PresetRegistry {
        &self.presets
    }

    /// Resolve a stored identifier to an absolute URL for response payloads.
    pub fn absolute_url(&self, identifier: &str, ctx: &UrlContext) -> String {
        self.storage.absolute_url(identifier, ctx)
    }

    /// Serve one request: cached bytes when present, a freshly generated and
    /// (usually) persisted variant on a transform miss, or a typed error.
    pub fn serve(&self, request: &ServeRequest) -> Result<ServeResponse, ServeError> {
        let spec = TransformSpec::from_query(&request.query);
        let key = cache_key::derive(&request.path, &spec, &self.presets);
        let plain = request.path.trim_start_matches('/');

        match self.storage.read(&key) {
            Ok(bytes) => {
                tracing::debug!(key = %key, "serving stored bytes");
                let content_type = content_type_for(&key, &bytes).to_string();
                Ok(ServeResponse { bytes, content_type })
            }
            Err(StorageError::NotFound(_)) => {
                if key == plain {
                    // Nothing transform-shaped in the query: a miss here is a
                    // plain 404, reported immediately.
                    tracing::debug!(path = %plain, "asset not found");
                    return Err(ServeError::NotFound(plain.to_string()));
                }
                self.generate_variant(plain, &key, &spec)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Miss path: load the untransformed source, run the engine, write the
    /// result through to the cache identifier, respond.
    fn generate_variant(
        &self,
        plain: &str,
        key: &str,
        spec: &TransformSpec,
    ) -> Result<ServeResponse, ServeError> {
        let source = match self.storage.read(plain) {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => {
                tracing::debug!(path = %plain, "variant requested for missing source");
                return Err(ServeError::NotFound(plain.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let output = transform::transform(&source, spec, &self.presets)?;

        if spec.cache {
            self.storage.write(key, &output.bytes)?;
            tracing::info!(key = %key, bytes = output.bytes.len(), "variant generated and cached");
        } else {
            tracing::info!(path = %plain, "variant generated, caching disabled");
        }

        Ok(ServeResponse {
            content_type: output.content_type().to_string(),
            bytes: output.bytes,
        })
    }
}

/// Content type for directly served bytes: extension first, then a content
/// sniff, then the generic binary type.
fn content_type_for(identifier: &str, bytes: &[u8]) -> &'static str {
    if let Some(mime) = mime_from_extension(identifier) {
        return mime;
    }
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => "application/octet-stream",
    }
}

/// Best-effort mime type from a filename extension.
pub fn mime_from_extension(name: &str) -> Option<&'static str> {
    let ext = name.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "tif" | "tiff" => Some("image/tiff"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::MemoryBackend;
    use crate::transform::engine::encode;
    use image::{DynamicImage, ImageFormat, RgbImage};

    fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        encode(&DynamicImage::ImageRgb8(img), ImageFormat::Jpeg).unwrap()
    }

    /// Pipeline over an in-memory backend, plus a handle for inspecting what
    /// got written.
    fn pipeline_with(files: &[(&str, &[u8])]) -> (Arc<MemoryBackend>, AssetPipeline) {
        let backend = Arc::new(MemoryBackend::with_files(files));
        let pipeline = AssetPipeline::with_backend(
            backend.clone(),
            Box::new(HashedNamingStrategy::new()),
            PresetRegistry::new(),
            PreviewConfig::default(),
        );
        (backend, pipeline)
    }

    // =========================================================================
    // Direct serve
    // =========================================================================

    #[test]
    fn direct_serve_returns_stored_bytes() {
        let jpeg = test_jpeg(10, 10);
        let (_backend, pipeline) = pipeline_with(&[("source/ab/photo.jpg", &jpeg)]);

        let response = pipeline
            .serve(&ServeRequest::new("/source/ab/photo.jpg"))
            .unwrap();
        assert_eq!(response.bytes, jpeg);
        assert_eq!(response.content_type, "image/jpeg");
    }

    #[test]
    fn missing_asset_without_params_is_404() {
        let (_backend, pipeline) = pipeline_with(&[]);
        let err = pipeline.serve(&ServeRequest::new("/nope.jpg")).unwrap_err();
        assert!(matches!(&err, ServeError::NotFound(path) if path == "nope.jpg"));
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn missing_source_with_params_is_404_without_transform() {
        // Storing nothing at all: if the engine ran it would fail loudly on
        // empty input, so a clean NotFound proves it was never invoked.
        let (_backend, pipeline) = pipeline_with(&[]);
        let request = ServeRequest::from_query_str("/nope.jpg", "w=50&h=50&mode=crop");
        let err = pipeline.serve(&request).unwrap_err();
        assert!(matches!(err, ServeError::NotFound(_)));
    }

    #[test]
    fn malformed_params_fall_through_to_direct_serve() {
        let jpeg = test_jpeg(10, 10);
        let (_backend, pipeline) = pipeline_with(&[("photo.jpg", &jpeg)]);

        let request = ServeRequest::from_query_str("photo.jpg", "w=abc");
        let response = pipeline.serve(&request).unwrap();
        assert_eq!(response.bytes, jpeg);
    }

    // =========================================================================
    // Transform miss path
    // =========================================================================

    #[test]
    fn transform_miss_generates_caches_and_serves() {
        let jpeg = test_jpeg(200, 100);
        let (backend, pipeline) = pipeline_with(&[("photo.jpg", &jpeg)]);

        let request = ServeRequest::from_query_str("photo.jpg", "w=50&h=50&mode=crop");
        let response = pipeline.serve(&request).unwrap();

        let img = image::load_from_memory(&response.bytes).unwrap();
        assert_eq!((img.width(), img.height()), (50, 50));
        assert_eq!(response.content_type, "image/jpeg");

        // Exactly one cache entry was written, under cache/
        let names = backend.stored_names();
        let cached: Vec<&String> = names.iter().filter(|n| n.starts_with("cache/")).collect();
        assert_eq!(cached.len(), 1);
        assert!(cached[0].ends_with(".jpg"));
    }

    #[test]
    fn repeated_request_is_served_from_cache_byte_identical() {
        let jpeg = test_jpeg(200, 100);
        let (_backend, pipeline) = pipeline_with(&[("photo.jpg", &jpeg)]);
        let request = ServeRequest::from_query_str("photo.jpg", "w=50&h=50");

        let first = pipeline.serve(&request).unwrap();
        let second = pipeline.serve(&request).unwrap();
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn equivalent_queries_share_one_cache_entry() {
        let jpeg = test_jpeg(200, 100);
        let (backend, pipeline) = pipeline_with(&[("photo.jpg", &jpeg)]);

        pipeline
            .serve(&ServeRequest::from_query_str("photo.jpg", "w=50&h=50&mode=crop"))
            .unwrap();
        pipeline
            .serve(&ServeRequest::from_query_str("photo.jpg", "mode=crop&h=50&w=50"))
            .unwrap();

        let names = backend.stored_names();
        assert_eq!(names.iter().filter(|n| n.starts_with("cache/")).count(), 1);
    }

    #[test]
    fn cache_false_never_writes() {
        let jpeg = test_jpeg(200, 100);
        let (backend, pipeline) = pipeline_with(&[("photo.jpg", &jpeg)]);

        let request = ServeRequest::from_query_str("photo.jpg", "w=50&h=50&cache=false");
        pipeline.serve(&request).unwrap();
        pipeline.serve(&request).unwrap();

        let names = backend.stored_names();
        assert!(names.iter().all(|n| !n.starts_with("cache/")), "{names:?}");
    }

    #[test]
    fn preset_request_generates_preset_geometry() {
        let jpeg = test_jpeg(400, 300);
        let (_backend, pipeline) = pipeline_with(&[("photo.jpg", &jpeg)]);

        let response = pipeline
            .serve(&ServeRequest::from_query_str("photo.jpg", "preset=tiny"))
            .unwrap();
        let img = image::load_from_memory(&response.bytes).unwrap();
        assert_eq!((img.width(), img.height()), (50, 50));
    }

    #[test]
    fn unknown_preset_without_dimensions_serves_plain_asset() {
        let jpeg = test_jpeg(40, 30);
        let (_backend, pipeline) = pipeline_with(&[("photo.jpg", &jpeg)]);

        let response = pipeline
            .serve(&ServeRequest::from_query_str("photo.jpg", "preset=nope"))
            .unwrap();
        assert_eq!(response.bytes, jpeg);
    }

    #[test]
    fn corrupt_source_surfaces_transform_error_as_500() {
        let (_backend, pipeline) = pipeline_with(&[("bad.jpg", b"not an image")]);

        let request = ServeRequest::from_query_str("bad.jpg", "w=50&h=50");
        let err = pipeline.serve(&request).unwrap_err();
        assert!(matches!(err, ServeError::Transform(_)));
        assert_eq!(err.status(), 500);
    }

    // =========================================================================
    // Content types
    // =========================================================================

    #[test]
    fn content_type_sniffs_when_extension_is_unknown() {
        let jpeg = test_jpeg(10, 10);
        let (_backend, pipeline) = pipeline_with(&[("blob.bin", &jpeg)]);

        let response = pipeline.serve(&ServeRequest::new("blob.bin")).unwrap();
        assert_eq!(response.content_type, "image/jpeg");
    }

    #[test]
    fn content_type_falls_back_to_octet_stream() {
        let (_backend, pipeline) = pipeline_with(&[("data.bin", b"\x00\x01\x02")]);

        let response = pipeline.serve(&ServeRequest::new("data.bin")).unwrap();
        assert_eq!(response.content_type, "application/octet-stream");
    }

    #[test]
    fn mime_from_extension_table() {
        assert_eq!(mime_from_extension("a.JPG"), Some("image/jpeg"));
        assert_eq!(mime_from_extension("a.svg"), Some("image/svg+xml"));
        assert_eq!(mime_from_extension("a.tiff"), Some("image/tiff"));
        assert_eq!(mime_from_extension("a.xyz"), None);
    }

    // =========================================================================
    // Request building
    // =========================================================================

    #[test]
    fn from_query_str_parses_pairs() {
        let request = ServeRequest::from_query_str("/p.jpg", "w=150&h=150&cache=false");
        assert_eq!(request.query.get("w").unwrap(), "150");
        assert_eq!(request.query.get("cache").unwrap(), "false");
    }

    #[test]
    fn with_param_builds_equivalent_requests() {
        let jpeg = test_jpeg(200, 100);
        let (_backend, pipeline) = pipeline_with(&[("photo.jpg", &jpeg)]);

        let built = ServeRequest::new("photo.jpg")
            .with_param("w", "50")
            .with_param("h", "50");
        let parsed = ServeRequest::from_query_str("photo.jpg", "w=50&h=50");

        let a = pipeline.serve(&built).unwrap();
        let b = pipeline.serve(&parsed).unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn absolute_url_passes_through_the_backend() {
        let (_backend, pipeline) = pipeline_with(&[]);
        let ctx = UrlContext {
            scheme: "https",
            host: "example.com",
        };
        // MemoryBackend keeps the trait default: identity.
        assert_eq!(pipeline.absolute_url("source/ab/x.jpg", &ctx), "source/ab/x.jpg");
    }

    #[test]
    fn from_query_str_handles_empty_and_valueless() {
        let request = ServeRequest::from_query_str("/p.jpg", "");
        assert!(request.query.is_empty());

        let request = ServeRequest::from_query_str("/p.jpg", "flag&w=10");
        assert_eq!(request.query.get("flag").unwrap(), "");
        assert_eq!(request.query.get("w").unwrap(), "10");
    }
}
