//! Asset ingestion: naming, storing, and preview generation.
//!
//! The upload collaborator (an HTTP endpoint, the CLI) hands the pipeline a
//! filename, a mime type, and the raw bytes. The pipeline:
//!
//! 1. generates a collision-free storage name (bounded conflict loop),
//! 2. persists the source and reads it back through the storage contract,
//! 3. generates and persists the preview blob,
//! 4. returns an [`AssetDescriptor`] for the external persistence layer.
//!
//! Undecodable image uploads do not fail the ingest: they fall back to the
//! generic preview, since the source bytes may still be perfectly servable.

use crate::naming::{NamingError, generate_unique_name};
use crate::serve::AssetPipeline;
use crate::storage::StorageError;
use crate::transform::{TransformError, generate_preview, generic_preview};
use serde::Serialize;
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("naming failed: {0}")]
    Naming(#[from] NamingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("preview generation failed: {0}")]
    Preview(#[from] TransformError),
}

/// Coarse asset classification by mime major type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Image,
    Video,
    Binary,
}

impl AssetType {
    pub fn from_mime(mime_type: &str) -> Self {
        match mime_type.split('/').next() {
            Some("image") => AssetType::Image,
            Some("video") => AssetType::Video,
            _ => AssetType::Binary,
        }
    }
}

/// Input handed to the pipeline by the upload collaborator.
#[derive(Debug, Clone)]
pub struct AssetUpload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Persisted-asset record returned to the caller.
///
/// `source` and `preview` are storage identifiers; everything else is
/// metadata for the external persistence layer.
#[derive(Debug, Clone, Serialize)]
pub struct AssetDescriptor {
    pub asset_type: AssetType,
    /// Stored basename after normalization and conflict resolution.
    pub name: String,
    /// The original filename, untouched.
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub mime_type: String,
    pub source: String,
    pub preview: String,
}

impl AssetPipeline {
    /// Ingest one asset: store its source and preview, return the descriptor.
    pub fn create_asset(&self, upload: AssetUpload) -> Result<AssetDescriptor, UploadError> {
        let source_name = generate_unique_name(
            &upload.filename,
            |original, conflict| self.naming.generate_source_name(original, conflict),
            |name| self.storage().exists(name),
        )?;
        let preview_name = generate_unique_name(
            &source_name,
            |source, conflict| self.naming.generate_preview_name(source, conflict),
            |name| self.storage().exists(name),
        )?;

        let source_id = self.storage().write(&source_name, &upload.bytes)?;
        // Read back through the storage contract rather than trusting the
        // in-flight buffer; this is the identifier round-trip the rest of
        // the system depends on.
        let source_bytes = self.storage().read(&source_id)?;

        let preview_bytes =
            match generate_preview(&upload.mime_type, &source_bytes, &self.preview) {
                Ok(bytes) => bytes,
                Err(TransformError::Decode(reason)) => {
                    tracing::warn!(
                        filename = %upload.filename,
                        %reason,
                        "image undecodable, using generic preview"
                    );
                    generic_preview(&upload.mime_type)?
                }
                Err(err) => return Err(err.into()),
            };
        let preview_id = self.storage().write(&preview_name, &preview_bytes)?;

        let asset_type = AssetType::from_mime(&upload.mime_type);
        // Image dimensions come from the source; for other assets the
        // preview is the only thing with a size.
        let (width, height) = match asset_type {
            AssetType::Image => dimensions_of(&source_bytes),
            _ => dimensions_of(&preview_bytes),
        };

        tracing::info!(
            source = %source_id,
            preview = %preview_id,
            size = source_bytes.len(),
            "asset stored"
        );

        Ok(AssetDescriptor {
            asset_type,
            name: basename(&source_id).to_string(),
            title: upload.filename,
            width,
            height,
            file_size: source_bytes.len() as u64,
            mime_type: upload.mime_type,
            source: source_id,
            preview: preview_id,
        })
    }
}

/// Best-effort dimensions probe; `(0, 0)` when the bytes aren't a readable
/// image.
fn dimensions_of(bytes: &[u8]) -> (u32, u32) {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok())
        .unwrap_or((0, 0))
}

fn basename(identifier: &str) -> &str {
    identifier.rsplit('/').next().unwrap_or(identifier)
}
