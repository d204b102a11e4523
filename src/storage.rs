//! Durable byte storage behind an opaque-identifier contract.
//!
//! The [`StorageBackend`] trait is the seam between the pipeline and where
//! bytes actually live. Identifiers issued by [`StorageBackend::write`] are
//! opaque to callers and must round-trip through [`StorageBackend::read`];
//! for the local backend they happen to be upload-root-relative paths, but
//! nothing above this module may rely on that.
//!
//! [`LocalStorageBackend`] is the reference implementation. An object-store
//! backend would implement the same four operations; `exists` in particular
//! must stay a cheap, non-failing probe because the naming conflict loop and
//! the serve pipeline's read-before-generate check both hammer it.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("no stored file at '{0}'")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Request-derived context for building absolute URLs when no static prefix
/// is configured.
#[derive(Debug, Clone, Copy)]
pub struct UrlContext<'a> {
    pub scheme: &'a str,
    pub host: &'a str,
}

/// Durable key/value byte store.
///
/// Concurrent writes to different names must not interfere; concurrent writes
/// to the same name are last-write-wins, no locking contract.
pub trait StorageBackend: Send + Sync {
    /// Persist `bytes` under `name`, creating intermediate containers as
    /// needed, and return the identifier to retrieve them later.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Read the blob at `identifier`. [`StorageError::NotFound`] when absent.
    fn read(&self, identifier: &str) -> Result<Vec<u8>, StorageError>;

    /// Non-throwing existence probe.
    fn exists(&self, name: &str) -> bool;

    /// Resolve an identifier to an absolute URL.
    ///
    /// Optional capability; the default implementation returns the identifier
    /// unchanged for backends that already issue absolute URLs.
    fn absolute_url(&self, identifier: &str, _ctx: &UrlContext) -> String {
        identifier.to_string()
    }
}

/// Filesystem-backed storage rooted at a configured upload directory.
pub struct LocalStorageBackend {
    upload_dir: PathBuf,
    route: String,
    url_prefix: Option<String>,
}

impl LocalStorageBackend {
    /// Create a backend rooted at `upload_dir`, creating the directory if
    /// missing. `route` is the URL path segment under which the serving layer
    /// exposes assets; `url_prefix`, when set, short-circuits URL derivation.
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        route: impl Into<String>,
        url_prefix: Option<String>,
    ) -> Result<Self, StorageError> {
        let upload_dir = upload_dir.into();
        std::fs::create_dir_all(&upload_dir)?;
        Ok(Self {
            upload_dir,
            route: route.into(),
            url_prefix,
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    fn identifier_to_path(&self, identifier: &str) -> PathBuf {
        self.upload_dir.join(identifier)
    }
}

/// Strip leading path separators so identifiers are always relative.
fn clean_identifier(name: &str) -> String {
    name.trim_start_matches(['/', '\\']).to_string()
}

impl StorageBackend for LocalStorageBackend {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let identifier = clean_identifier(name);
        let path = self.identifier_to_path(&identifier);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(identifier)
    }

    fn read(&self, identifier: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.identifier_to_path(identifier);
        std::fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound(identifier.to_string())
            } else {
                StorageError::Io(e)
            }
        })
    }

    fn exists(&self, name: &str) -> bool {
        self.identifier_to_path(name).exists()
    }

    fn absolute_url(&self, identifier: &str, ctx: &UrlContext) -> String {
        let prefix = match &self.url_prefix {
            Some(p) => p.clone(),
            None => format!("{}://{}/{}/", ctx.scheme, ctx.host, self.route),
        };
        // Already-absolute identifiers pass through untouched.
        if identifier.starts_with(&prefix) {
            identifier.to_string()
        } else {
            format!("{prefix}{identifier}")
        }
    }
}
