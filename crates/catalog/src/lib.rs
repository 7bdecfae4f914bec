//! SQLite-backed item store for the metadata engine.

pub mod db;
pub mod schema;
pub mod services;
pub mod sidecar;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use services::{CatalogStore, TagsCache, TemplateLibrary};
pub use sidecar::{JsonSidecar, SidecarDocument};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sidecar parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl From<CatalogError> for engine::EngineError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Io(io) => engine::EngineError::Io(io),
            other => engine::EngineError::FileMetadata(other.to_string()),
        }
    }
}

pub const CATALOG_EXTENSION: &str = "tesseracatalog";

/// Catalog file path with the catalog extension enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPath(PathBuf);

impl CatalogPath {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let mut normalized = path.as_ref().to_path_buf();
        if normalized
            .extension()
            .and_then(|s| s.to_str())
            .map_or(true, |ext| !ext.eq_ignore_ascii_case(CATALOG_EXTENSION))
        {
            normalized.set_extension(CATALOG_EXTENSION);
        }
        Self(normalized)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path(self) -> PathBuf {
        self.0
    }
}
