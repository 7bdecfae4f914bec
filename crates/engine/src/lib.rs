//! Metadata reconciliation across a multi-item selection.
//!
//! [`DisjointMetadataSet`] merges the metadata of every selected item, tracks
//! per-field agreement and writes user edits back through an [`ItemSink`].
//! [`MetadataHub`] handles the single-item case of pushing catalog values into
//! file metadata.

pub mod collaborators;
pub mod disjoint;
pub mod hub;
pub mod lazy_sync;
pub mod notify;

#[cfg(test)]
pub(crate) mod testing;

pub use collaborators::{
    FacesMap, FileMetadataSink, ItemSink, ItemSnapshot, ItemSource, TagRegistry, TemplateLookup,
};
pub use disjoint::{DisjointMetadataFields, DisjointMetadataSet, WriteMode};
pub use hub::{cleanup_tags, sync_changed_fields, MetadataHub};
pub use lazy_sync::PendingWrites;
pub use notify::{AlbumRef, ChangeQueue, NotificationHub, PendingChanges};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("File metadata error: {0}")]
    FileMetadata(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
