//! # Quire Storage
//!
//! Versioned document repositories for Quire.
//!
//! A document's history is the ordered list of immutable [`Document`]
//! versions sharing one [`DocumentId`]. This crate exposes that history
//! through a single [`VersionedDocumentRepository`] trait with two
//! interchangeable backends:
//!
//! - **RemoteDocumentRepository**: talks to the document API over a
//!   [`DocumentApi`] (HTTP in production, in-memory for tests), caching the
//!   last known list and truncating it optimistically on restore
//! - **LocalDocumentRepository**: reads and writes a client-local
//!   [`KeyValueStore`] synchronously (in-memory or one JSON file per document)
//!
//! [`RepositoryResolver`] picks the backend once per document id from the
//! id's form, so callers never branch on the backend themselves.
//!
//! ## Example
//!
//! ```rust,ignore
//! use quire_core::{ArtifactKind, DocumentId, NewVersion};
//! use quire_storage::RepositoryResolver;
//!
//! #[tokio::main]
//! async fn main() {
//!     let resolver = RepositoryResolver::in_memory("user-1");
//!     let id = DocumentId::new("local-notes");
//!     let repo = resolver.resolve(&id);
//!
//!     repo.append(&id, NewVersion::new("Notes", "first", ArtifactKind::Text)).await.unwrap();
//!     repo.append(&id, NewVersion::new("Notes", "second", ArtifactKind::Text)).await.unwrap();
//!
//!     let versions = repo.list(&id).await;
//!     assert_eq!(versions.len(), 2);
//! }
//! ```

pub mod error;
pub mod history;
pub mod local;
pub mod locks;
pub mod remote;
pub mod resolver;

// Re-exports
pub use error::StorageError;
pub use local::{
    DEFAULT_NAMESPACE, FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore,
    LocalDocumentRepository,
};
pub use locks::DocumentLocks;
pub use remote::{DocumentApi, HttpDocumentApi, InMemoryDocumentApi, RemoteDocumentRepository};
pub use resolver::RepositoryResolver;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quire_core::{BackendKind, Document, DocumentId, NewVersion};
use tracing::warn;

/// Result of truncating a history with [`VersionedDocumentRepository::restore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// The history after truncation, in creation order.
    pub versions: Vec<Document>,
    /// Number of versions that were removed.
    pub removed: usize,
    /// The consuming view must reload: the backend has no channel to notify
    /// other readers of the change.
    pub requires_reload: bool,
}

/// Uniform CRUD + version-list contract over one document history.
///
/// Both backends keep versions in creation order, with strictly increasing
/// `created_at`, and never modify an existing version. Appends and restores
/// for the same document are serialized, so a write issued during a restore
/// lands after the truncation instead of resurrecting removed versions.
#[async_trait]
pub trait VersionedDocumentRepository: Send + Sync {
    /// Which backend this is
    fn backend(&self) -> BackendKind;

    /// Read every version of a document, oldest first
    ///
    /// # Errors
    ///
    /// Returns the backend failure as-is. Views should use [`list`] which
    /// degrades failures to an empty history.
    ///
    /// [`list`]: VersionedDocumentRepository::list
    async fn fetch(&self, id: &DocumentId) -> Result<Vec<Document>, StorageError>;

    /// Read every version of a document, oldest first
    ///
    /// A failed read is reported as "no documents yet" so the view keeps
    /// working; the next read retries.
    async fn list(&self, id: &DocumentId) -> Vec<Document> {
        match self.fetch(id).await {
            Ok(versions) => versions,
            Err(e) => {
                warn!(document = %id, backend = %self.backend(), error = %e, "Failed to read version list, reporting empty history");
                Vec::new()
            }
        }
    }

    /// Append a new version at the end of the history
    async fn append(&self, id: &DocumentId, version: NewVersion) -> Result<Document, StorageError>;

    /// Remove every version created strictly after `upto`
    ///
    /// Either the whole truncation is applied or none of it is.
    async fn restore(
        &self,
        id: &DocumentId,
        upto: DateTime<Utc>,
    ) -> Result<RestoreOutcome, StorageError>;

    /// Make sure a history exists, synthesizing a first version from
    /// `initial` when the backend has none
    ///
    /// The check and the write hold the document's write lock, so concurrent
    /// bootstraps create at most one initial version.
    async fn bootstrap(
        &self,
        id: &DocumentId,
        initial: NewVersion,
    ) -> Result<Vec<Document>, StorageError>;
}
