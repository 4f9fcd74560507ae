use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use quire_core::{BackendKind, Document, DocumentId, NewVersion};
use tracing::{debug, info, instrument, warn};

use super::api::DocumentApi;
use crate::error::StorageError;
use crate::history::truncate_after;
use crate::locks::DocumentLocks;
use crate::{RestoreOutcome, VersionedDocumentRepository};

/// Repository backed by the document API.
///
/// Keeps the last list it saw for each document. Restores truncate that list
/// optimistically before the delete request goes out, then replace it with
/// the server's list once the request succeeds; a failed request puts the
/// previous list back.
pub struct RemoteDocumentRepository<A: DocumentApi> {
    api: A,
    cache: DashMap<DocumentId, Vec<Document>>,
    locks: DocumentLocks,
}

impl<A: DocumentApi> RemoteDocumentRepository<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            cache: DashMap::new(),
            locks: DocumentLocks::new(),
        }
    }

    /// The last version list seen for `id`, if any
    pub fn cached(&self, id: &DocumentId) -> Option<Vec<Document>> {
        self.cache.get(id).map(|v| v.value().clone())
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

#[async_trait]
impl<A: DocumentApi> VersionedDocumentRepository for RemoteDocumentRepository<A> {
    fn backend(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn fetch(&self, id: &DocumentId) -> Result<Vec<Document>, StorageError> {
        let versions = self.api.get_documents(id).await?;
        self.cache.insert(id.clone(), versions.clone());
        Ok(versions)
    }

    #[instrument(skip_all, fields(document = %id))]
    async fn append(&self, id: &DocumentId, version: NewVersion) -> Result<Document, StorageError> {
        let _guard = self.locks.acquire(id).await;

        let document = self.api.post_document(id, &version).await?;
        if let Some(mut cached) = self.cache.get_mut(id) {
            cached.push(document.clone());
        }
        info!(created_at = %document.created_at, "Appended remote version");
        Ok(document)
    }

    #[instrument(skip_all, fields(document = %id))]
    async fn bootstrap(
        &self,
        id: &DocumentId,
        initial: NewVersion,
    ) -> Result<Vec<Document>, StorageError> {
        let _guard = self.locks.acquire(id).await;

        let existing = self.fetch(id).await?;
        if !existing.is_empty() {
            return Ok(existing);
        }

        debug!("Bootstrapping empty remote history");
        let first = self.api.post_document(id, &initial).await?;
        let versions = vec![first];
        self.cache.insert(id.clone(), versions.clone());
        Ok(versions)
    }

    #[instrument(skip_all, fields(document = %id))]
    async fn restore(
        &self,
        id: &DocumentId,
        upto: DateTime<Utc>,
    ) -> Result<RestoreOutcome, StorageError> {
        let _guard = self.locks.acquire(id).await;

        let before = match self.cached(id) {
            Some(versions) => versions,
            None => self.fetch(id).await?,
        };

        // Phase one: optimistic truncation of the local list
        let optimistic = truncate_after(&before, upto);
        self.cache.insert(id.clone(), optimistic.clone());
        debug!(
            before = before.len(),
            after = optimistic.len(),
            "Applied optimistic truncation"
        );

        if let Err(e) = self.api.delete_documents_after(id, upto).await {
            warn!(error = %e, "Restore request failed, rolling back optimistic truncation");
            self.cache.insert(id.clone(), before);
            return Err(e);
        }

        // Phase two: the server's list is ground truth
        let versions = match self.api.get_documents(id).await {
            Ok(server) => {
                if server != optimistic {
                    warn!(
                        optimistic = optimistic.len(),
                        server = server.len(),
                        "Server history differs from optimistic truncation, using server"
                    );
                }
                self.cache.insert(id.clone(), server.clone());
                server
            }
            Err(e) => {
                warn!(error = %e, "Could not confirm restore, keeping optimistic list");
                optimistic
            }
        };

        let removed = before.len().saturating_sub(versions.len());
        info!(removed, remaining = versions.len(), "Restored remote history");
        Ok(RestoreOutcome {
            versions,
            removed,
            requires_reload: false,
        })
    }
}
