use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quire_core::{BackendKind, Clock, Document, DocumentId, NewVersion, SystemClock};
use tracing::{debug, info, instrument};

use super::kv::KeyValueStore;
use crate::error::StorageError;
use crate::history::{next_created_at, truncate_after};
use crate::locks::DocumentLocks;
use crate::{RestoreOutcome, VersionedDocumentRepository};

/// Key prefix used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "quire-documents";

/// Repository backed by a client-local [`KeyValueStore`].
///
/// Each document's history is one JSON array stored under
/// `"{namespace}:{document_id}"`.
pub struct LocalDocumentRepository<S: KeyValueStore> {
    store: S,
    namespace: String,
    user_id: String,
    clock: Arc<dyn Clock>,
    locks: DocumentLocks,
}

impl<S: KeyValueStore> LocalDocumentRepository<S> {
    pub fn new(store: S, user_id: impl Into<String>) -> Self {
        Self {
            store,
            namespace: DEFAULT_NAMESPACE.to_string(),
            user_id: user_id.into(),
            clock: Arc::new(SystemClock),
            locks: DocumentLocks::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn key(&self, id: &DocumentId) -> String {
        format!("{}:{}", self.namespace, id)
    }

    fn load(&self, id: &DocumentId) -> Result<Vec<Document>, StorageError> {
        match self.store.get(&self.key(id))? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, id: &DocumentId, versions: &[Document]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(versions)?;
        self.store.set(&self.key(id), &raw)
    }

    /// Append onto `versions`, the history already loaded under the write
    /// lock.
    fn push_version(
        &self,
        id: &DocumentId,
        versions: &mut Vec<Document>,
        version: NewVersion,
    ) -> Result<Document, StorageError> {
        let created_at = next_created_at(versions, self.clock.now_utc());
        let document = Document::from_version(id.clone(), self.user_id.clone(), version, created_at);
        versions.push(document.clone());
        self.save(id, versions)?;
        Ok(document)
    }
}

#[async_trait]
impl<S: KeyValueStore> VersionedDocumentRepository for LocalDocumentRepository<S> {
    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn fetch(&self, id: &DocumentId) -> Result<Vec<Document>, StorageError> {
        self.load(id)
    }

    #[instrument(skip_all, fields(document = %id))]
    async fn append(&self, id: &DocumentId, version: NewVersion) -> Result<Document, StorageError> {
        let _guard = self.locks.acquire(id).await;

        let mut versions = self.load(id)?;
        let document = self.push_version(id, &mut versions, version)?;

        info!(versions = versions.len(), "Appended local version");
        Ok(document)
    }

    #[instrument(skip_all, fields(document = %id))]
    async fn bootstrap(
        &self,
        id: &DocumentId,
        initial: NewVersion,
    ) -> Result<Vec<Document>, StorageError> {
        let _guard = self.locks.acquire(id).await;

        let mut versions = self.load(id)?;
        if versions.is_empty() {
            debug!("Bootstrapping empty local history");
            self.push_version(id, &mut versions, initial)?;
        }
        Ok(versions)
    }

    #[instrument(skip_all, fields(document = %id))]
    async fn restore(
        &self,
        id: &DocumentId,
        upto: DateTime<Utc>,
    ) -> Result<RestoreOutcome, StorageError> {
        let _guard = self.locks.acquire(id).await;

        let before = self.load(id)?;
        let versions = truncate_after(&before, upto);
        let removed = before.len() - versions.len();

        if removed > 0 {
            self.save(id, &versions)?;
        } else {
            debug!("Nothing after restore point");
        }

        info!(removed, remaining = versions.len(), "Restored local history");
        Ok(RestoreOutcome {
            versions,
            removed,
            requires_reload: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{FileKeyValueStore, InMemoryKeyValueStore};
    use chrono::TimeDelta;
    use quire_core::{ArtifactKind, ManualClock};

    fn text(content: &str) -> NewVersion {
        NewVersion::new("Notes", content, ArtifactKind::Text)
    }

    #[tokio::test]
    async fn test_append_and_list_in_order() {
        let repo = LocalDocumentRepository::new(InMemoryKeyValueStore::new(), "user-1");
        let id = DocumentId::new("init");

        for content in ["a", "b", "c"] {
            repo.append(&id, text(content)).await.unwrap();
        }

        let versions = repo.list(&id).await;
        let contents: Vec<_> = versions.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
        assert!(versions.windows(2).all(|w| w[0].created_at < w[1].created_at));
        assert!(versions.iter().all(|d| d.user_id == "user-1"));
    }

    #[tokio::test]
    async fn test_uses_namespaced_key() {
        let repo = LocalDocumentRepository::new(InMemoryKeyValueStore::new(), "u")
            .with_namespace("ns");
        let id = DocumentId::new("doc");
        repo.append(&id, text("x")).await.unwrap();

        let raw = repo.store().get("ns:doc").unwrap().unwrap();
        let stored: Vec<Document> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_restore_requires_reload() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let repo = LocalDocumentRepository::new(InMemoryKeyValueStore::new(), "u")
            .with_clock(clock.clone());
        let id = DocumentId::new("local-1");

        let mut docs = Vec::new();
        for content in ["a", "b", "c", "d"] {
            clock.advance(TimeDelta::seconds(1));
            docs.push(repo.append(&id, text(content)).await.unwrap());
        }

        let outcome = repo.restore(&id, docs[1].created_at).await.unwrap();
        assert!(outcome.requires_reload);
        assert_eq!(outcome.removed, 2);
        assert_eq!(repo.list(&id).await, outcome.versions);
        assert_eq!(outcome.versions.last().unwrap().content, "b");
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_an_error() {
        let store = InMemoryKeyValueStore::new();
        store.set("quire-documents:bad", "{not json").unwrap();
        let repo = LocalDocumentRepository::new(store, "u");
        let id = DocumentId::new("bad");

        assert!(matches!(
            repo.fetch(&id).await,
            Err(StorageError::Deserialization(_))
        ));
        assert!(repo.list(&id).await.is_empty());
    }

    #[tokio::test]
    async fn test_file_backed_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = DocumentId::new("https://example.com/shared/42");
        {
            let repo =
                LocalDocumentRepository::new(FileKeyValueStore::open(dir.path()).unwrap(), "u");
            repo.append(&id, text("persisted")).await.unwrap();
        }

        let repo = LocalDocumentRepository::new(FileKeyValueStore::open(dir.path()).unwrap(), "u");
        let versions = repo.list(&id).await;
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].content, "persisted");
    }
}
