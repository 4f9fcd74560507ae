//! Backend selection by document id.

use std::sync::Arc;

use quire_core::{BackendKind, DocumentId};
use tracing::debug;

use crate::VersionedDocumentRepository;
use crate::local::{InMemoryKeyValueStore, LocalDocumentRepository};
use crate::remote::{InMemoryDocumentApi, RemoteDocumentRepository};

/// Holds one repository per backend and hands out the one a document id
/// belongs to.
///
/// Resolution only looks at the id's form, so the same id always maps to the
/// same backend for the life of the process.
#[derive(Clone)]
pub struct RepositoryResolver {
    remote: Arc<dyn VersionedDocumentRepository>,
    local: Arc<dyn VersionedDocumentRepository>,
}

impl RepositoryResolver {
    pub fn new(
        remote: Arc<dyn VersionedDocumentRepository>,
        local: Arc<dyn VersionedDocumentRepository>,
    ) -> Self {
        Self { remote, local }
    }

    /// Both backends in memory: the in-process document API and an in-memory
    /// key/value store.
    pub fn in_memory(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self::new(
            Arc::new(RemoteDocumentRepository::new(InMemoryDocumentApi::new(
                user_id.clone(),
            ))),
            Arc::new(LocalDocumentRepository::new(
                InMemoryKeyValueStore::new(),
                user_id,
            )),
        )
    }

    pub fn resolve(&self, id: &DocumentId) -> Arc<dyn VersionedDocumentRepository> {
        let backend = id.backend();
        debug!(document = %id, %backend, "Resolved repository");
        match backend {
            BackendKind::Remote => Arc::clone(&self.remote),
            BackendKind::Local => Arc::clone(&self.local),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_by_id_form() {
        let resolver = RepositoryResolver::in_memory("u");
        assert_eq!(
            resolver.resolve(&DocumentId::generate()).backend(),
            BackendKind::Remote
        );
        assert_eq!(
            resolver.resolve(&DocumentId::placeholder()).backend(),
            BackendKind::Local
        );
    }

    #[test]
    fn test_resolution_is_stable() {
        let resolver = RepositoryResolver::in_memory("u");
        let id = DocumentId::generate();
        let first = resolver.resolve(&id);
        let second = resolver.resolve(&id);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
