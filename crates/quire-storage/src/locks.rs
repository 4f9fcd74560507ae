//! Per-document write ordering.

use std::sync::Arc;

use dashmap::DashMap;
use quire_core::DocumentId;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// One async mutex per document id.
///
/// Appends and restores take the same lock, so a write that arrives while a
/// restore is in flight waits for the truncation to finish.
#[derive(Debug, Default)]
pub struct DocumentLocks {
    locks: DashMap<DocumentId, Arc<Mutex<()>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to `id`'s history.
    pub async fn acquire(&self, id: &DocumentId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        trace!(document = %id, "Acquiring document write lock");
        lock.lock_owned().await
    }

    /// Whether someone currently holds the lock for `id`.
    pub fn is_locked(&self, id: &DocumentId) -> bool {
        self.locks
            .get(id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}
