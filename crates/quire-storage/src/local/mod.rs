//! Local backend: document histories held in a client-local keyed store.

mod kv;
mod repository;

pub use kv::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore};
pub use repository::{DEFAULT_NAMESPACE, LocalDocumentRepository};
