use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id a fresh artifact carries before the stream assigns a real one.
pub const PLACEHOLDER_ID: &str = "init";

/// Which persistence backend owns a document's history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Server-side store reached through the document API.
    Remote,
    /// Client-local keyed store.
    Local,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Remote => f.write_str("remote"),
            BackendKind::Local => f.write_str("local"),
        }
    }
}

/// Identifier shared by every version of one document.
///
/// The textual form decides the backend once and for all: server-assigned
/// ids are UUIDs, everything else (the `init` placeholder, URL-like ids,
/// `local-…` ids) lives in local storage.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The placeholder id of an artifact that has not been assigned one yet.
    pub fn placeholder() -> Self {
        Self(PLACEHOLDER_ID.to_string())
    }

    /// Generate a fresh server-style id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Generate a fresh id that routes to local storage.
    pub fn generate_local() -> Self {
        Self(format!("local-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == PLACEHOLDER_ID
    }

    /// Static classification of this id's backend.
    pub fn backend(&self) -> BackendKind {
        if Uuid::parse_str(&self.0).is_ok() {
            BackendKind::Remote
        } else {
            BackendKind::Local
        }
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_routes_remote() {
        let id = DocumentId::generate();
        assert_eq!(id.backend(), BackendKind::Remote);
    }

    #[test]
    fn test_non_uuid_routes_local() {
        for raw in ["init", "https://example.com/doc/1", "local-abc", "doc1"] {
            assert_eq!(DocumentId::new(raw).backend(), BackendKind::Local, "{raw}");
        }
    }

    #[test]
    fn test_generated_local_id_routes_local() {
        let id = DocumentId::generate_local();
        assert!(id.as_str().starts_with("local-"));
        assert_eq!(id.backend(), BackendKind::Local);
    }

    #[test]
    fn test_classification_is_stable() {
        let id = DocumentId::new("5f0c1a52-52b4-4bd5-9bd6-8a0f7a4c3e21");
        let first = id.backend();
        for _ in 0..10 {
            assert_eq!(id.backend(), first);
        }
    }

    #[test]
    fn test_placeholder() {
        assert!(DocumentId::placeholder().is_placeholder());
        assert!(!DocumentId::new("doc1").is_placeholder());
    }
}
