//! Error types for the artifact engine.

use quire_core::{ArtifactKind, DeltaError};
use quire_storage::StorageError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No content handler is registered for the artifact's kind.
    /// Opening a session for such an artifact is refused.
    #[error("No content handler registered for kind '{kind}'")]
    Configuration { kind: ArtifactKind },

    /// Persistence layer error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A delta payload could not be parsed.
    #[error("Malformed delta: {0}")]
    Delta(#[from] DeltaError),

    /// Content could not be turned into a document tree.
    #[error("Document tree error: {0}")]
    Tree(String),

    /// The delta channel was closed by the consumer.
    #[error("Delta stream closed")]
    StreamClosed,

    #[error("Version index {index} out of range for {len} versions")]
    VersionOutOfRange { index: usize, len: usize },

    /// The operation needs a loaded version list.
    #[error("No versions loaded")]
    NoVersions,
}

impl EngineError {
    pub fn tree(msg: impl Into<String>) -> Self {
        EngineError::Tree(msg.into())
    }

    /// Whether retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Storage(e) if e.is_transient())
    }
}
