//! Error types for quire-core

use thiserror::Error;

/// A delta record whose payload cannot be interpreted.
///
/// Malformed deltas are never fatal: the ingestion engine logs them and keeps
/// consuming the stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeltaError {
    #[error("delta `{delta_type}` expects a string payload")]
    ExpectedText { delta_type: String },

    #[error("unknown artifact kind: {0}")]
    UnknownKind(String),

    #[error("invalid suggestion payload: {0}")]
    InvalidSuggestion(String),

    #[error("invalid delta record: {0}")]
    InvalidRecord(String),
}

impl DeltaError {
    pub fn expected_text(delta_type: impl Into<String>) -> Self {
        Self::ExpectedText {
            delta_type: delta_type.into(),
        }
    }
}

impl From<serde_json::Error> for DeltaError {
    fn from(err: serde_json::Error) -> Self {
        DeltaError::InvalidRecord(err.to_string())
    }
}
