//! Error types for quire-storage
//!
//! This module defines the error types used throughout the storage crate.

use thiserror::Error;

/// Errors that can occur in repository operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error in the local store
    #[error("I/O error: {0}")]
    Io(String),

    /// The remote document API could not be reached or answered with an error
    #[error("Network error: {0}")]
    Network(String),

    /// The backend is temporarily unavailable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Requested item was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl StorageError {
    /// Create a new NotFound error
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound(item.into())
    }

    /// Create a new Network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Create a new Unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// Whether retrying the same operation later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Io(_) | StorageError::Network(_) | StorageError::Unavailable(_)
        )
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            StorageError::Deserialization(err.to_string())
        } else {
            StorageError::Serialization(err.to_string())
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StorageError::Deserialization(err.to_string())
        } else {
            StorageError::Network(err.to_string())
        }
    }
}
