//! Clients for the document API.
//!
//! The server exposes three routes on `/document`:
//!
//! - `GET ?id={id}` returns the ordered version list
//! - `POST ?id={id}` with `{title, content, kind}` appends a version
//! - `DELETE ?id={id}&timestamp={t}` removes versions created after `t`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use quire_core::{Clock, Document, DocumentId, NewVersion, SystemClock};
use reqwest::StatusCode;
use tracing::{debug, trace};

use crate::error::StorageError;
use crate::history::{next_created_at, truncate_after};

/// The three document API calls the remote backend needs.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    async fn get_documents(&self, id: &DocumentId) -> Result<Vec<Document>, StorageError>;

    async fn post_document(
        &self,
        id: &DocumentId,
        version: &NewVersion,
    ) -> Result<Document, StorageError>;

    async fn delete_documents_after(
        &self,
        id: &DocumentId,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

#[async_trait]
impl<T: DocumentApi + ?Sized> DocumentApi for Arc<T> {
    async fn get_documents(&self, id: &DocumentId) -> Result<Vec<Document>, StorageError> {
        (**self).get_documents(id).await
    }

    async fn post_document(
        &self,
        id: &DocumentId,
        version: &NewVersion,
    ) -> Result<Document, StorageError> {
        (**self).post_document(id, version).await
    }

    async fn delete_documents_after(
        &self,
        id: &DocumentId,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        (**self).delete_documents_after(id, timestamp).await
    }
}

/// HTTP client for the document API.
#[derive(Clone, Debug)]
pub struct HttpDocumentApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDocumentApi {
    /// Create a client for the server at `base_url` (e.g. "http://localhost:3000/api")
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/document", self.base_url)
    }
}

#[async_trait]
impl DocumentApi for HttpDocumentApi {
    async fn get_documents(&self, id: &DocumentId) -> Result<Vec<Document>, StorageError> {
        trace!(document = %id, "GET /document");
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("id", id.as_str())])
            .send()
            .await?;

        // The server answers 404 for a document that has no versions yet
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let documents = response.error_for_status()?.json::<Vec<Document>>().await?;
        Ok(documents)
    }

    async fn post_document(
        &self,
        id: &DocumentId,
        version: &NewVersion,
    ) -> Result<Document, StorageError> {
        trace!(document = %id, "POST /document");
        let document = self
            .client
            .post(self.endpoint())
            .query(&[("id", id.as_str())])
            .json(version)
            .send()
            .await?
            .error_for_status()?
            .json::<Document>()
            .await?;
        Ok(document)
    }

    async fn delete_documents_after(
        &self,
        id: &DocumentId,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let timestamp = cutoff_param(timestamp);
        trace!(document = %id, %timestamp, "DELETE /document");
        self.client
            .delete(self.endpoint())
            .query(&[("id", id.as_str()), ("timestamp", timestamp.as_str())])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// RFC 3339 form of a restore cutoff. Sub-second digits are kept in full so
/// the server never rounds the cutoff below the version being restored.
fn cutoff_param(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// In-process stand-in for the document API server.
///
/// Suitable for tests and offline runs. [`set_offline`] makes every call
/// fail with a transient error.
///
/// [`set_offline`]: InMemoryDocumentApi::set_offline
pub struct InMemoryDocumentApi {
    documents: DashMap<DocumentId, Vec<Document>>,
    user_id: String,
    clock: Arc<dyn Clock>,
    offline: AtomicBool,
}

impl InMemoryDocumentApi {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self::with_clock(user_id, Arc::new(SystemClock))
    }

    pub fn with_clock(user_id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            documents: DashMap::new(),
            user_id: user_id.into(),
            clock,
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate losing (or regaining) the connection to the server
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored versions for `id`, bypassing the offline switch
    pub fn version_count(&self, id: &DocumentId) -> usize {
        self.documents.get(id).map_or(0, |v| v.len())
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::unavailable("document API is offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentApi for InMemoryDocumentApi {
    async fn get_documents(&self, id: &DocumentId) -> Result<Vec<Document>, StorageError> {
        self.check_online()?;
        Ok(self
            .documents
            .get(id)
            .map(|v| v.value().clone())
            .unwrap_or_default())
    }

    async fn post_document(
        &self,
        id: &DocumentId,
        version: &NewVersion,
    ) -> Result<Document, StorageError> {
        self.check_online()?;
        let mut history = self.documents.entry(id.clone()).or_default();
        let created_at = next_created_at(&history, self.clock.now_utc());
        let document =
            Document::from_version(id.clone(), self.user_id.clone(), version.clone(), created_at);
        history.push(document.clone());
        debug!(document = %id, versions = history.len(), "Stored version");
        Ok(document)
    }

    async fn delete_documents_after(
        &self,
        id: &DocumentId,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.check_online()?;
        if let Some(mut history) = self.documents.get_mut(id) {
            let kept = truncate_after(&history, timestamp);
            *history = kept;
        }
        Ok(())
    }
}
