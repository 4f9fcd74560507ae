//! Session configuration and presets.
//!
//! Provides sensible defaults with the ability to customize behavior
//! through builder-style `with_*` methods.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use quire_storage::{
    DEFAULT_NAMESPACE, FileKeyValueStore, HttpDocumentApi, InMemoryDocumentApi,
    InMemoryKeyValueStore, LocalDocumentRepository, RemoteDocumentRepository, RepositoryResolver,
    VersionedDocumentRepository,
};

use crate::error::Result;

/// Preset configurations for common use cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Balanced defaults for general use.
    #[default]
    Default,
    /// Snappier autosave for live editing.
    /// - Short debounce (500ms)
    Interactive,
    /// No network access.
    /// - Remote ids are served by an in-process document API
    Offline,
}

impl Preset {
    /// Autosave debounce in milliseconds for this preset.
    pub fn autosave_debounce_ms(&self) -> u64 {
        match self {
            Preset::Default => 2000,
            Preset::Interactive => 500,
            Preset::Offline => 2000,
        }
    }
}

/// Character-count windows inside which a streaming artifact is revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealThresholds {
    pub text: RangeInclusive<usize>,
    pub code: RangeInclusive<usize>,
}

impl Default for RevealThresholds {
    fn default() -> Self {
        Self {
            text: 400..=450,
            code: 300..=310,
        }
    }
}

/// Configuration for an [`ArtifactSession`](crate::ArtifactSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Owner recorded on every version written.
    pub user_id: String,
    /// Delay between the last edit and the autosave write.
    pub autosave_debounce_ms: u64,
    /// Base URL of the document API, e.g. `http://localhost:3000/api`.
    pub remote_base_url: Option<String>,
    /// Key prefix for the local store.
    pub local_namespace: String,
    /// Directory for the file-backed local store. In memory when unset.
    pub local_dir: Option<PathBuf>,
    pub reveal_thresholds: RevealThresholds,
    pub preset: Preset,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            autosave_debounce_ms: Preset::Default.autosave_debounce_ms(),
            remote_base_url: None,
            local_namespace: DEFAULT_NAMESPACE.to_string(),
            local_dir: None,
            reveal_thresholds: RevealThresholds::default(),
            preset: Preset::Default,
        }
    }
}

impl SessionConfig {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Start from a preset's defaults.
    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self.autosave_debounce_ms = preset.autosave_debounce_ms();
        if preset == Preset::Offline {
            self.remote_base_url = None;
        }
        self
    }

    pub fn with_autosave_debounce(mut self, debounce: Duration) -> Self {
        self.autosave_debounce_ms = debounce.as_millis() as u64;
        self
    }

    pub fn with_remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.remote_base_url = Some(url.into());
        self
    }

    pub fn with_local_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.local_namespace = namespace.into();
        self
    }

    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = Some(dir.into());
        self
    }

    pub fn with_reveal_thresholds(mut self, thresholds: RevealThresholds) -> Self {
        self.reveal_thresholds = thresholds;
        self
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Build the repository resolver this configuration describes.
    ///
    /// The remote backend speaks HTTP when a base URL is set and the preset
    /// allows network access; otherwise it is served in-process. The local
    /// backend is file-backed when `local_dir` is set.
    pub fn build_resolver(&self) -> Result<RepositoryResolver> {
        let remote: Arc<dyn VersionedDocumentRepository> =
            match (&self.remote_base_url, self.preset) {
                (Some(url), preset) if preset != Preset::Offline => {
                    debug!(%url, "Using HTTP document API");
                    Arc::new(RemoteDocumentRepository::new(HttpDocumentApi::new(url)))
                }
                _ => Arc::new(RemoteDocumentRepository::new(InMemoryDocumentApi::new(
                    self.user_id.clone(),
                ))),
            };

        let local: Arc<dyn VersionedDocumentRepository> = match &self.local_dir {
            Some(dir) => {
                debug!(path = ?dir, "Using file-backed local store");
                Arc::new(
                    LocalDocumentRepository::new(
                        FileKeyValueStore::open(dir)?,
                        self.user_id.clone(),
                    )
                    .with_namespace(self.local_namespace.clone()),
                )
            }
            None => Arc::new(
                LocalDocumentRepository::new(InMemoryKeyValueStore::new(), self.user_id.clone())
                    .with_namespace(self.local_namespace.clone()),
            ),
        };

        Ok(RepositoryResolver::new(remote, local))
    }
}
