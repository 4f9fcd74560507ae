//! The artifact session: one open artifact and everything attached to it.

use std::sync::Arc;

use quire_core::{
    Artifact, ArtifactStatus, BackendKind, DeltaEvent, Document, DocumentId, NewVersion,
    Suggestion,
};
use quire_storage::{RepositoryResolver, RestoreOutcome, VersionedDocumentRepository};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::autosave::{AutosaveReconciler, EditAction, SaveOutcome};
use crate::config::SessionConfig;
use crate::diff::{AnnotatedTree, diff_contents};
use crate::error::{EngineError, Result};
use crate::ingest::{DeltaChannel, DeltaIngestor, Ingested};
use crate::navigator::{Mode, VersionList, VersionNavigator};
use crate::registry::KindRegistry;
use crate::suggestions::{SuggestionStore, project};

/// What a content widget needs to draw the selected version.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderProps {
    pub content: String,
    pub suggestions: Vec<Suggestion>,
    pub is_current_version: bool,
    pub status: ArtifactStatus,
    pub mode: Mode,
}

/// Owns the artifact shown in one view.
///
/// The session folds streamed deltas into the artifact, persists edits
/// through the repository its document id resolves to, and tracks which
/// version is on screen. The repository is resolved again whenever the
/// artifact's document id changes, never otherwise.
pub struct ArtifactSession {
    config: SessionConfig,
    registry: Arc<KindRegistry>,
    resolver: RepositoryResolver,
    repository: Arc<dyn VersionedDocumentRepository>,
    resolved_for: DocumentId,
    artifact: Artifact,
    ingestor: DeltaIngestor,
    stream: Option<DeltaChannel>,
    autosave: AutosaveReconciler,
    navigator: VersionNavigator,
    versions: VersionList,
    suggestions: Arc<SuggestionStore>,
}

impl ArtifactSession {
    /// Open a session for `artifact`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] when no handler is registered
    /// for the artifact's kind.
    pub fn open(
        config: SessionConfig,
        registry: Arc<KindRegistry>,
        resolver: RepositoryResolver,
        artifact: Artifact,
    ) -> Result<Self> {
        registry.get(artifact.kind)?;

        let repository = resolver.resolve(&artifact.document_id);
        info!(
            document = %artifact.document_id,
            kind = %artifact.kind,
            backend = %repository.backend(),
            "Opened artifact session"
        );

        Ok(Self {
            autosave: AutosaveReconciler::new(config.autosave_debounce()),
            ingestor: DeltaIngestor::new(Arc::clone(&registry)),
            resolved_for: artifact.document_id.clone(),
            config,
            registry,
            resolver,
            repository,
            artifact,
            stream: None,
            navigator: VersionNavigator::new(),
            versions: VersionList::Loading,
            suggestions: Arc::new(SuggestionStore::new()),
        })
    }

    /// Open a session with the default handlers and the repositories
    /// `config` describes.
    pub fn from_config(config: SessionConfig, artifact: Artifact) -> Result<Self> {
        let registry = Arc::new(KindRegistry::with_defaults(&config.reveal_thresholds));
        let resolver = config.build_resolver()?;
        Self::open(config, registry, resolver, artifact)
    }

    /// Share a suggestion store with other sessions.
    pub fn with_suggestion_store(mut self, store: Arc<SuggestionStore>) -> Self {
        self.suggestions = store;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn versions(&self) -> &VersionList {
        &self.versions
    }

    pub fn navigator(&self) -> &VersionNavigator {
        &self.navigator
    }

    pub fn autosave(&self) -> &AutosaveReconciler {
        &self.autosave
    }

    pub fn suggestion_store(&self) -> &SuggestionStore {
        &self.suggestions
    }

    pub fn backend(&self) -> BackendKind {
        self.repository.backend()
    }

    /// Re-resolve the repository if the document id changed.
    fn sync_repository(&mut self) {
        if self.artifact.document_id == self.resolved_for {
            return;
        }
        let id = self.artifact.document_id.clone();
        self.repository = self.resolver.resolve(&id);
        debug!(
            from = %self.resolved_for,
            to = %id,
            backend = %self.repository.backend(),
            "Document id changed, switching repository"
        );
        self.resolved_for = id;
        self.versions = VersionList::Loading;
        self.navigator.reset();
        self.autosave.set_last_saved(None);
    }

    fn snapshot(&self, content: String) -> NewVersion {
        NewVersion::new(self.artifact.title.clone(), content, self.artifact.kind)
    }

    // ============================================================
    // Streaming
    // ============================================================

    /// Start consuming a new delta stream. A previously attached stream is
    /// closed.
    pub fn attach_stream(&mut self, channel: DeltaChannel) {
        if let Some(mut previous) = self.stream.replace(channel) {
            previous.close();
        }
        self.ingestor.reset();
        debug!(document = %self.artifact.document_id, "Attached delta stream");
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Ingest every event already queued on the stream without waiting.
    /// Returns how many events were consumed.
    pub async fn pump_stream(&mut self) -> usize {
        let Some(stream) = self.stream.as_mut() else {
            return 0;
        };
        let mut consumed = 0;
        let mut finished = false;
        while let Some((index, event)) = stream.try_recv() {
            let outcome =
                self.ingestor
                    .ingest(index, &event, &mut self.artifact, &self.suggestions);
            consumed += 1;
            finished |= outcome.is_finish();
        }
        self.after_ingest(finished).await;
        consumed
    }

    /// Ingest events until the stream finishes or its producers go away.
    /// Returns how many events were consumed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StreamClosed`] when no stream is attached.
    pub async fn drive_stream(&mut self) -> Result<usize> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(EngineError::StreamClosed);
        };
        let mut consumed = 0;
        let finished = loop {
            let Some((index, event)) = stream.recv().await else {
                break false;
            };
            consumed += 1;
            let outcome: Ingested =
                self.ingestor
                    .ingest(index, &event, &mut self.artifact, &self.suggestions);
            if outcome.is_finish() {
                break true;
            }
        };

        if !finished && self.artifact.is_streaming() {
            warn!(document = %self.artifact.document_id, "Delta stream ended without finish");
            self.artifact.status = ArtifactStatus::Idle;
            self.stream = None;
            self.after_ingest(true).await;
        } else {
            self.after_ingest(finished).await;
        }
        Ok(consumed)
    }

    /// Re-deliver a recorded delta log, e.g. after reconnecting. Events up to
    /// the checkpoint are skipped; returns how many were newly consumed.
    pub async fn replay_log(&mut self, log: &[DeltaEvent]) -> usize {
        let start = self.ingestor.processed();
        let mut finished = false;
        for (index, event) in log.iter().enumerate().skip(start) {
            let outcome =
                self.ingestor
                    .ingest(index, event, &mut self.artifact, &self.suggestions);
            finished |= outcome.is_finish();
        }
        self.after_ingest(finished).await;
        self.ingestor.processed().saturating_sub(start)
    }

    /// Drop the delta source and stop streaming. A scheduled autosave is
    /// kept.
    pub fn cancel_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.artifact.status = ArtifactStatus::Idle;
        info!(document = %self.artifact.document_id, "Cancelled delta stream");
    }

    async fn after_ingest(&mut self, finished: bool) {
        self.sync_repository();
        if finished && !self.artifact.is_streaming() {
            self.settle_stream().await;
        }
    }

    /// Persist the streamed result where the client owns the history, then
    /// reload the version list. The streamed result supersedes any edit
    /// still waiting to be saved.
    #[instrument(skip_all, fields(document = %self.artifact.document_id))]
    async fn settle_stream(&mut self) {
        if self.autosave.is_dirty() {
            debug!("Discarding pending edit superseded by the stream");
            self.autosave.discard();
        }
        if self.repository.backend() == BackendKind::Local {
            let id = self.artifact.document_id.clone();
            match self.repository.fetch(&id).await {
                Ok(versions)
                    if !versions.is_empty()
                        && versions.last().map(|d| d.content.as_str())
                            != Some(self.artifact.content.as_str()) =>
                {
                    let version = self.snapshot(self.artifact.content.clone());
                    match self.repository.append(&id, version).await {
                        Ok(document) => {
                            info!(created_at = %document.created_at, "Stored streamed version")
                        }
                        Err(e) => warn!(error = %e, "Failed to store streamed version"),
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Could not read history after stream"),
            }
        }
        self.refresh_versions().await;
    }

    // ============================================================
    // Versions
    // ============================================================

    /// Reload the version list. Local histories that do not exist yet are
    /// bootstrapped from the artifact. Read failures leave an empty list.
    #[instrument(skip_all, fields(document = %self.artifact.document_id))]
    pub async fn refresh_versions(&mut self) -> &VersionList {
        self.sync_repository();
        let id = self.artifact.document_id.clone();

        let versions = if self.repository.backend() == BackendKind::Local
            && !self.artifact.is_streaming()
        {
            let initial = self.snapshot(self.artifact.content.clone());
            match self.repository.bootstrap(&id, initial).await {
                Ok(versions) => versions,
                Err(e) => {
                    warn!(error = %e, "Failed to load local history");
                    Vec::new()
                }
            }
        } else {
            self.repository.list(&id).await
        };

        self.apply_versions(versions);
        &self.versions
    }

    fn apply_versions(&mut self, versions: Vec<Document>) {
        let latest = versions.last().map(|d| d.content.clone());
        if let Some(content) = &latest {
            if !self.artifact.is_streaming() && !self.autosave.is_dirty() {
                self.artifact.content = content.clone();
            }
        }
        self.autosave.set_last_saved(latest);
        self.navigator.on_versions_changed(versions.len());
        debug!(versions = versions.len(), "Loaded version list");
        self.versions = VersionList::Loaded(versions);
    }

    pub fn next_version(&mut self) {
        self.navigator.next();
    }

    pub fn prev_version(&mut self) {
        self.navigator.prev();
    }

    pub fn toggle_mode(&mut self) {
        self.navigator.toggle();
    }

    pub fn latest_version(&mut self) {
        self.navigator.latest();
    }

    pub fn is_current_version(&self) -> bool {
        self.versions.is_loading() || self.navigator.is_current_version()
    }

    /// Truncate the history to the displayed version.
    pub async fn restore_current_version(&mut self) -> Result<RestoreOutcome> {
        let index = self.navigator.index().ok_or(EngineError::NoVersions)?;
        self.restore_version(index).await
    }

    /// Truncate the history so the version at `index` is the newest.
    ///
    /// # Errors
    ///
    /// Fails when the index is out of range or the backend rejects the
    /// restore; in the latter case the history is left untouched.
    #[instrument(skip(self), fields(document = %self.artifact.document_id))]
    pub async fn restore_version(&mut self, index: usize) -> Result<RestoreOutcome> {
        self.sync_repository();
        let versions = self.versions.versions();
        let target = versions.get(index).ok_or(if versions.is_empty() {
            EngineError::NoVersions
        } else {
            EngineError::VersionOutOfRange {
                index,
                len: versions.len(),
            }
        })?;
        let upto = target.created_at;
        let id = self.artifact.document_id.clone();

        let outcome = self.repository.restore(&id, upto).await?;
        let versions = if outcome.requires_reload {
            self.repository.fetch(&id).await?
        } else {
            outcome.versions.clone()
        };

        let latest = versions.last().map(|d| d.content.clone());
        if let Some(content) = &latest {
            self.artifact.content = content.clone();
        }
        self.autosave.discard();
        self.autosave.set_last_saved(latest);
        self.navigator.on_restored(versions.len());
        info!(
            index,
            removed = outcome.removed,
            remaining = versions.len(),
            "Restored version"
        );
        self.versions = VersionList::Loaded(versions);
        Ok(outcome)
    }

    // ============================================================
    // Editing
    // ============================================================

    /// Record edited content from a widget. With `debounce` the write waits
    /// for the configured pause; otherwise it happens now. Edits made while
    /// the artifact is streaming are dropped.
    pub async fn save_content(&mut self, content: impl Into<String>, debounce: bool) -> SaveOutcome {
        if self.artifact.is_streaming() {
            debug!(document = %self.artifact.document_id, "Ignoring edit while streaming");
            return SaveOutcome::Streaming;
        }
        let content = content.into();
        self.artifact.content = content.clone();
        match self.autosave.on_edit(content, debounce, Instant::now()) {
            EditAction::Clean => SaveOutcome::Skipped,
            EditAction::Wait(deadline) => SaveOutcome::Scheduled(deadline),
            EditAction::Write(_) => self.poll_autosave().await,
        }
    }

    /// When the pending autosave is due.
    pub fn autosave_deadline(&self) -> Option<Instant> {
        self.autosave.deadline()
    }

    /// Write the pending content if its debounce has elapsed.
    pub async fn poll_autosave(&mut self) -> SaveOutcome {
        let Some(content) = self
            .autosave
            .take_due(Instant::now(), self.artifact.is_streaming())
        else {
            return match self.autosave.deadline() {
                Some(deadline) => SaveOutcome::Scheduled(deadline),
                None => SaveOutcome::Skipped,
            };
        };
        self.write_version(content).await
    }

    /// Sleep until the pending autosave is due, then poll.
    pub async fn wait_autosave(&mut self) -> SaveOutcome {
        if let Some(deadline) = self.autosave.deadline() {
            tokio::time::sleep_until(deadline).await;
        }
        self.poll_autosave().await
    }

    #[instrument(skip_all, fields(document = %self.artifact.document_id))]
    async fn write_version(&mut self, content: String) -> SaveOutcome {
        self.sync_repository();
        let id = self.artifact.document_id.clone();
        let version = self.snapshot(content.clone());

        match self.repository.append(&id, version).await {
            Ok(document) => {
                self.autosave.on_write_complete(&content, true);
                info!(created_at = %document.created_at, "Saved version");
                if self.versions.is_loading() {
                    self.refresh_versions().await;
                } else {
                    let mut versions = self.versions.versions().to_vec();
                    versions.push(document.clone());
                    self.navigator.on_versions_changed(versions.len());
                    self.versions = VersionList::Loaded(versions);
                }
                SaveOutcome::Written(document)
            }
            Err(e) => {
                self.autosave.on_write_complete(&content, false);
                warn!(error = %e, "Save failed, keeping changes");
                SaveOutcome::Failed(e.to_string())
            }
        }
    }

    // ============================================================
    // Display
    // ============================================================

    /// Content of the selected version. The live artifact when the latest
    /// version is selected.
    pub fn displayed_content(&self) -> &str {
        match self.navigator.index() {
            Some(i) if !self.navigator.is_current_version() => self
                .versions
                .versions()
                .get(i)
                .map_or(self.artifact.content.as_str(), |d| d.content.as_str()),
            _ => &self.artifact.content,
        }
    }

    /// Diff between two versions of the loaded history.
    pub fn diff_versions(&self, from: usize, to: usize) -> Result<AnnotatedTree> {
        let versions = self.versions.versions();
        let len = versions.len();
        let old = versions
            .get(from)
            .ok_or(EngineError::VersionOutOfRange { index: from, len })?;
        let new = versions
            .get(to)
            .ok_or(EngineError::VersionOutOfRange { index: to, len })?;
        let handler = self.registry.get(new.kind)?;
        Ok(diff_contents(handler.as_ref(), &old.content, &new.content))
    }

    /// In diff mode, the selected version compared with the one before it.
    /// The first version is compared with an empty document.
    pub fn displayed_diff(&self) -> Result<Option<AnnotatedTree>> {
        if self.navigator.mode() != Mode::Diff {
            return Ok(None);
        }
        let Some(index) = self.navigator.index() else {
            return Ok(None);
        };
        let versions = self.versions.versions();
        let Some(new) = versions.get(index) else {
            return Ok(None);
        };
        let handler = self.registry.get(new.kind)?;
        let old = index
            .checked_sub(1)
            .and_then(|i| versions.get(i))
            .map_or("", |d| d.content.as_str());
        Ok(Some(diff_contents(handler.as_ref(), old, &new.content)))
    }

    /// Stored suggestions anchored onto the displayed content.
    pub fn projected_suggestions(&self) -> Vec<Suggestion> {
        let stored = self.suggestions.for_document(&self.artifact.document_id);
        if stored.is_empty() {
            return stored;
        }
        let tree = match self
            .registry
            .get(self.artifact.kind)
            .and_then(|h| h.parse_tree(self.displayed_content()))
        {
            Ok(tree) => tree,
            Err(e) => {
                debug!(error = %e, "No tree to anchor suggestions on");
                return Vec::new();
            }
        };
        project(&tree, &stored)
    }

    /// Props for the content widget. Suggestions only show on the latest
    /// version.
    pub fn render_props(&self) -> RenderProps {
        let is_current_version = self.is_current_version();
        RenderProps {
            content: self.displayed_content().to_string(),
            suggestions: if is_current_version {
                self.projected_suggestions()
            } else {
                Vec::new()
            },
            is_current_version,
            status: self.artifact.status,
            mode: self.navigator.mode(),
        }
    }

    /// Close the view: drop the stream and any unsaved edit, and reset the
    /// artifact.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        if self.autosave.is_dirty() {
            warn!(document = %self.artifact.document_id, "Closing with unsaved changes");
        }
        self.autosave.discard();
        self.artifact.reset();
        self.resolved_for = self.artifact.document_id.clone();
        self.repository = self.resolver.resolve(&self.resolved_for);
        self.versions = VersionList::Loading;
        self.navigator.reset();
        info!("Closed artifact session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::delta_channel;
    use quire_core::ArtifactKind;

    fn session(artifact: Artifact) -> ArtifactSession {
        ArtifactSession::from_config(SessionConfig::new("user-1"), artifact).unwrap()
    }

    fn local_artifact(content: &str) -> Artifact {
        Artifact {
            document_id: DocumentId::new("local-doc"),
            title: "Notes".into(),
            content: content.into(),
            ..Artifact::initial()
        }
    }

    #[test]
    fn test_open_without_handler_fails() {
        let config = SessionConfig::new("u");
        let resolver = config.build_resolver().unwrap();
        let result = ArtifactSession::open(
            config,
            Arc::new(KindRegistry::empty()),
            resolver,
            Artifact::initial(),
        );
        assert!(matches!(
            result,
            Err(EngineError::Configuration {
                kind: ArtifactKind::Text
            })
        ));
    }

    #[tokio::test]
    async fn test_stream_resolves_backend_by_id() {
        let mut session = session(Artifact::initial());
        let (tx, rx) = delta_channel("chat-1");
        session.attach_stream(rx);

        let remote_id = DocumentId::generate();
        tx.send(DeltaEvent::id(remote_id.as_str())).unwrap();
        tx.send(DeltaEvent::text_delta("Hello")).unwrap();
        assert_eq!(session.pump_stream().await, 2);

        assert_eq!(session.backend(), BackendKind::Remote);
        assert!(session.artifact().is_streaming());
        assert!(session.versions().is_loading());
        assert!(session.is_current_version());
    }

    #[tokio::test]
    async fn test_refresh_bootstraps_local_history() {
        let mut session = session(local_artifact("first"));
        let versions = session.refresh_versions().await;
        assert_eq!(versions.len(), 1);
        assert_eq!(session.navigator().current_version_index(), 0);
        assert_eq!(session.autosave().last_saved(), Some("first"));
    }

    #[tokio::test]
    async fn test_immediate_save_writes_version() {
        let mut session = session(local_artifact("a"));
        session.refresh_versions().await;

        assert_eq!(session.save_content("a", false).await, SaveOutcome::Skipped);
        match session.save_content("b", false).await {
            SaveOutcome::Written(doc) => assert_eq!(doc.content, "b"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(session.versions().len(), 2);
        assert_eq!(session.navigator().index(), Some(1));
        assert!(!session.autosave().is_dirty());
    }

    #[tokio::test]
    async fn test_displayed_content_follows_selection() {
        let mut session = session(local_artifact("one"));
        session.refresh_versions().await;
        session.save_content("two", false).await;

        assert_eq!(session.displayed_content(), "two");
        session.prev_version();
        assert_eq!(session.displayed_content(), "one");
        assert!(!session.render_props().is_current_version);

        session.toggle_mode();
        let diff = session.displayed_diff().unwrap().unwrap();
        assert_eq!(diff.new_text(), "one");
        assert_eq!(diff.old_text(), "");
    }

    #[tokio::test]
    async fn test_suggestions_render_on_current_version_only() {
        let mut session = session(local_artifact("the teh cat"));
        session.refresh_versions().await;
        let id = session.artifact().document_id.clone();
        session
            .suggestion_store()
            .add(&id, Suggestion::new("s1", "teh", "the"));
        session
            .suggestion_store()
            .add(&id, Suggestion::new("s2", "dog", "cat"));

        let props = session.render_props();
        assert_eq!(props.suggestions.len(), 1);
        assert_eq!(props.suggestions[0].selection_start, Some(4));

        session.save_content("the cat", false).await;
        session.prev_version();
        assert!(session.render_props().suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_close_resets_artifact() {
        let mut session = session(local_artifact("x"));
        session.refresh_versions().await;
        session.save_content("unsaved", true).await;

        session.close();
        assert_eq!(session.artifact(), &Artifact::initial());
        assert!(!session.autosave().is_dirty());
        assert!(session.versions().is_loading());
        assert_eq!(session.navigator().current_version_index(), -1);
    }
}
