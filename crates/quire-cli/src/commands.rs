//! The operations behind each subcommand.
//!
//! Every method returns data rather than printing so the binary decides how
//! to present it.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use quire_core::{Artifact, ArtifactKind, Delta, DeltaEvent, Document, DocumentId};
use quire_engine::{
    ArtifactSession, KindRegistry, Preset, SaveOutcome, SessionConfig, delta_channel,
    render_html, render_terminal,
};
use quire_logging::document_span;
use quire_storage::{
    FileKeyValueStore, LocalDocumentRepository, RepositoryResolver, RestoreOutcome,
    VersionedDocumentRepository,
};
use tracing::{Instrument, info, warn};
use uuid::Uuid;

use crate::config::{DiffFormat, GlobalArgs};

/// What a replayed stream left behind.
#[derive(Debug)]
pub struct ReplaySummary {
    pub document_id: DocumentId,
    pub kind: ArtifactKind,
    /// Events ingested, including ignored ones.
    pub processed: usize,
    /// Lines that did not decode as a delta record.
    pub skipped: usize,
    pub versions: usize,
    pub content: String,
}

/// Repositories and handlers shared by every command of one invocation.
pub struct App {
    config: SessionConfig,
    registry: Arc<KindRegistry>,
    resolver: RepositoryResolver,
    instance_id: Uuid,
}

impl App {
    /// Without a remote URL both backends are served from the data
    /// directory, so server-style ids work offline too.
    pub fn open(args: &GlobalArgs) -> anyhow::Result<Self> {
        let config = SessionConfig::new(args.user.clone())
            .with_local_dir(&args.data_dir)
            .with_preset(Preset::Interactive);

        let (config, resolver) = match &args.remote_url {
            Some(url) => {
                let config = config.with_remote_base_url(url.clone());
                let resolver = config.build_resolver()?;
                (config, resolver)
            }
            None => {
                let store = FileKeyValueStore::open(&args.data_dir).with_context(|| {
                    format!("opening data directory {}", args.data_dir.display())
                })?;
                let local: Arc<dyn VersionedDocumentRepository> = Arc::new(
                    LocalDocumentRepository::new(store, args.user.clone())
                        .with_namespace(config.local_namespace.clone()),
                );
                (config, RepositoryResolver::new(Arc::clone(&local), local))
            }
        };

        Ok(Self {
            registry: Arc::new(KindRegistry::with_defaults(&config.reveal_thresholds)),
            config,
            resolver,
            instance_id: Uuid::new_v4(),
        })
    }

    fn session(&self, artifact: Artifact) -> anyhow::Result<ArtifactSession> {
        Ok(ArtifactSession::open(
            self.config.clone(),
            Arc::clone(&self.registry),
            self.resolver.clone(),
            artifact,
        )?)
    }

    /// A session over an existing history with its versions loaded.
    async fn loaded_session(&self, id: &DocumentId) -> anyhow::Result<ArtifactSession> {
        let versions = self.versions(id).await?;
        let artifact = artifact_for(id, versions.last());
        let mut session = self.session(artifact)?;
        session.refresh_versions().await;
        Ok(session)
    }

    /// Versions of `id` in creation order.
    ///
    /// # Errors
    ///
    /// Fails when the backend cannot be read or holds no versions.
    pub async fn versions(&self, id: &DocumentId) -> anyhow::Result<Vec<Document>> {
        let versions = self
            .resolver
            .resolve(id)
            .fetch(id)
            .await
            .with_context(|| format!("reading history of {id}"))?;
        if versions.is_empty() {
            bail!("no versions stored for {id}");
        }
        Ok(versions)
    }

    /// Fold a JSONL delta log into a document. Undecodable lines are skipped;
    /// events after the first finish are ignored.
    pub async fn replay(&self, source: &str, chat_id: &str) -> anyhow::Result<ReplaySummary> {
        let mut events = Vec::new();
        let mut skipped = 0;
        for (number, line) in source.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match DeltaEvent::from_json_line(line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(line = number + 1, error = %e, "Skipping undecodable line");
                    skipped += 1;
                }
            }
        }

        let Some(id) = events.iter().find_map(|event| match Delta::parse(event) {
            Ok(Delta::Id(id)) => Some(id),
            _ => None,
        }) else {
            bail!("stream never assigns a document id");
        };

        async {
            let mut session = self.session(Artifact::initial())?;
            let (tx, rx) = delta_channel(chat_id);
            session.attach_stream(rx);
            let sent = events.len();
            for event in events {
                tx.send(event)?;
            }
            drop(tx);

            let processed = session.drive_stream().await?;
            if processed < sent {
                warn!(ignored = sent - processed, "Events after finish were ignored");
            }
            let artifact = session.artifact();
            info!(processed, skipped, "Replayed delta stream");

            anyhow::Ok(ReplaySummary {
                document_id: artifact.document_id.clone(),
                kind: artifact.kind,
                processed,
                skipped,
                versions: session.versions().len(),
                content: artifact.content.clone(),
            })
        }
        .instrument(document_span(&id, self.instance_id))
        .await
    }

    /// Content of the version at `index`, the latest when `None`.
    pub async fn show(&self, id: &DocumentId, index: Option<usize>) -> anyhow::Result<String> {
        let versions = self.versions(id).await?;
        let len = versions.len();
        let index = index.unwrap_or(len - 1);
        let version = versions
            .into_iter()
            .nth(index)
            .with_context(|| format!("version {index} out of range, {id} has {len}"))?;
        Ok(version.content)
    }

    /// Store `content` as the newest version unless it matches the current
    /// one. Title and kind default to the latest version's.
    pub async fn save(
        &self,
        id: &DocumentId,
        content: String,
        title: Option<String>,
        kind: Option<ArtifactKind>,
    ) -> anyhow::Result<SaveOutcome> {
        async {
            let existing = self.resolver.resolve(id).list(id).await;
            let mut artifact = artifact_for(id, existing.last());
            if let Some(title) = title {
                artifact.title = title;
            }
            if let Some(kind) = kind {
                artifact.kind = kind;
            }

            let mut session = self.session(artifact)?;
            if !existing.is_empty() {
                // Loads the latest content as the dedup baseline
                session.refresh_versions().await;
            }
            match session.save_content(content, false).await {
                SaveOutcome::Failed(message) => bail!("saving {id} failed: {message}"),
                outcome => anyhow::Ok(outcome),
            }
        }
        .instrument(document_span(id, self.instance_id))
        .await
    }

    pub async fn restore(&self, id: &DocumentId, index: usize) -> anyhow::Result<RestoreOutcome> {
        async {
            let mut session = self.loaded_session(id).await?;
            anyhow::Ok(session.restore_version(index).await?)
        }
        .instrument(document_span(id, self.instance_id))
        .await
    }

    pub async fn diff(
        &self,
        id: &DocumentId,
        from: usize,
        to: usize,
        format: DiffFormat,
    ) -> anyhow::Result<String> {
        let session = self.loaded_session(id).await?;
        let tree = session.diff_versions(from, to)?;
        if tree.fallback {
            warn!(%id, from, to, "Versions are not structurally diffable, showing the newer one");
        }
        Ok(match format {
            DiffFormat::Terminal => render_terminal(&tree),
            DiffFormat::Html => render_html(&tree),
            DiffFormat::Json => serde_json::to_string_pretty(&tree)?,
        })
    }
}

/// An artifact view of `id`, seeded from its latest version if it has one.
fn artifact_for(id: &DocumentId, latest: Option<&Document>) -> Artifact {
    let mut artifact = Artifact {
        document_id: id.clone(),
        is_visible: true,
        ..Artifact::initial()
    };
    if let Some(latest) = latest {
        artifact.title = latest.title.clone();
        artifact.kind = latest.kind;
        artifact.content = latest.content.clone();
    }
    artifact
}

/// One line per version: index, creation time, kind, size and title.
pub fn format_history(versions: &[Document]) -> String {
    let mut out = String::new();
    for (index, version) in versions.iter().enumerate() {
        let _ = writeln!(
            out,
            "{index:>4}  {}  {:<5}  {:>6} chars  {}",
            version.created_at.format("%Y-%m-%d %H:%M:%S%.3f"),
            version.kind,
            version.content.chars().count(),
            version.title,
        );
    }
    out
}

/// Read a file, or stdin for `-`.
pub async fn read_source(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        return tokio::task::spawn_blocking(|| std::io::read_to_string(std::io::stdin()))
            .await?
            .context("reading stdin");
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}
