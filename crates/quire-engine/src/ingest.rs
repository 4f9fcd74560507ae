//! Delta ingestion: folding a stream of delta events into an artifact.
//!
//! Deltas travel from the producer to the session over an explicit
//! channel created with [`delta_channel`]. The receiving half keeps the log
//! of every event it delivered, so an interrupted consumer can replay the
//! log and [`DeltaIngestor`] only applies what it has not seen yet.

use std::sync::Arc;

use quire_core::{Artifact, ArtifactStatus, Delta, DeltaEvent, Suggestion};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{EngineError, Result};
use crate::registry::KindRegistry;
use crate::suggestions::SuggestionStore;

/// Fold one delta into an artifact.
///
/// Suggestions and unknown delta types leave the artifact untouched.
pub fn apply(artifact: &Artifact, delta: &Delta) -> Artifact {
    let mut next = artifact.clone();
    match delta {
        Delta::Id(id) => {
            next.document_id = id.clone();
            next.status = ArtifactStatus::Streaming;
        }
        Delta::Title(title) => {
            next.title = title.clone();
            next.status = ArtifactStatus::Streaming;
        }
        Delta::Kind(kind) => {
            next.kind = *kind;
            next.status = ArtifactStatus::Streaming;
        }
        Delta::Clear => {
            next.content.clear();
            next.status = ArtifactStatus::Streaming;
        }
        Delta::Content { text, .. } => {
            next.content = text.clone();
            next.status = ArtifactStatus::Streaming;
        }
        Delta::Finish => {
            next.status = ArtifactStatus::Idle;
        }
        Delta::Suggestion(_) | Delta::Unknown(_) => {}
    }
    next
}

/// What ingesting one event did.
#[derive(Clone, Debug, PartialEq)]
pub enum Ingested {
    /// The artifact was updated.
    Applied(Delta),
    /// A suggestion was handed to the metadata store.
    Forwarded(Suggestion),
    /// The event was delivered before and has already been applied.
    Duplicate,
    /// The event arrived ahead of `expected`. Nothing was applied and the
    /// checkpoint did not move; the missing events must be delivered first.
    OutOfOrder { expected: usize },
    /// The event's type is not one the engine knows.
    Ignored,
    /// The payload could not be parsed. Ingestion continues.
    Malformed,
}

impl Ingested {
    pub fn is_finish(&self) -> bool {
        matches!(self, Ingested::Applied(Delta::Finish))
    }
}

/// Applies events in arrival order, remembering how many it has consumed.
pub struct DeltaIngestor {
    registry: Arc<KindRegistry>,
    processed: usize,
}

impl DeltaIngestor {
    pub fn new(registry: Arc<KindRegistry>) -> Self {
        Self {
            registry,
            processed: 0,
        }
    }

    /// Number of events consumed so far; the next expected index.
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Forget the checkpoint before a new stream.
    pub fn reset(&mut self) {
        self.processed = 0;
    }

    /// Ingest the event at position `index` of the stream.
    ///
    /// Events below the checkpoint are skipped as duplicates. Events past it
    /// are rejected, so the checkpoint only ever advances over a contiguous
    /// prefix of the stream.
    pub fn ingest(
        &mut self,
        index: usize,
        event: &DeltaEvent,
        artifact: &mut Artifact,
        metadata: &SuggestionStore,
    ) -> Ingested {
        if index < self.processed {
            trace!(index, processed = self.processed, "Skipping replayed delta");
            return Ingested::Duplicate;
        }
        if index > self.processed {
            warn!(index, expected = self.processed, "Gap in delta stream, rejecting event");
            return Ingested::OutOfOrder {
                expected: self.processed,
            };
        }
        self.processed = index + 1;

        let delta = match Delta::parse(event) {
            Ok(delta) => delta,
            Err(e) => {
                warn!(index, delta_type = %event.delta_type, error = %e, "Skipping malformed delta");
                return Ingested::Malformed;
            }
        };
        trace!(index, delta_type = %event.delta_type, "Applying delta");

        match delta {
            Delta::Suggestion(suggestion) => {
                metadata.add(&artifact.document_id, suggestion.clone());
                Ingested::Forwarded(suggestion)
            }
            Delta::Unknown(delta_type) => {
                debug!(%delta_type, "Ignoring unknown delta type");
                Ingested::Ignored
            }
            delta => {
                *artifact = apply(artifact, &delta);
                if delta.is_content() {
                    self.reveal(artifact);
                }
                Ingested::Applied(delta)
            }
        }
    }

    /// Ingest every event of `log` past the checkpoint. Returns how many
    /// events were newly consumed.
    pub fn replay(
        &mut self,
        log: &[DeltaEvent],
        artifact: &mut Artifact,
        metadata: &SuggestionStore,
    ) -> usize {
        let start = self.processed;
        for (index, event) in log.iter().enumerate().skip(start) {
            self.ingest(index, event, artifact, metadata);
        }
        self.processed.saturating_sub(start)
    }

    fn reveal(&self, artifact: &mut Artifact) {
        if artifact.is_visible {
            return;
        }
        match self.registry.get(artifact.kind) {
            Ok(handler) if handler.should_reveal(&artifact.content) => {
                debug!(kind = %artifact.kind, len = artifact.content.len(), "Revealing artifact");
                artifact.is_visible = true;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Cannot decide reveal"),
        }
    }
}

/// Create a delta channel for one chat session.
pub fn delta_channel(session_id: impl Into<String>) -> (DeltaSender, DeltaChannel) {
    let session_id = session_id.into();
    let (tx, rx) = mpsc::unbounded_channel();
    (
        DeltaSender {
            session_id: session_id.clone(),
            tx,
        },
        DeltaChannel {
            session_id,
            rx,
            log: Vec::new(),
        },
    )
}

/// Producer half of a delta channel.
#[derive(Clone, Debug)]
pub struct DeltaSender {
    session_id: String,
    tx: mpsc::UnboundedSender<DeltaEvent>,
}

impl DeltaSender {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Push an event.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StreamClosed`] once the consumer closed or
    /// dropped the channel.
    pub fn send(&self, event: DeltaEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| EngineError::StreamClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of a delta channel. Records every event it delivers.
#[derive(Debug)]
pub struct DeltaChannel {
    session_id: String,
    rx: mpsc::UnboundedReceiver<DeltaEvent>,
    log: Vec<DeltaEvent>,
}

impl DeltaChannel {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Wait for the next event and its stream index. `None` once every
    /// sender is gone or the channel was closed and drained.
    pub async fn recv(&mut self) -> Option<(usize, DeltaEvent)> {
        let event = self.rx.recv().await?;
        Some(self.record(event))
    }

    /// The next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<(usize, DeltaEvent)> {
        let event = self.rx.try_recv().ok()?;
        Some(self.record(event))
    }

    /// Every event delivered so far, in arrival order.
    pub fn log(&self) -> &[DeltaEvent] {
        &self.log
    }

    /// Stop accepting events. Events already queued can still be received.
    pub fn close(&mut self) {
        debug!(session = %self.session_id, delivered = self.log.len(), "Closing delta channel");
        self.rx.close();
    }

    fn record(&mut self, event: DeltaEvent) -> (usize, DeltaEvent) {
        let index = self.log.len();
        self.log.push(event.clone());
        (index, event)
    }
}
