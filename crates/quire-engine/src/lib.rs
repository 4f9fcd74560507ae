//! # Quire Engine
//!
//! The state machine behind an artifact view.
//!
//! - [`ingest`]: folds streamed [`DeltaEvent`](quire_core::DeltaEvent)s into
//!   the live [`Artifact`](quire_core::Artifact), with idempotent replay
//! - [`autosave`]: debounced, deduplicated persistence of user edits
//! - [`navigator`]: which version is displayed, in edit or diff mode
//! - [`tree`], [`diff`], [`render`]: structural diff between two versions
//! - [`suggestions`]: anchoring text suggestions onto the current tree
//! - [`session`]: [`ArtifactSession`] ties the pieces to one repository
//!
//! ## Example
//!
//! ```rust,ignore
//! use quire_core::{Artifact, DeltaEvent};
//! use quire_engine::{ArtifactSession, SessionConfig, delta_channel};
//!
//! #[tokio::main]
//! async fn main() -> quire_engine::Result<()> {
//!     let mut session = ArtifactSession::from_config(SessionConfig::new("user-1"), Artifact::initial())?;
//!
//!     let (tx, rx) = delta_channel("chat-1");
//!     session.attach_stream(rx);
//!     tx.send(DeltaEvent::id("local-notes"))?;
//!     tx.send(DeltaEvent::text_delta("Hello world"))?;
//!     tx.send(DeltaEvent::finish())?;
//!     session.drive_stream().await?;
//!
//!     session.save_content("Hello, world", false).await;
//!     assert_eq!(session.versions().len(), 2);
//!     Ok(())
//! }
//! ```

pub mod autosave;
pub mod config;
pub mod diff;
pub mod error;
pub mod ingest;
pub mod navigator;
pub mod registry;
pub mod render;
pub mod session;
pub mod suggestions;
pub mod tree;

// Re-exports
pub use autosave::{AutosaveReconciler, EditAction, SaveOutcome};
pub use config::{Preset, RevealThresholds, SessionConfig};
pub use diff::{
    AnnotatedBlock, AnnotatedTree, BlockChange, DiffMark, Span, diff, diff_contents,
    diff_snapshots,
};
pub use error::{EngineError, Result};
pub use ingest::{DeltaChannel, DeltaIngestor, DeltaSender, Ingested, apply, delta_channel};
pub use navigator::{Mode, VersionList, VersionNavigator};
pub use registry::{
    CodeHandler, ContentHandler, ImageHandler, KindRegistry, SheetHandler, TextHandler,
};
pub use render::{render_html, render_terminal};
pub use session::{ArtifactSession, RenderProps};
pub use suggestions::{SuggestionStore, project};
pub use tree::{Block, BlockKind, DocumentTree};
