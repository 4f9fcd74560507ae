//! # Quire Core
//!
//! Core types shared by every Quire crate.
//!
//! This crate carries the data model of the artifact workbench: the live
//! [`Artifact`] a view is showing, the [`DeltaEvent`]s a generation stream
//! pushes into it, the immutable [`Document`] versions that make up a
//! history, and the text-anchored [`Suggestion`]s attached to a document.
//!
//! ## Key Types
//!
//! - [`Artifact`]: The single live, editable record owned by the active view
//! - [`DeltaEvent`] / [`Delta`]: Wire record and typed form of a stream update
//! - [`Document`]: One persisted, immutable version of an artifact
//! - [`DocumentId`]: Document identifier; its form decides the storage backend
//! - [`Clock`]: Time abstraction for testability

pub mod artifact;
pub mod clock;
pub mod delta;
pub mod document;
pub mod error;
pub mod id;
pub mod kind;
pub mod suggestion;

pub use artifact::{Artifact, ArtifactStatus, BoundingBox};
pub use clock::{Clock, ManualClock, SystemClock};
pub use delta::{Delta, DeltaEvent};
pub use document::{Document, NewVersion};
pub use error::DeltaError;
pub use id::{BackendKind, DocumentId};
pub use kind::ArtifactKind;
pub use suggestion::Suggestion;
