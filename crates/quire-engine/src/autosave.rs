//! Autosave reconciliation.
//!
//! [`AutosaveReconciler`] is a pure state machine: it is told about edits,
//! the passage of time and write results, and answers which content, if
//! any, must be written. The session performs the actual write.

use std::time::Duration;

use quire_core::Document;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Result of a save attempt, as shown to the user.
#[derive(Clone, Debug, PartialEq)]
pub enum SaveOutcome {
    /// Nothing to write: the content matches the persisted version.
    Skipped,
    /// A debounced write is scheduled for the given instant.
    Scheduled(Instant),
    /// The artifact is streaming and owns its content; the edit was dropped.
    Streaming,
    /// A new version was appended.
    Written(Document),
    /// The write failed. The content stays dirty and editable.
    Failed(String),
}

/// What the caller has to do after an edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditAction {
    /// The content matches the persisted version.
    Clean,
    /// Wait until the deadline, then poll.
    Wait(Instant),
    /// Write this content now.
    Write(String),
}

#[derive(Debug)]
pub struct AutosaveReconciler {
    debounce: Duration,
    dirty: bool,
    pending_write: bool,
    pending: Option<String>,
    deadline: Option<Instant>,
    last_saved: Option<String>,
}

impl AutosaveReconciler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            dirty: false,
            pending_write: false,
            pending: None,
            deadline: None,
            last_saved: None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// A write has been handed out and not completed yet.
    pub fn is_pending_write(&self) -> bool {
        self.pending_write
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn last_saved(&self) -> Option<&str> {
        self.last_saved.as_deref()
    }

    /// Record the content of the latest persisted version.
    pub fn set_last_saved(&mut self, content: Option<String>) {
        self.last_saved = content;
        if self.pending.is_some() && self.pending == self.last_saved {
            self.discard();
        }
    }

    /// Record an edit. With `debounce` the write waits until the edits
    /// pause; without it the write is due immediately.
    pub fn on_edit(&mut self, content: String, debounce: bool, now: Instant) -> EditAction {
        if self.last_saved.as_deref() == Some(content.as_str()) {
            if self.dirty {
                debug!("Content reverted to last saved version");
            }
            self.discard();
            return EditAction::Clean;
        }

        self.dirty = true;
        if debounce {
            let deadline = now + self.debounce;
            trace!(?deadline, "Debouncing save");
            self.pending = Some(content);
            self.deadline = Some(deadline);
            EditAction::Wait(deadline)
        } else {
            self.pending = Some(content.clone());
            self.deadline = Some(now);
            EditAction::Write(content)
        }
    }

    /// The content to write if the debounce has elapsed.
    ///
    /// Nothing is due while `streaming` is set or a write is in flight; the
    /// pending content is kept for a later poll.
    pub fn take_due(&mut self, now: Instant, streaming: bool) -> Option<String> {
        let deadline = self.deadline?;
        if now < deadline || self.pending_write {
            return None;
        }
        if streaming {
            trace!("Deferring save while streaming");
            return None;
        }
        let content = self.pending.clone()?;
        if self.last_saved.as_deref() == Some(content.as_str()) {
            self.discard();
            return None;
        }
        self.pending_write = true;
        self.deadline = None;
        Some(content)
    }

    /// Record the result of a write handed out by [`take_due`].
    ///
    /// [`take_due`]: AutosaveReconciler::take_due
    pub fn on_write_complete(&mut self, written: &str, success: bool) {
        self.pending_write = false;
        if !success {
            // Keep dirty; the next edit reschedules the write
            return;
        }
        self.last_saved = Some(written.to_string());
        if self.pending.as_deref() == Some(written) {
            self.discard();
        }
    }

    /// Drop any unsaved content without writing it.
    pub fn discard(&mut self) {
        self.dirty = false;
        self.pending = None;
        self.deadline = None;
    }
}
