//! Helpers shared by both backends for keeping a history well-formed.

use chrono::{DateTime, TimeDelta, Utc};
use quire_core::Document;

/// Timestamp for a version appended to `history` at wall time `now`.
///
/// Clocks can stall or step backwards; the result is always strictly after
/// the current last version so restore-by-timestamp stays unambiguous.
pub fn next_created_at(history: &[Document], now: DateTime<Utc>) -> DateTime<Utc> {
    match history.last() {
        Some(last) if now <= last.created_at => last.created_at + TimeDelta::milliseconds(1),
        _ => now,
    }
}

/// Keep only the versions created at or before `upto`.
pub fn truncate_after(history: &[Document], upto: DateTime<Utc>) -> Vec<Document> {
    history
        .iter()
        .filter(|doc| doc.created_at <= upto)
        .cloned()
        .collect()
}
