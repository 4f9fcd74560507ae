//! Version navigation.

use quire_core::Document;
use serde::Serialize;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Edit,
    Diff,
}

/// A document's version history as seen by the view.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum VersionList {
    /// Not fetched yet for the current document.
    #[default]
    Loading,
    Loaded(Vec<Document>),
}

impl VersionList {
    pub fn versions(&self) -> &[Document] {
        match self {
            VersionList::Loading => &[],
            VersionList::Loaded(versions) => versions,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, VersionList::Loading)
    }

    pub fn len(&self) -> usize {
        self.versions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions().is_empty()
    }

    pub fn latest(&self) -> Option<&Document> {
        self.versions().last()
    }
}

/// Tracks which version is displayed and in which mode.
///
/// The navigator follows the newest version until the user steps away with
/// [`prev`](Self::prev) or [`next`](Self::next). While following, a longer
/// history moves the selection to the new last version and back to edit
/// mode. While browsing, the selection and mode stay put. Stepping back
/// onto the last version or calling [`latest`](Self::latest) resumes
/// following.
#[derive(Clone, Debug)]
pub struct VersionNavigator {
    index: Option<usize>,
    len: usize,
    mode: Mode,
    following: bool,
}

impl Default for VersionNavigator {
    fn default() -> Self {
        Self {
            index: None,
            len: 0,
            mode: Mode::Edit,
            following: true,
        }
    }
}

impl VersionNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selected index, -1 when nothing is loaded.
    pub fn current_version_index(&self) -> isize {
        self.index.map_or(-1, |i| i as isize)
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_following(&self) -> bool {
        self.following
    }

    /// Whether the latest version is displayed. Empty histories count as
    /// current.
    pub fn is_current_version(&self) -> bool {
        match self.index {
            None => true,
            Some(i) => i + 1 == self.len,
        }
    }

    pub fn next(&mut self) {
        if let Some(i) = self.index {
            let next = (i + 1).min(self.len - 1);
            self.index = Some(next);
            self.following = next + 1 == self.len;
        }
    }

    pub fn prev(&mut self) {
        if let Some(i) = self.index {
            let prev = i.saturating_sub(1);
            self.index = Some(prev);
            self.following = prev + 1 == self.len;
        }
    }

    /// Flip between edit and diff mode, keeping the selection.
    pub fn toggle(&mut self) {
        self.mode = match self.mode {
            Mode::Edit => Mode::Diff,
            Mode::Diff => Mode::Edit,
        };
    }

    /// Jump to the newest version in edit mode.
    pub fn latest(&mut self) {
        self.index = self.len.checked_sub(1);
        self.mode = Mode::Edit;
        self.following = true;
    }

    /// Adjust to a version list of `len` entries.
    pub fn on_versions_changed(&mut self, len: usize) {
        let previous = self.len;
        self.len = len;

        if len == 0 {
            self.index = None;
            self.following = true;
            return;
        }

        match self.index {
            Some(i) if !self.following => {
                // Browsing: keep the selection unless it fell off the end
                if i >= len {
                    self.index = Some(len - 1);
                    self.following = true;
                }
            }
            _ => {
                self.index = Some(len - 1);
                if len != previous {
                    self.mode = Mode::Edit;
                }
                self.following = true;
            }
        }
        debug!(
            len,
            index = self.current_version_index(),
            following = self.following,
            "Version list changed"
        );
    }

    /// Select the version a restore truncated the history to.
    pub fn on_restored(&mut self, len: usize) {
        self.len = len;
        self.index = len.checked_sub(1);
        self.mode = Mode::Edit;
        self.following = true;
    }

    /// Forget everything, e.g. when the displayed document changes.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
