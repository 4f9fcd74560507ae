use serde::{Deserialize, Serialize};

use crate::id::DocumentId;
use crate::kind::ArtifactKind;

/// Whether a generation stream is currently writing into the artifact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    #[default]
    Idle,
    Streaming,
}

impl ArtifactStatus {
    pub fn is_streaming(&self) -> bool {
        matches!(self, ArtifactStatus::Streaming)
    }
}

/// Screen rectangle the artifact panel animates from. Presentational only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

/// The live, editable artifact shown by the active view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub title: String,
    pub document_id: DocumentId,
    pub kind: ArtifactKind,
    pub content: String,
    pub is_visible: bool,
    pub status: ArtifactStatus,
    pub bounding_box: BoundingBox,
}

impl Artifact {
    /// The value an artifact is reset to when its view closes.
    pub fn initial() -> Self {
        Self {
            title: String::new(),
            document_id: DocumentId::placeholder(),
            kind: ArtifactKind::Text,
            content: String::new(),
            is_visible: false,
            status: ArtifactStatus::Idle,
            bounding_box: BoundingBox::default(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.status.is_streaming()
    }

    /// Put the artifact back to [`Artifact::initial`].
    pub fn reset(&mut self) {
        *self = Self::initial();
    }
}

impl Default for Artifact {
    fn default() -> Self {
        Self::initial()
    }
}
