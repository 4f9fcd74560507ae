use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::DocumentId;
use crate::kind::ArtifactKind;

/// One persisted, immutable version of a document.
///
/// Edits never mutate a `Document`; they append a new one with the same `id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub user_id: String,
    pub title: String,
    pub kind: ArtifactKind,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Build the version a [`NewVersion`] request turns into.
    pub fn from_version(
        id: DocumentId,
        user_id: impl Into<String>,
        version: NewVersion,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            title: version.title,
            kind: version.kind,
            content: version.content,
            created_at,
            updated_at: created_at,
        }
    }
}

/// Payload of an append: the fields a caller controls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVersion {
    pub title: String,
    pub content: String,
    pub kind: ArtifactKind,
}

impl NewVersion {
    pub fn new(title: impl Into<String>, content: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            kind,
        }
    }
}
