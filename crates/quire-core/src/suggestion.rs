use serde::{Deserialize, Serialize};

use crate::id::DocumentId;

/// An edit proposal anchored to a document by the text it replaces.
///
/// `selection_start`/`selection_end` are character offsets into the
/// linearized text of the tree they were projected onto. They are only
/// meaningful for that tree and must be recomputed after every change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
    pub original_text: String,
    pub suggested_text: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_end: Option<usize>,
}

impl Suggestion {
    pub fn new(
        id: impl Into<String>,
        original_text: impl Into<String>,
        suggested_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            document_id: None,
            original_text: original_text.into(),
            suggested_text: suggested_text.into(),
            description: String::new(),
            is_resolved: false,
            selection_start: None,
            selection_end: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn for_document(mut self, document_id: DocumentId) -> Self {
        self.document_id = Some(document_id);
        self
    }

    /// Whether the suggestion currently has a location in the tree.
    pub fn is_anchored(&self) -> bool {
        matches!((self.selection_start, self.selection_end), (Some(s), Some(e)) if s <= e)
    }
}
