//! Suggestion storage and anchoring.

use dashmap::DashMap;
use quire_core::{DocumentId, Suggestion};
use tracing::{debug, trace};

use crate::tree::DocumentTree;

/// Anchor suggestions onto a tree.
///
/// Each suggestion is placed at the first occurrence of its
/// `original_text` in the tree's linearized text; offsets are in
/// characters. Suggestions whose text no longer appears, whose text is
/// empty, or which are already resolved are left out. When the same text
/// occurs more than once the suggestion always lands on the first one.
pub fn project(tree: &DocumentTree, suggestions: &[Suggestion]) -> Vec<Suggestion> {
    let text = tree.text();
    suggestions
        .iter()
        .filter(|s| !s.is_resolved && !s.original_text.is_empty())
        .filter_map(|s| {
            let Some(byte_start) = text.find(&s.original_text) else {
                trace!(suggestion = %s.id, "Anchor text not found, dropping suggestion");
                return None;
            };
            let start = text[..byte_start].chars().count();
            let end = start + s.original_text.chars().count();
            Some(Suggestion {
                selection_start: Some(start),
                selection_end: Some(end),
                ..s.clone()
            })
        })
        .collect()
}

/// Suggestions received for each document, in arrival order.
///
/// A suggestion arriving again with a known id replaces the earlier copy.
#[derive(Debug, Default)]
pub struct SuggestionStore {
    by_document: DashMap<DocumentId, Vec<Suggestion>>,
}

impl SuggestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, document_id: &DocumentId, suggestion: Suggestion) {
        let suggestion = Suggestion {
            document_id: Some(document_id.clone()),
            ..suggestion
        };
        let mut entries = self.by_document.entry(document_id.clone()).or_default();
        match entries.iter_mut().find(|s| s.id == suggestion.id) {
            Some(existing) => *existing = suggestion,
            None => entries.push(suggestion),
        }
        debug!(document = %document_id, count = entries.len(), "Stored suggestion");
    }

    pub fn for_document(&self, document_id: &DocumentId) -> Vec<Suggestion> {
        self.by_document
            .get(document_id)
            .map(|v| v.value().clone())
            .unwrap_or_default()
    }

    /// Mark a suggestion as resolved so it no longer projects.
    pub fn resolve(&self, document_id: &DocumentId, suggestion_id: &str) -> bool {
        let Some(mut entries) = self.by_document.get_mut(document_id) else {
            return false;
        };
        match entries.iter_mut().find(|s| s.id == suggestion_id) {
            Some(s) => {
                s.is_resolved = true;
                true
            }
            None => false,
        }
    }

    pub fn clear(&self, document_id: &DocumentId) {
        self.by_document.remove(document_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(source: &str) -> DocumentTree {
        DocumentTree::parse_markdown(source)
    }

    #[test]
    fn test_projects_character_offsets() {
        let tree = tree("# Café\n\nthe teh cat");
        let projected = project(&tree, &[Suggestion::new("s1", "teh", "the")]);
        assert_eq!(projected.len(), 1);
        // "Café\nthe " is 9 characters
        assert_eq!(projected[0].selection_start, Some(9));
        assert_eq!(projected[0].selection_end, Some(12));
        assert!(projected[0].is_anchored());
    }

    #[test]
    fn test_absent_anchor_is_dropped() {
        let projected = project(
            &tree("fixed text"),
            &[
                Suggestion::new("gone", "teh", "the"),
                Suggestion::new("empty", "", "x"),
                Suggestion::new("kept", "text", "prose"),
            ],
        );
        let ids: Vec<_> = projected.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["kept"]);
    }

    #[test]
    fn test_duplicate_text_anchors_to_first() {
        let projected = project(&tree("one two one"), &[Suggestion::new("s", "one", "1")]);
        assert_eq!(projected[0].selection_start, Some(0));
    }

    #[test]
    fn test_store_dedups_by_id() {
        let store = SuggestionStore::new();
        let doc = DocumentId::new("doc1");
        store.add(&doc, Suggestion::new("s1", "a", "b"));
        store.add(&doc, Suggestion::new("s2", "c", "d"));
        store.add(&doc, Suggestion::new("s1", "a", "B"));

        let stored = store.for_document(&doc);
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].suggested_text, "B");
        assert_eq!(stored[0].document_id.as_ref(), Some(&doc));
    }

    #[test]
    fn test_resolved_suggestions_do_not_project() {
        let store = SuggestionStore::new();
        let doc = DocumentId::new("doc1");
        store.add(&doc, Suggestion::new("s1", "word", "term"));
        assert!(store.resolve(&doc, "s1"));
        assert!(!store.resolve(&doc, "missing"));

        assert!(project(&tree("a word"), &store.for_document(&doc)).is_empty());
    }
}
