//! Structural diff between two document trees.
//!
//! Blocks are aligned first (Myers over whole blocks). Blocks that were
//! replaced by a block of the same type are compared word by word; all
//! others become whole inserted or deleted blocks. Reading only the
//! unchanged and inserted spans gives back the new tree's text, reading
//! only the unchanged and deleted spans gives back the old one.

use serde::Serialize;
use similar::{Algorithm, ChangeTag, DiffTag, TextDiff, capture_diff_slices};
use tracing::{trace, warn};

use crate::error::Result;
use crate::registry::ContentHandler;
use crate::tree::{Block, BlockKind, DocumentTree};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMark {
    Unchanged,
    Inserted,
    Deleted,
}

/// How a block as a whole changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockChange {
    Unchanged,
    Inserted,
    Deleted,
    /// Present on both sides with inline changes.
    Modified,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Span {
    pub mark: DiffMark,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnnotatedBlock {
    pub kind: BlockKind,
    pub change: BlockChange,
    pub spans: Vec<Span>,
}

impl AnnotatedBlock {
    fn whole(block: &Block, change: BlockChange, mark: DiffMark) -> Self {
        let spans = if block.text.is_empty() {
            Vec::new()
        } else {
            vec![Span {
                mark,
                text: block.text.clone(),
            }]
        };
        Self {
            kind: block.kind.clone(),
            change,
            spans,
        }
    }

    fn side_text(&self, skip: DiffMark) -> String {
        self.spans
            .iter()
            .filter(|s| s.mark != skip)
            .map(|s| s.text.as_str())
            .collect()
    }
}

/// A tree annotated with change marks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AnnotatedTree {
    pub blocks: Vec<AnnotatedBlock>,
    /// Set when the diff could not be computed and this is the new document
    /// shown without annotations.
    pub fallback: bool,
}

impl AnnotatedTree {
    /// The tree with every block unchanged.
    pub fn unannotated(tree: &DocumentTree) -> Self {
        Self {
            blocks: tree
                .blocks
                .iter()
                .map(|b| AnnotatedBlock::whole(b, BlockChange::Unchanged, DiffMark::Unchanged))
                .collect(),
            fallback: false,
        }
    }

    /// Text of the new side.
    pub fn new_text(&self) -> String {
        self.side(BlockChange::Deleted, DiffMark::Deleted)
    }

    /// Text of the old side.
    pub fn old_text(&self) -> String {
        self.side(BlockChange::Inserted, DiffMark::Inserted)
    }

    pub fn has_changes(&self) -> bool {
        self.blocks
            .iter()
            .any(|b| b.change != BlockChange::Unchanged)
    }

    fn side(&self, skip_block: BlockChange, skip_span: DiffMark) -> String {
        self.blocks
            .iter()
            .filter(|b| b.change != skip_block)
            .map(|b| b.side_text(skip_span))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Diff two trees.
pub fn diff(old: &DocumentTree, new: &DocumentTree) -> AnnotatedTree {
    let ops = capture_diff_slices(Algorithm::Myers, &old.blocks, &new.blocks);
    let mut blocks = Vec::with_capacity(new.blocks.len());

    for op in ops {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        trace!(?tag, ?old_range, ?new_range, "Block op");
        match tag {
            DiffTag::Equal => blocks.extend(new.blocks[new_range].iter().map(|b| {
                AnnotatedBlock::whole(b, BlockChange::Unchanged, DiffMark::Unchanged)
            })),
            DiffTag::Delete => blocks.extend(old.blocks[old_range].iter().map(|b| {
                AnnotatedBlock::whole(b, BlockChange::Deleted, DiffMark::Deleted)
            })),
            DiffTag::Insert => blocks.extend(new.blocks[new_range].iter().map(|b| {
                AnnotatedBlock::whole(b, BlockChange::Inserted, DiffMark::Inserted)
            })),
            DiffTag::Replace => {
                replace(&old.blocks[old_range], &new.blocks[new_range], &mut blocks)
            }
        }
    }

    AnnotatedTree {
        blocks,
        fallback: false,
    }
}

/// Pair replaced blocks positionally; same-type pairs get an inline diff.
fn replace(old: &[Block], new: &[Block], out: &mut Vec<AnnotatedBlock>) {
    let paired = old.len().min(new.len());
    for (o, n) in old.iter().zip(new) {
        if o.kind.same_type(&n.kind) {
            out.push(AnnotatedBlock {
                kind: n.kind.clone(),
                change: BlockChange::Modified,
                spans: inline(&o.text, &n.text),
            });
        } else {
            out.push(AnnotatedBlock::whole(o, BlockChange::Deleted, DiffMark::Deleted));
            out.push(AnnotatedBlock::whole(n, BlockChange::Inserted, DiffMark::Inserted));
        }
    }
    out.extend(
        old[paired..]
            .iter()
            .map(|b| AnnotatedBlock::whole(b, BlockChange::Deleted, DiffMark::Deleted)),
    );
    out.extend(
        new[paired..]
            .iter()
            .map(|b| AnnotatedBlock::whole(b, BlockChange::Inserted, DiffMark::Inserted)),
    );
}

fn inline(old: &str, new: &str) -> Vec<Span> {
    let diff = TextDiff::from_words(old, new);

    let mut spans: Vec<Span> = Vec::new();
    for change in diff.iter_all_changes() {
        let mark = match change.tag() {
            ChangeTag::Equal => DiffMark::Unchanged,
            ChangeTag::Insert => DiffMark::Inserted,
            ChangeTag::Delete => DiffMark::Deleted,
        };
        match spans.last_mut() {
            Some(last) if last.mark == mark => last.text.push_str(change.value()),
            _ => spans.push(Span {
                mark,
                text: change.value().to_string(),
            }),
        }
    }
    spans
}

/// Diff two contents of one kind, falling back to the new content
/// un-annotated when either side cannot be parsed.
pub fn diff_contents(handler: &dyn ContentHandler, old: &str, new: &str) -> AnnotatedTree {
    match (handler.parse_tree(old), handler.parse_tree(new)) {
        (Ok(old_tree), Ok(new_tree)) => diff(&old_tree, &new_tree),
        (old_tree, new_tree) => {
            warn!(
                kind = %handler.kind(),
                error = %first_error(&old_tree, &new_tree),
                "Diff failed, showing latest content without annotations"
            );
            fallback(new_tree.ok(), new)
        }
    }
}

/// Diff two JSON tree snapshots, with the same fallback as [`diff_contents`].
pub fn diff_snapshots(old_json: &str, new_json: &str) -> AnnotatedTree {
    match (
        DocumentTree::from_json(old_json),
        DocumentTree::from_json(new_json),
    ) {
        (Ok(old_tree), Ok(new_tree)) => diff(&old_tree, &new_tree),
        (old_tree, new_tree) => {
            warn!(
                error = %first_error(&old_tree, &new_tree),
                "Snapshot diff failed, showing latest snapshot without annotations"
            );
            fallback(new_tree.ok(), new_json)
        }
    }
}

fn first_error(old: &Result<DocumentTree>, new: &Result<DocumentTree>) -> String {
    old.as_ref()
        .err()
        .or(new.as_ref().err())
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn fallback(tree: Option<DocumentTree>, raw: &str) -> AnnotatedTree {
    let tree = tree.unwrap_or_else(|| DocumentTree::new(vec![Block::paragraph(raw)]));
    AnnotatedTree {
        fallback: true,
        ..AnnotatedTree::unannotated(&tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ImageHandler, TextHandler};

    fn md(source: &str) -> DocumentTree {
        DocumentTree::parse_markdown(source)
    }

    #[test]
    fn test_identical_trees_have_no_changes() {
        let tree = md("# A\n\nbody");
        let annotated = diff(&tree, &tree);
        assert!(!annotated.has_changes());
        assert_eq!(annotated.new_text(), tree.text());
    }

    #[test]
    fn test_inline_word_changes() {
        let annotated = diff(&md("the quick fox"), &md("the slow fox"));
        assert_eq!(annotated.blocks.len(), 1);
        let block = &annotated.blocks[0];
        assert_eq!(block.change, BlockChange::Modified);
        assert!(block.spans.contains(&Span {
            mark: DiffMark::Deleted,
            text: "quick".into()
        }));
        assert!(block.spans.contains(&Span {
            mark: DiffMark::Inserted,
            text: "slow".into()
        }));
        assert_eq!(annotated.new_text(), "the slow fox");
        assert_eq!(annotated.old_text(), "the quick fox");
    }

    #[test]
    fn test_type_change_replaces_whole_block() {
        let annotated = diff(&md("title"), &md("# title"));
        let changes: Vec<_> = annotated.blocks.iter().map(|b| b.change).collect();
        assert_eq!(changes, vec![BlockChange::Deleted, BlockChange::Inserted]);
        assert_eq!(annotated.new_text(), "title");
        assert_eq!(annotated.old_text(), "title");
    }

    #[test]
    fn test_inserted_and_deleted_blocks() {
        let old = md("# A\n\nkeep\n\n- gone");
        let new = md("# A\n\nkeep\n\n> added");
        let annotated = diff(&old, &new);
        assert_eq!(annotated.new_text(), new.text());
        assert_eq!(annotated.old_text(), old.text());
        assert!(annotated.has_changes());
    }

    #[test]
    fn test_image_diff_falls_back_to_new_content() {
        let annotated = diff_contents(&ImageHandler, "old-base64", "new-base64");
        assert!(annotated.fallback);
        assert!(!annotated.has_changes());
        assert_eq!(annotated.new_text(), "new-base64");
    }

    #[test]
    fn test_text_contents() {
        let handler = TextHandler::new(400..=450);
        let annotated = diff_contents(&handler, "Hello", "Hello world");
        assert!(!annotated.fallback);
        assert_eq!(annotated.new_text(), "Hello world");
    }

    #[test]
    fn test_malformed_snapshot_falls_back() {
        let new = md("# ok").to_json().unwrap();
        let annotated = diff_snapshots("{broken", &new);
        assert!(annotated.fallback);
        assert_eq!(annotated.new_text(), "ok");

        let annotated = diff_snapshots(&md("a").to_json().unwrap(), &md("b").to_json().unwrap());
        assert!(!annotated.fallback);
        assert_eq!(annotated.old_text(), "a");
    }
}
