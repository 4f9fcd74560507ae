//! Document trees: the block structure diffs and suggestions operate on.
//!
//! Every content kind is reduced to a flat sequence of [`Block`]s. The
//! tree's linearized text is its blocks' text joined by `'\n'`; diff spans
//! and suggestion offsets refer to that text.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// What a block is, independent of its text.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BlockKind {
    Heading { level: u8 },
    Paragraph,
    BulletItem,
    OrderedItem { number: u32 },
    Quote,
    CodeFence { language: Option<String> },
    /// One line of a code artifact.
    CodeLine,
    /// One row of a sheet artifact.
    Row,
}

impl BlockKind {
    /// Whether two blocks can be compared word by word.
    pub fn same_type(&self, other: &BlockKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Block {
    #[serde(flatten)]
    pub kind: BlockKind,
    pub text: String,
}

impl Block {
    pub fn new(kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(BlockKind::Paragraph, text)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTree {
    pub blocks: Vec<Block>,
}

impl DocumentTree {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Parse lightweight Markdown.
    ///
    /// Recognizes ATX headings, bullet (`-`, `*`, `+`) and ordered (`1.`)
    /// list items, `>` quotes, fenced code blocks and paragraphs separated
    /// by blank lines. Consecutive paragraph or quote lines form one block.
    /// An unterminated fence runs to the end of the input.
    pub fn parse_markdown(source: &str) -> Self {
        let mut blocks = Vec::new();
        let mut lines = source.lines();
        let mut open: Option<Block> = None;

        while let Some(line) = lines.next() {
            let trimmed = line.trim_start();

            if let Some(info) = trimmed.strip_prefix("```") {
                flush(&mut open, &mut blocks);
                let language = Some(info.trim())
                    .filter(|l| !l.is_empty())
                    .map(str::to_string);
                let mut body = Vec::new();
                for inner in lines.by_ref() {
                    if inner.trim_start().starts_with("```") {
                        break;
                    }
                    body.push(inner);
                }
                blocks.push(Block::new(BlockKind::CodeFence { language }, body.join("\n")));
                continue;
            }

            if trimmed.is_empty() {
                flush(&mut open, &mut blocks);
                continue;
            }

            if let Some((level, text)) = heading(trimmed) {
                flush(&mut open, &mut blocks);
                blocks.push(Block::new(BlockKind::Heading { level }, text));
                continue;
            }

            if let Some(text) = bullet(trimmed) {
                flush(&mut open, &mut blocks);
                blocks.push(Block::new(BlockKind::BulletItem, text));
                continue;
            }

            if let Some((number, text)) = ordered(trimmed) {
                flush(&mut open, &mut blocks);
                blocks.push(Block::new(BlockKind::OrderedItem { number }, text));
                continue;
            }

            if let Some(text) = quote(trimmed) {
                match open.as_mut() {
                    Some(block) if block.kind == BlockKind::Quote => {
                        block.text.push('\n');
                        block.text.push_str(text);
                    }
                    _ => {
                        flush(&mut open, &mut blocks);
                        open = Some(Block::new(BlockKind::Quote, text));
                    }
                }
                continue;
            }

            match open.as_mut() {
                Some(block) if block.kind == BlockKind::Paragraph => {
                    block.text.push('\n');
                    block.text.push_str(line.trim());
                }
                _ => {
                    flush(&mut open, &mut blocks);
                    open = Some(Block::paragraph(line.trim()));
                }
            }
        }
        flush(&mut open, &mut blocks);

        Self { blocks }
    }

    /// One block per source line. Joining the blocks reproduces the input.
    pub fn from_lines(source: &str, kind: BlockKind) -> Self {
        Self {
            blocks: source
                .split('\n')
                .map(|line| Block::new(kind.clone(), line))
                .collect(),
        }
    }

    /// Load a tree snapshot serialized with [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::tree(format!("invalid snapshot: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| EngineError::tree(e.to_string()))
    }

    /// The tree's text: block texts joined by newlines.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

fn flush(open: &mut Option<Block>, blocks: &mut Vec<Block>) {
    if let Some(block) = open.take() {
        blocks.push(block);
    }
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let level = line.bytes().take_while(|b| *b == b'#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &line[level..];
    if rest.is_empty() {
        return Some((level as u8, ""));
    }
    rest.strip_prefix(' ').map(|text| (level as u8, text.trim()))
}

fn bullet(line: &str) -> Option<&str> {
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .map(str::trim)
}

fn ordered(line: &str) -> Option<(u32, &str)> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits > 9 {
        return None;
    }
    let number = line[..digits].parse().ok()?;
    let text = line[digits..].strip_prefix(". ")?;
    Some((number, text.trim()))
}

fn quote(line: &str) -> Option<&str> {
    line.strip_prefix('>').map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_markdown_blocks() {
        let tree = DocumentTree::parse_markdown(
            "# Title\n\nFirst line\nsecond line\n\n- one\n* two\n3. three\n> quoted\n> more\n```rust\nfn main() {}\n```\ntail",
        );
        let kinds: Vec<_> = tree.blocks.iter().map(|b| b.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::Heading { level: 1 },
                BlockKind::Paragraph,
                BlockKind::BulletItem,
                BlockKind::BulletItem,
                BlockKind::OrderedItem { number: 3 },
                BlockKind::Quote,
                BlockKind::CodeFence {
                    language: Some("rust".into())
                },
                BlockKind::Paragraph,
            ]
        );
        assert_eq!(tree.blocks[1].text, "First line\nsecond line");
        assert_eq!(tree.blocks[5].text, "quoted\nmore");
        assert_eq!(tree.blocks[6].text, "fn main() {}");
    }

    #[test]
    fn test_heading_requires_space() {
        let tree = DocumentTree::parse_markdown("#hashtag\n####### seven");
        assert_eq!(tree.blocks.len(), 1);
        assert_eq!(tree.blocks[0].kind, BlockKind::Paragraph);
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let tree = DocumentTree::parse_markdown("```\na\n\nb");
        assert_eq!(tree.blocks.len(), 1);
        assert_eq!(tree.blocks[0].text, "a\n\nb");
    }

    #[test]
    fn test_from_lines_reproduces_source() {
        let source = "a,b\n1,2\n\n3,4";
        let tree = DocumentTree::from_lines(source, BlockKind::Row);
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.text(), source);
    }

    #[test]
    fn test_json_snapshot() {
        let tree = DocumentTree::parse_markdown("## Hi\n\nbody");
        let json = tree.to_json().unwrap();
        assert!(json.contains(r#""type":"heading""#));
        assert_eq!(DocumentTree::from_json(&json).unwrap(), tree);

        let err = DocumentTree::from_json(r#"{"blocks":[{"type":"table"}]}"#).unwrap_err();
        assert!(matches!(err, EngineError::Tree(_)));
    }

    #[test]
    fn test_blocks_are_totally_ordered() {
        let mut blocks = vec![
            Block::paragraph("b"),
            Block::new(BlockKind::Heading { level: 2 }, "z"),
            Block::paragraph("a"),
        ];
        blocks.sort();
        assert_eq!(blocks[0].kind, BlockKind::Heading { level: 2 });
        assert_eq!(blocks[1].text, "a");
        assert_eq!(blocks[2].text, "b");
    }

    #[test]
    fn test_text_joins_blocks() {
        let tree = DocumentTree::parse_markdown("# A\n\nb c");
        assert_eq!(tree.text(), "A\nb c");
        assert!(DocumentTree::parse_markdown("").is_empty());
    }
}
