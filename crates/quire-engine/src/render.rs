//! Rendering annotated trees as HTML or plain terminal text.

use std::fmt::Write;

use crate::diff::{AnnotatedBlock, AnnotatedTree, BlockChange, DiffMark};
use crate::tree::BlockKind;

/// Render to HTML. Each block becomes one element; changed spans are
/// wrapped in `<ins>`/`<del>` and whole-block changes carry a
/// `diff-inserted`/`diff-deleted` class.
pub fn render_html(tree: &AnnotatedTree) -> String {
    let mut out = String::new();
    for block in &tree.blocks {
        let (element, attrs) = html_element(&block.kind);
        let class = match block.change {
            BlockChange::Inserted => " class=\"diff-inserted\"",
            BlockChange::Deleted => " class=\"diff-deleted\"",
            BlockChange::Modified => " class=\"diff-modified\"",
            BlockChange::Unchanged => "",
        };
        let _ = write!(out, "<{element}{attrs}{class}>");
        for span in &block.spans {
            let text = escape_html(&span.text);
            let _ = match span.mark {
                DiffMark::Unchanged => write!(out, "{text}"),
                DiffMark::Inserted => write!(out, "<ins>{text}</ins>"),
                DiffMark::Deleted => write!(out, "<del>{text}</del>"),
            };
        }
        let _ = writeln!(out, "</{element}>");
    }
    out
}

fn html_element(kind: &BlockKind) -> (&'static str, String) {
    match kind {
        BlockKind::Heading { level } => match level {
            1 => ("h1", String::new()),
            2 => ("h2", String::new()),
            3 => ("h3", String::new()),
            4 => ("h4", String::new()),
            5 => ("h5", String::new()),
            _ => ("h6", String::new()),
        },
        BlockKind::Paragraph => ("p", String::new()),
        BlockKind::BulletItem => ("li", " data-list=\"bullet\"".into()),
        BlockKind::OrderedItem { number } => {
            ("li", format!(" data-list=\"ordered\" value=\"{number}\""))
        }
        BlockKind::Quote => ("blockquote", String::new()),
        BlockKind::CodeFence { language: Some(lang) } => {
            ("pre", format!(" data-language=\"{}\"", escape_html(lang)))
        }
        BlockKind::CodeFence { language: None } => ("pre", String::new()),
        BlockKind::CodeLine => ("div", " data-line".into()),
        BlockKind::Row => ("div", " data-row".into()),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Render to plain text using `{+inserted+}` and `[-deleted-]` markers.
pub fn render_terminal(tree: &AnnotatedTree) -> String {
    tree.blocks
        .iter()
        .map(terminal_block)
        .collect::<Vec<_>>()
        .join("\n")
}

fn terminal_block(block: &AnnotatedBlock) -> String {
    let mut out = match &block.kind {
        BlockKind::Heading { level } => format!("{} ", "#".repeat(*level as usize)),
        BlockKind::BulletItem => "- ".to_string(),
        BlockKind::OrderedItem { number } => format!("{number}. "),
        BlockKind::Quote => "> ".to_string(),
        BlockKind::CodeFence { .. } => "    ".to_string(),
        BlockKind::Paragraph | BlockKind::CodeLine | BlockKind::Row => String::new(),
    };
    for span in &block.spans {
        match span.mark {
            DiffMark::Unchanged => out.push_str(&span.text),
            DiffMark::Inserted => {
                let _ = write!(out, "{{+{}+}}", span.text);
            }
            DiffMark::Deleted => {
                let _ = write!(out, "[-{}-]", span.text);
            }
        }
    }
    out
}
