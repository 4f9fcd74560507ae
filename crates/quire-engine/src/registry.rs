//! Per-kind content handlers.
//!
//! Each artifact kind plugs in a [`ContentHandler`] that knows when a
//! streaming artifact of that kind should be revealed and how its content
//! becomes a [`DocumentTree`]. Sessions refuse to open for kinds with no
//! registered handler.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use quire_core::ArtifactKind;

use crate::config::RevealThresholds;
use crate::error::{EngineError, Result};
use crate::tree::{BlockKind, DocumentTree};

pub trait ContentHandler: Send + Sync {
    fn kind(&self) -> ArtifactKind;

    /// Whether the artifact panel should open, given the content streamed
    /// so far.
    fn should_reveal(&self, content: &str) -> bool;

    /// Turn content of this kind into a tree.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Tree`] when the kind cannot be diffed.
    fn parse_tree(&self, content: &str) -> Result<DocumentTree>;
}

/// Markdown-lite prose.
pub struct TextHandler {
    reveal: RangeInclusive<usize>,
}

impl TextHandler {
    pub fn new(reveal: RangeInclusive<usize>) -> Self {
        Self { reveal }
    }
}

impl ContentHandler for TextHandler {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Text
    }

    fn should_reveal(&self, content: &str) -> bool {
        self.reveal.contains(&content.chars().count())
    }

    fn parse_tree(&self, content: &str) -> Result<DocumentTree> {
        Ok(DocumentTree::parse_markdown(content))
    }
}

/// Source code, diffed line by line.
pub struct CodeHandler {
    reveal: RangeInclusive<usize>,
}

impl CodeHandler {
    pub fn new(reveal: RangeInclusive<usize>) -> Self {
        Self { reveal }
    }
}

impl ContentHandler for CodeHandler {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Code
    }

    fn should_reveal(&self, content: &str) -> bool {
        self.reveal.contains(&content.chars().count())
    }

    fn parse_tree(&self, content: &str) -> Result<DocumentTree> {
        Ok(DocumentTree::from_lines(content, BlockKind::CodeLine))
    }
}

/// CSV sheets, diffed row by row.
pub struct SheetHandler;

impl ContentHandler for SheetHandler {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Sheet
    }

    fn should_reveal(&self, _content: &str) -> bool {
        true
    }

    fn parse_tree(&self, content: &str) -> Result<DocumentTree> {
        Ok(DocumentTree::from_lines(content, BlockKind::Row))
    }
}

/// Base64 images. Revealed immediately, never diffed.
pub struct ImageHandler;

impl ContentHandler for ImageHandler {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Image
    }

    fn should_reveal(&self, _content: &str) -> bool {
        true
    }

    fn parse_tree(&self, _content: &str) -> Result<DocumentTree> {
        Err(EngineError::tree("image content is not diffable"))
    }
}

/// Handlers by artifact kind.
#[derive(Clone, Default)]
pub struct KindRegistry {
    handlers: HashMap<ArtifactKind, Arc<dyn ContentHandler>>,
}

impl KindRegistry {
    /// A registry with no handlers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Handlers for every built-in kind.
    pub fn with_defaults(thresholds: &RevealThresholds) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(TextHandler::new(thresholds.text.clone())));
        registry.register(Arc::new(CodeHandler::new(thresholds.code.clone())));
        registry.register(Arc::new(SheetHandler));
        registry.register(Arc::new(ImageHandler));
        registry
    }

    /// Register a handler, replacing any previous one for its kind.
    pub fn register(&mut self, handler: Arc<dyn ContentHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: ArtifactKind) -> Result<Arc<dyn ContentHandler>> {
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or(EngineError::Configuration { kind })
    }

    pub fn contains(&self, kind: ArtifactKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}
