//! Document context injection
//!
//! Thread-local storage for the document a piece of work belongs to, so log
//! entries from a session can be told apart when several documents are open.

use std::cell::RefCell;

use quire_core::{BackendKind, DocumentId};
use tracing::Span;
use uuid::Uuid;

/// Document context data stored in thread-local storage
#[derive(Debug, Clone)]
pub struct DocumentContextData {
    pub document_id: String,
    /// Which backend owns the document's history
    pub backend: BackendKind,
    /// Unique id for this session instance
    pub instance_id: Uuid,
}

impl DocumentContextData {
    /// A span carrying the context as fields.
    ///
    /// JSONL output includes the current span, so events emitted while it is
    /// entered carry the document id.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "document",
            document_id = %self.document_id,
            backend = %self.backend,
            instance_id = %self.instance_id,
        )
    }
}

thread_local! {
    static DOCUMENT_CONTEXT: RefCell<Option<DocumentContextData>> = const { RefCell::new(None) };
}

/// RAII guard for document context
///
/// Sets the document context for the current thread and restores the
/// previous one on drop.
///
/// # Example
///
/// ```ignore
/// use quire_core::DocumentId;
/// use quire_logging::DocumentContextGuard;
///
/// let _guard = DocumentContextGuard::new(&DocumentId::new("local-notes"));
/// tracing::info!("Loading history");
/// ```
pub struct DocumentContextGuard {
    previous: Option<DocumentContextData>,
}

impl DocumentContextGuard {
    pub fn new(id: &DocumentId) -> Self {
        Self::with_instance_id(id, Uuid::new_v4())
    }

    /// Create a guard with a specific instance ID
    ///
    /// Keeps one instance id across the documents a session moves through.
    pub fn with_instance_id(id: &DocumentId, instance_id: Uuid) -> Self {
        let previous = Self::current();
        let data = DocumentContextData {
            document_id: id.as_str().to_string(),
            backend: id.backend(),
            instance_id,
        };
        replace_current(Some(data));
        Self { previous }
    }

    pub fn current() -> Option<DocumentContextData> {
        DOCUMENT_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    pub fn current_document_id() -> Option<String> {
        Self::current().map(|ctx| ctx.document_id)
    }

    pub fn current_instance_id() -> Option<Uuid> {
        Self::current().map(|ctx| ctx.instance_id)
    }
}

impl Drop for DocumentContextGuard {
    fn drop(&mut self) {
        replace_current(self.previous.take());
    }
}

/// Swap the thread's document context, returning the one it replaces.
pub(crate) fn replace_current(data: Option<DocumentContextData>) -> Option<DocumentContextData> {
    DOCUMENT_CONTEXT.with(|ctx| std::mem::replace(&mut *ctx.borrow_mut(), data))
}

/// Span tagged with `id`, for instrumenting futures that may outlive a
/// thread-local guard.
pub fn document_span(id: &DocumentId, instance_id: Uuid) -> Span {
    let _guard = DocumentContextGuard::with_instance_id(id, instance_id);
    DocumentContextGuard::current().map_or_else(Span::none, |ctx| ctx.span())
}

/// Run a block with a document context set
///
/// ```ignore
/// with_document_context!(&id, {
///     tracing::info!("Restoring");
/// });
/// ```
#[macro_export]
macro_rules! with_document_context {
    ($id:expr, $body:block) => {{
        let _guard = $crate::context::DocumentContextGuard::new($id);
        $body
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_context_guard() {
        assert!(DocumentContextGuard::current().is_none());

        {
            let _guard = DocumentContextGuard::new(&DocumentId::new("local-notes"));
            let ctx = DocumentContextGuard::current().unwrap();
            assert_eq!(ctx.document_id, "local-notes");
            assert_eq!(ctx.backend, BackendKind::Local);
        }

        assert!(DocumentContextGuard::current().is_none());
    }

    #[test]
    fn test_nested_contexts() {
        let remote = DocumentId::generate();
        {
            let _outer = DocumentContextGuard::new(&DocumentId::new("a"));
            {
                let _inner = DocumentContextGuard::new(&remote);
                let ctx = DocumentContextGuard::current().unwrap();
                assert_eq!(ctx.backend, BackendKind::Remote);
                assert_eq!(ctx.document_id, remote.as_str());
            }
            assert_eq!(
                DocumentContextGuard::current_document_id(),
                Some("a".to_string())
            );
        }
        assert!(DocumentContextGuard::current_document_id().is_none());
    }

    #[test]
    fn test_with_instance_id() {
        let instance_id = Uuid::new_v4();
        let _guard = DocumentContextGuard::with_instance_id(&DocumentId::new("x"), instance_id);
        assert_eq!(DocumentContextGuard::current_instance_id(), Some(instance_id));
    }

    #[test]
    fn test_document_span_leaves_no_context_behind() {
        let _span = document_span(&DocumentId::new("spanned"), Uuid::new_v4());
        assert!(DocumentContextGuard::current().is_none());
    }

    #[test]
    fn test_macro_scopes_context() {
        let id = DocumentId::new("macro-doc");
        let seen = crate::with_document_context!(&id, {
            DocumentContextGuard::current_document_id()
        });
        assert_eq!(seen.as_deref(), Some("macro-doc"));
        assert!(DocumentContextGuard::current().is_none());
    }
}
