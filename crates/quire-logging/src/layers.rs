//! Custom tracing layers
//!
//! [`DocumentContextLayer`] attaches the active document context to new
//! spans and reinstates it whenever such a span is entered, so work polled
//! on another thread still sees its document; [`jsonl_layer`] builds the JSON lines formatter used for both
//! console and file output.

use std::cell::RefCell;

use tracing::{Subscriber, span};
use tracing_subscriber::{
    fmt::{
        self, MakeWriter,
        format::{Format, Json, JsonFields},
    },
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::config::JsonlConfig;
use crate::context::{DocumentContextData, DocumentContextGuard, replace_current};

thread_local! {
    /// Contexts displaced by entered document spans, innermost last
    static DISPLACED: RefCell<Vec<Option<DocumentContextData>>> = const { RefCell::new(Vec::new()) };
}

/// Layer that records the active document context on every new span
#[derive(Debug, Default)]
pub struct DocumentContextLayer;

impl DocumentContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct DocumentContextExtension {
    pub data: DocumentContextData,
}

impl DocumentContextExtension {
    /// The document context recorded on span `id`, if any.
    pub fn lookup<S>(ctx: &Context<'_, S>, id: &span::Id) -> Option<DocumentContextData>
    where
        S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    {
        let span = ctx.span(id)?;
        let extensions = span.extensions();
        let data = extensions
            .get::<DocumentContextExtension>()
            .map(|ext| ext.data.clone());
        data
    }
}

impl<S> Layer<S> for DocumentContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(data) = DocumentContextGuard::current() {
                span.extensions_mut()
                    .insert(DocumentContextExtension { data });
            }
        }
    }

    fn on_enter(&self, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(data) = DocumentContextExtension::lookup(&ctx, id) {
            let previous = replace_current(Some(data));
            DISPLACED.with(|stack| stack.borrow_mut().push(previous));
        }
    }

    fn on_exit(&self, id: &span::Id, ctx: Context<'_, S>) {
        if DocumentContextExtension::lookup(&ctx, id).is_some() {
            if let Some(previous) = DISPLACED.with(|stack| stack.borrow_mut().pop()) {
                replace_current(previous);
            }
        }
    }
}

/// JSONL formatting layer writing to `writer`
pub fn jsonl_layer<S, W>(writer: W, config: &JsonlConfig) -> fmt::Layer<S, JsonFields, Format<Json>, W>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .json()
        .with_current_span(true)
        .with_span_list(config.include_spans)
        .flatten_event(config.flatten_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_info)
        .with_thread_names(config.include_thread_info)
}
