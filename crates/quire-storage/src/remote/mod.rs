//! Remote backend: document histories held by the document API server.

mod api;
mod repository;

pub use api::{DocumentApi, HttpDocumentApi, InMemoryDocumentApi};
pub use repository::RemoteDocumentRepository;
