pub mod error;
pub mod index;
pub mod search;

pub use error::QueryError;
pub use index::{Document, DocumentFrequency};
pub use search::{RagStore, SearchResult, DEFAULT_CONTEXT_K, DEFAULT_TOP_K};
