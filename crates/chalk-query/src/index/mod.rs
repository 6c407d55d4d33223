pub mod document;
pub mod tfidf;
pub mod tokenize;

pub use document::{Document, MAX_TEXT_CHARS, SNIPPET_CHARS};
pub use tfidf::{idf, DocumentFrequency, QueryVector};
pub use tokenize::{term_counts, tokenize, MAX_TOKENS};
