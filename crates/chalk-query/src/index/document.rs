use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest text kept per document, in characters.
pub const MAX_TEXT_CHARS: usize = 8000;
/// Longest snippet returned with a hit, in characters.
pub const SNIPPET_CHARS: usize = 400;

/// A retrievable text with caller-supplied metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub text: String,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    #[serde(default = "Utc::now")]
    pub added: DateTime<Utc>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl Document {
    /// Build a document, truncating the text to [`MAX_TEXT_CHARS`].
    pub fn new(doc_id: &str, text: &str, metadata: Option<Value>) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            text: truncate_chars(text, MAX_TEXT_CHARS).to_string(),
            metadata: metadata.unwrap_or_else(empty_object),
            added: Utc::now(),
        }
    }

    /// The leading [`SNIPPET_CHARS`] characters on a single line.
    pub fn snippet(&self) -> String {
        truncate_chars(&self.text, SNIPPET_CHARS).replace('\n', " ")
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
