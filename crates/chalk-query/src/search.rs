use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use chalk_core::storage;

use crate::error::QueryError;
use crate::index::{tokenize, Document, DocumentFrequency, QueryVector};

/// Hits returned by [`RagStore::similarity`] when no limit is given.
pub const DEFAULT_TOP_K: usize = 5;
/// Hits folded into [`RagStore::contextualize`] when no limit is given.
pub const DEFAULT_CONTEXT_K: usize = 3;

/// One retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub doc_id: String,
    /// Cosine similarity rounded to four decimals.
    pub score: f64,
    pub snippet: String,
    pub metadata: Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    #[serde(default)]
    docs: Vec<Document>,
}

#[derive(Debug, Default)]
struct Corpus {
    docs: Vec<Document>,
    df: DocumentFrequency,
    dirty: bool,
}

/// Small TF-IDF document index persisted as one JSON file.
///
/// Sized for tens to low hundreds of documents: the document-frequency table
/// is rebuilt in full on every write and every query scans the whole corpus.
pub struct RagStore {
    path: Option<PathBuf>,
    corpus: Mutex<Corpus>,
    degraded: AtomicBool,
}

impl RagStore {
    /// Open the index backed by `path`. Missing or unreadable files start empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let docs = match storage::load::<Persisted>(&path) {
            Ok(Some(persisted)) => persisted.docs,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable document index {}: {e}", path.display());
                Vec::new()
            }
        };
        let df = DocumentFrequency::rebuild(&docs);
        tracing::debug!(
            "Loaded document index {} ({} docs, {} terms)",
            path.display(),
            docs.len(),
            df.len()
        );
        Self {
            path: Some(path),
            corpus: Mutex::new(Corpus {
                docs,
                df,
                dirty: false,
            }),
            degraded: AtomicBool::new(false),
        }
    }

    /// An index that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            corpus: Mutex::new(Corpus::default()),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True once any write to disk has failed during this process.
    pub fn persistence_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Corpus> {
        self.corpus.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().docs.is_empty()
    }

    pub fn get(&self, doc_id: &str) -> Option<Document> {
        self.lock().docs.iter().find(|d| d.doc_id == doc_id).cloned()
    }

    /// Insert or replace a document. Blank text is ignored and returns `false`.
    ///
    /// A replaced document keeps its position in the corpus.
    pub fn add_document(&self, doc_id: &str, text: &str, metadata: Option<Value>) -> bool {
        if text.trim().is_empty() {
            tracing::debug!("Skipping blank document {doc_id}");
            return false;
        }
        let doc = Document::new(doc_id, text, metadata);
        let mut corpus = self.lock();
        match corpus.docs.iter().position(|d| d.doc_id == doc_id) {
            Some(idx) => corpus.docs[idx] = doc,
            None => corpus.docs.push(doc),
        }
        corpus.df = DocumentFrequency::rebuild(&corpus.docs);
        corpus.dirty = true;
        self.persist(&mut corpus);
        true
    }

    /// Index a file's contents under `doc_id` (the path when `None`).
    pub fn add_file(&self, path: &Path, doc_id: Option<&str>) -> Result<String, QueryError> {
        let text = std::fs::read_to_string(path)?;
        let id = doc_id
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());
        let metadata = serde_json::json!({
            "source": path.display().to_string(),
            "len": text.chars().count(),
        });
        if !self.add_document(&id, &text, Some(metadata)) {
            return Err(QueryError::EmptyDocument(path.display().to_string()));
        }
        Ok(id)
    }

    fn persist(&self, corpus: &mut Corpus) {
        if !corpus.dirty {
            return;
        }
        let Some(path) = &self.path else {
            corpus.dirty = false;
            return;
        };
        let snapshot = Persisted {
            docs: corpus.docs.clone(),
        };
        match storage::save(path, &snapshot) {
            Ok(()) => corpus.dirty = false,
            Err(e) => {
                tracing::warn!("Failed to persist document index {}: {e}", path.display());
                self.degraded.store(true, Ordering::Relaxed);
            }
        }
    }

    /// Rank documents by TF-IDF cosine similarity to `query`.
    pub fn similarity(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        let corpus = self.lock();
        if corpus.docs.is_empty() {
            return Vec::new();
        }
        let q_tokens = tokenize(query);
        if q_tokens.is_empty() {
            return Vec::new();
        }

        let query = QueryVector::build(&q_tokens, &corpus.df, corpus.docs.len());
        let mut scored: Vec<(f64, &Document)> = corpus
            .docs
            .iter()
            .filter_map(|doc| {
                let d_tokens = tokenize(&doc.text);
                if d_tokens.is_empty() {
                    return None;
                }
                Some((query.cosine(&d_tokens, &corpus.df), doc))
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, doc)| SearchResult {
                doc_id: doc.doc_id.clone(),
                score: round4(score),
                snippet: doc.snippet(),
                metadata: doc.metadata.clone(),
            })
            .collect()
    }

    /// Top hits formatted as `[DOC <id> S=<score>] <snippet>` lines, or an
    /// empty string when nothing matches. Whole scores keep one decimal (`1.0`).
    pub fn contextualize(&self, query: &str, top_k: usize) -> String {
        self.similarity(query, top_k)
            .iter()
            .map(|r| format!("[DOC {} S={:?}] {}", r.doc_id, r.score, r.snippet))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn round4(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}
