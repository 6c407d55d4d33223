use std::collections::{HashMap, HashSet};

use super::document::Document;
use super::tokenize::{term_counts, tokenize};

/// Number of documents containing each token.
#[derive(Debug, Clone, Default)]
pub struct DocumentFrequency {
    counts: HashMap<String, usize>,
}

impl DocumentFrequency {
    /// Recount from scratch over every document.
    pub fn rebuild<'a>(docs: impl IntoIterator<Item = &'a Document>) -> Self {
        let mut counts = HashMap::new();
        for doc in docs {
            let tokens = tokenize(&doc.text);
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for token in unique {
                *counts.entry(token.to_string()).or_insert(0) += 1;
            }
        }
        Self { counts }
    }

    pub fn get(&self, token: &str) -> usize {
        self.counts.get(token).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// `ln(N / df)` with df floored at 1.
pub fn idf(total_docs: usize, df: usize) -> f64 {
    (total_docs as f64 / df.max(1) as f64).ln()
}

/// TF-IDF weights of a query against a corpus.
///
/// When every query term occurs in every document all idf weights are zero;
/// the vector then falls back to plain relative term frequency (for the query
/// and for the documents it is compared against) so that matches still rank.
#[derive(Debug, Clone)]
pub struct QueryVector {
    weights: HashMap<String, f64>,
    norm: f64,
    total_docs: usize,
    tf_only: bool,
}

impl QueryVector {
    pub fn build(tokens: &[String], df: &DocumentFrequency, total_docs: usize) -> Self {
        let counts = term_counts(tokens);
        let len = tokens.len().max(1) as f64;

        let weigh = |tf_only: bool| -> HashMap<String, f64> {
            counts
                .iter()
                .map(|(term, count)| {
                    let tf = *count as f64 / len;
                    let w = if tf_only {
                        tf
                    } else {
                        tf * idf(total_docs, df.get(term))
                    };
                    (term.to_string(), w)
                })
                .collect()
        };

        let mut weights = weigh(false);
        let mut tf_only = false;
        if !weights.is_empty() && weights.values().all(|w| *w == 0.0) {
            weights = weigh(true);
            tf_only = true;
        }
        let norm = l2(weights.values());
        Self {
            weights,
            norm,
            total_docs,
            tf_only,
        }
    }

    pub fn is_tf_only(&self) -> bool {
        self.tf_only
    }

    /// Cosine similarity with a document whose vector is restricted to the
    /// terms it shares with the query. Zero norms count as 1.
    pub fn cosine(&self, doc_tokens: &[String], df: &DocumentFrequency) -> f64 {
        if doc_tokens.is_empty() {
            return 0.0;
        }
        let len = doc_tokens.len() as f64;
        let doc_vec: HashMap<&str, f64> = term_counts(doc_tokens)
            .into_iter()
            .filter(|(term, _)| self.weights.contains_key(*term))
            .map(|(term, count)| {
                let tf = count as f64 / len;
                let w = if self.tf_only {
                    tf
                } else {
                    tf * idf(self.total_docs, df.get(term))
                };
                (term, w)
            })
            .collect();

        let dot: f64 = self
            .weights
            .iter()
            .map(|(term, w)| w * doc_vec.get(term.as_str()).copied().unwrap_or(0.0))
            .sum();
        let q_norm = if self.norm == 0.0 { 1.0 } else { self.norm };
        let d_norm = match l2(doc_vec.values()) {
            n if n == 0.0 => 1.0,
            n => n,
        };
        dot / (q_norm * d_norm)
    }
}

fn l2<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.map(|v| v * v).sum::<f64>().sqrt()
}
