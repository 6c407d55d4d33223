use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chalk_core::Blackboard;
use chalk_query::RagStore;
use serde_json::{json, Value};

use crate::agent::{Agent, Readiness};
use crate::error::AgentError;

const MAX_FILES: usize = 25;
const READ_CHARS: usize = 4000;
const INDEXED_CHARS: usize = 1500;

/// Indexes generated files into the document store once they exist.
///
/// Reads the paths listed under `<source>.files`, relative to the project
/// root. Missing files and paths that leave the root are skipped.
pub struct IngestAgent {
    project_root: PathBuf,
    rag: Arc<RagStore>,
    source: String,
    readiness: Readiness,
}

impl IngestAgent {
    pub const ID: &'static str = "ingest";

    pub fn new(project_root: impl Into<PathBuf>, rag: Arc<RagStore>) -> Self {
        Self::with_source(project_root, rag, "codegen")
    }

    pub fn with_source(
        project_root: impl Into<PathBuf>,
        rag: Arc<RagStore>,
        source: impl Into<String>,
    ) -> Self {
        let source = source.into();
        Self {
            project_root: project_root.into(),
            rag,
            readiness: Readiness::new(Self::ID).requires([source.clone()]),
            source,
        }
    }
}

impl Agent for IngestAgent {
    fn id(&self) -> &str {
        Self::ID
    }

    fn can_run(&self, state: &Blackboard) -> bool {
        self.readiness.is_ready(state)
    }

    fn run(&self, state: &Blackboard) -> Result<Value, AgentError> {
        let files = state
            .get(&self.source)
            .and_then(|v| v.get("files"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut indexed = Vec::new();
        for file in files.iter().take(MAX_FILES) {
            let Some(rel) = file
                .as_str()
                .or_else(|| file.get("path").and_then(Value::as_str))
            else {
                continue;
            };
            if !is_contained(rel) {
                tracing::warn!("Skipping {rel}: outside the project root");
                continue;
            }
            let path = self.project_root.join(rel);
            if !path.exists() {
                continue;
            }
            let content: String = match std::fs::read_to_string(&path) {
                Ok(text) => text.chars().take(READ_CHARS).collect(),
                Err(e) => {
                    tracing::warn!("Skipping {}: {e}", path.display());
                    continue;
                }
            };
            let excerpt: String = content.chars().take(INDEXED_CHARS).collect();
            let text = format!("FILE: {rel}\nCONTENT:\n{excerpt}");
            let metadata = json!({"type": "code", "len": content.chars().count()});
            if self.rag.add_document(rel, &text, Some(metadata)) {
                indexed.push(rel.to_string());
            }
        }
        tracing::debug!("Indexed {} of {} files", indexed.len(), files.len());
        Ok(json!({ "indexed": indexed }))
    }
}

/// Relative and free of `..`, so joining it cannot escape the root.
fn is_contained(rel: &str) -> bool {
    Path::new(rel)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_waits_for_source() {
        let agent = IngestAgent::new(".", Arc::new(RagStore::in_memory()));
        let mut state = Blackboard::seeded("p", "n");
        assert!(!agent.can_run(&state));
        state.insert("codegen", json!({"files": []})).unwrap();
        assert!(agent.can_run(&state));
        state.insert("ingest", json!({"indexed": []})).unwrap();
        assert!(!agent.can_run(&state));
    }

    #[test]
    fn test_indexes_existing_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("app")).unwrap();
        std::fs::write(tmp.path().join("app/main.py"), "from fastapi import FastAPI\n").unwrap();
        std::fs::write(tmp.path().join("big.txt"), "x".repeat(5000)).unwrap();

        let rag = Arc::new(RagStore::in_memory());
        let agent = IngestAgent::new(tmp.path(), Arc::clone(&rag));
        let mut state = Blackboard::seeded("p", "n");
        state
            .insert(
                "codegen",
                json!({"files": ["app/main.py", {"path": "big.txt"}, "missing.py", 7]}),
            )
            .unwrap();

        let out = agent.run(&state).unwrap();
        assert_eq!(out, json!({"indexed": ["app/main.py", "big.txt"]}));

        let doc = rag.get("app/main.py").unwrap();
        assert_eq!(doc.text, "FILE: app/main.py\nCONTENT:\nfrom fastapi import FastAPI\n");
        assert_eq!(doc.metadata, json!({"type": "code", "len": 28}));

        let big = rag.get("big.txt").unwrap();
        assert_eq!(big.metadata["len"], json!(4000));
        assert_eq!(big.text.len(), "FILE: big.txt\nCONTENT:\n".len() + 1500);
        assert_eq!(rag.similarity("fastapi", 1)[0].doc_id, "app/main.py");
    }

    #[test]
    fn test_caps_file_count() {
        let tmp = TempDir::new().unwrap();
        let names: Vec<String> = (0..30).map(|i| format!("f{i}.txt")).collect();
        for name in &names {
            std::fs::write(tmp.path().join(name), format!("file {name}")).unwrap();
        }
        let agent = IngestAgent::with_source(tmp.path(), Arc::new(RagStore::in_memory()), "files_out");
        let mut state = Blackboard::seeded("p", "n");
        state.insert("files_out", json!({ "files": names })).unwrap();
        let out = agent.run(&state).unwrap();
        assert_eq!(out["indexed"].as_array().unwrap().len(), 25);
    }

    #[test]
    fn test_skips_paths_outside_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("project");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("ok.txt"), "inside the project").unwrap();
        let secret = tmp.path().join("secret.txt");
        std::fs::write(&secret, "outside the project").unwrap();

        let rag = Arc::new(RagStore::in_memory());
        let agent = IngestAgent::new(root.clone(), Arc::clone(&rag));
        let mut state = Blackboard::seeded("p", "n");
        state
            .insert(
                "codegen",
                json!({"files": ["../secret.txt", secret.display().to_string(), "./ok.txt", "sub/../ok.txt"]}),
            )
            .unwrap();

        let out = agent.run(&state).unwrap();
        assert_eq!(out, json!({"indexed": ["./ok.txt"]}));
        assert_eq!(rag.len(), 1);
        assert!(rag.similarity("outside", 5).iter().all(|h| h.doc_id == "./ok.txt"));
    }
}
