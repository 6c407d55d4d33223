use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::CoreError;

/// The original request. Set once when a run is seeded and never overwritten.
pub const PROMPT_KEY: &str = "prompt";
/// Opaque run identifier.
pub const NAME_KEY: &str = "name";
/// Opaque toggle map; the scheduler passes it through and agents interpret it.
pub const CONFIG_KEY: &str = "config";
/// Externally supplied clarification overrides.
pub const ANSWERS_KEY: &str = "answers";

/// Shared state every agent reads from.
///
/// Only the scheduler holds a `&mut Blackboard`; agents are handed a shared
/// reference and contribute by returning values that the scheduler merges.
/// Every successful write bumps [`version`](Self::version) and stamps the
/// written key with the new version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blackboard {
    entries: BTreeMap<String, Value>,
    stamps: BTreeMap<String, u64>,
    version: u64,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A blackboard holding the immutable prompt and the run name.
    pub fn seeded(prompt: &str, name: &str) -> Self {
        let mut board = Self::new();
        board.write(PROMPT_KEY.to_string(), Value::String(prompt.to_string()));
        board.write(NAME_KEY.to_string(), Value::String(name.to_string()));
        board
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Resolve a dotted path such as `evaluate.score` or `codegen.files.0`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.entries.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn prompt(&self) -> Option<&str> {
        self.entries.get(PROMPT_KEY).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.entries.get(NAME_KEY).and_then(Value::as_str)
    }

    /// True when `config.<toggle>` is set to `true`.
    pub fn config_flag(&self, toggle: &str) -> bool {
        self.entries
            .get(CONFIG_KEY)
            .and_then(|c| c.get(toggle))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Write a value under `key`.
    ///
    /// The prompt may be written once; later writes to it are rejected.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<(), CoreError> {
        let key = key.into();
        if key == PROMPT_KEY && self.entries.contains_key(PROMPT_KEY) {
            return Err(CoreError::ReservedKey(key));
        }
        self.write(key, value);
        Ok(())
    }

    fn write(&mut self, key: String, value: Value) {
        self.version += 1;
        self.stamps.insert(key.clone(), self.version);
        self.entries.insert(key, value);
    }

    /// Version at which `key` was last written.
    pub fn written_at(&self, key: &str) -> Option<u64> {
        self.stamps.get(key).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of writes applied so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn entries(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }

    /// The blackboard as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn into_entries(self) -> BTreeMap<String, Value> {
        self.entries
    }
}

impl Serialize for Blackboard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_seeded_board() {
        let board = Blackboard::seeded("build a blog", "blog");
        assert_eq!(board.prompt(), Some("build a blog"));
        assert_eq!(board.name(), Some("blog"));
        assert_eq!(board.len(), 2);
        assert_eq!(board.version(), 2);
    }

    #[test]
    fn test_prompt_is_immutable() {
        let mut board = Blackboard::seeded("original", "run");
        let err = board.insert(PROMPT_KEY, json!("changed")).unwrap_err();
        assert!(matches!(err, CoreError::ReservedKey(_)));
        assert_eq!(board.prompt(), Some("original"));
        assert_eq!(board.version(), 2);
    }

    #[test]
    fn test_insert_bumps_version_and_overwrites() {
        let mut board = Blackboard::new();
        board.insert("tech", json!({"stack": ["rust"]})).unwrap();
        board.insert("tech", json!({"stack": ["go"]})).unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board.version(), 2);
        assert_eq!(board.written_at("tech"), Some(2));
        assert_eq!(board.lookup("tech.stack.0"), Some(&json!("go")));
    }

    #[test]
    fn test_write_stamps_order_keys() {
        let mut board = Blackboard::seeded("p", "n");
        board.insert("clarify", json!({})).unwrap();
        board.insert("redo_clarify", json!(true)).unwrap();
        assert!(board.written_at("redo_clarify") > board.written_at("clarify"));
        assert_eq!(board.written_at(PROMPT_KEY), Some(1));
        assert!(board.written_at("absent").is_none());
    }

    #[test]
    fn test_lookup_paths() {
        let mut board = Blackboard::new();
        board
            .insert("evaluate", json!({"score": 72, "notes": {"ok": true}}))
            .unwrap();
        assert_eq!(board.lookup("evaluate.score"), Some(&json!(72)));
        assert_eq!(board.lookup("evaluate.notes.ok"), Some(&json!(true)));
        assert!(board.lookup("evaluate.missing").is_none());
        assert!(board.lookup("evaluate.score.deeper").is_none());
        assert!(board.lookup("absent").is_none());
    }

    #[test]
    fn test_config_flag() {
        let mut board = Blackboard::new();
        assert!(!board.config_flag("boilerplate_only"));
        board
            .insert(CONFIG_KEY, json!({"boilerplate_only": true, "fast": "yes"}))
            .unwrap();
        assert!(board.config_flag("boilerplate_only"));
        assert!(!board.config_flag("fast"));
    }

    #[test]
    fn test_to_json_is_object() {
        let board = Blackboard::seeded("p", "n");
        assert_eq!(board.to_json(), json!({"name": "n", "prompt": "p"}));
        assert_eq!(serde_json::to_value(&board).unwrap(), board.to_json());
    }
}
