use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one finished scheduler run, kept for prompt similarity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub prompt: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    pub score: f64,
    pub time: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(prompt: &str, tech_stack: Vec<String>, artifacts: Vec<String>, score: f64) -> Self {
        Self {
            prompt: prompt.to_string(),
            tech_stack,
            artifacts,
            score,
            time: Utc::now(),
        }
    }
}
