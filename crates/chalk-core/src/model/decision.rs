use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::blackboard::Blackboard;

const HASH_INPUT_LIMIT: usize = 512;
const HASH_HEX_LEN: usize = 16;

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "fail")]
    Failure,
}

impl Outcome {
    pub fn from_success(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Audit entry for one selection. Never consulted by scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub state_hash: String,
    pub chosen_agent: String,
    pub outcome: Outcome,
    pub time: DateTime<Utc>,
}

impl Decision {
    pub fn new(state: &Blackboard, chosen_agent: &str, outcome: Outcome) -> Self {
        Self {
            state_hash: state_hash(state),
            chosen_agent: chosen_agent.to_string(),
            outcome,
            time: Utc::now(),
        }
    }
}

/// Fingerprint of which keys are present on the blackboard: the first 16 hex
/// chars of SHA-256 over the (at most 512 byte) JSON key listing.
pub fn state_hash(state: &Blackboard) -> String {
    let keys: Vec<&str> = state.keys().collect();
    let listing = serde_json::json!({ "keys": keys }).to_string();
    let mut end = listing.len().min(HASH_INPUT_LIMIT);
    while !listing.is_char_boundary(end) {
        end -= 1;
    }
    let digest = format!("{:x}", Sha256::digest(&listing.as_bytes()[..end]));
    digest[..HASH_HEX_LEN].to_string()
}
