use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid store document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: String,
        source: std::io::Error,
    },

    #[error("Key `{0}` is reserved and cannot be overwritten")]
    ReservedKey(String),

    #[error("Invalid agent ID: {0}")]
    InvalidId(String),
}
