#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Nothing to index in {0}")]
    EmptyDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
