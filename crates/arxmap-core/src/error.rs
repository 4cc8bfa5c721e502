use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Catalog, download or storage failure. Stages catch these per item.
    #[error("External service failed: {0}")]
    External(String),

    #[error("Data integrity check failed: {0}")]
    DataIntegrity(String),

    /// Checkpoint directory or other scratch storage could not be managed.
    #[error("Resource failure: {0}")]
    Resource(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
