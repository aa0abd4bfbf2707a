use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("recovery failed: {0}")]
    Recovery(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
