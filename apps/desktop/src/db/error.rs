//! Database error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("item not found: {0}")]
    ItemNotFound(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("storage task failed: {0}")]
    Task(String),
}
