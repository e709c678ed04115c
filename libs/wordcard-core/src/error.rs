//! Error types for wordcard-core.

use thiserror::Error;

/// Errors from the review scheduler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("quality must be between 0 and 5, got {0}")]
    InvalidQuality(u8),

    #[error("item {0} is deleted")]
    Deleted(String),
}

/// Problems with an enrichment payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("analysis has no definition")]
    MissingDefinition,
}
