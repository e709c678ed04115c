//! Classification of enrichment failures into user-facing error kinds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by an external content provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    /// HTTP-like status code, when the provider exposes one.
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Why an ingestion entry ended in error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestErrorKind {
    DuplicateItem,
    ContentBlocked,
    ServiceBusy,
    NetworkUnavailable,
    InvalidInput,
    MalformedResponse,
    StoreIoFailed,
    Unknown,
}

impl IngestErrorKind {
    /// Message shown next to the retry affordance.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::DuplicateItem => "This word is already in your library.",
            Self::ContentBlocked => "The content for this word was blocked by the provider's safety filter.",
            Self::ServiceBusy => "The service is busy right now. Please try again in a moment.",
            Self::NetworkUnavailable => "Network unavailable. Check your connection and retry.",
            Self::InvalidInput => "The provider could not process this word.",
            Self::MalformedResponse => "The provider returned an unexpected response.",
            Self::StoreIoFailed => "Could not save the word to local storage.",
            Self::Unknown => "Something went wrong while analyzing this word.",
        }
    }
}

const BLOCKED_MARKERS: &[&str] = &["safety", "blocked", "prohibited", "policy"];
const BUSY_MARKERS: &[&str] = &["overloaded", "rate limit", "quota", "resource_exhausted", "unavailable", "busy"];
const NETWORK_MARKERS: &[&str] = &["network", "fetch", "timed out", "timeout", "connection", "dns", "offline"];
const INVALID_MARKERS: &[&str] = &["invalid argument", "invalid_argument", "invalid input", "bad request"];
const MALFORMED_MARKERS: &[&str] = &["json", "parse", "unexpected token", "malformed", "missing field"];

/// Map a provider failure onto an [`IngestErrorKind`].
///
/// Status codes win over message text; message markers are checked from the
/// most to the least specific class.
pub fn classify(error: &ProviderError) -> IngestErrorKind {
    match error.status {
        Some(429) | Some(503) | Some(529) => return IngestErrorKind::ServiceBusy,
        Some(400) | Some(422) => return IngestErrorKind::InvalidInput,
        _ => {}
    }

    let message = error.message.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| message.contains(m));

    if has(BLOCKED_MARKERS) {
        IngestErrorKind::ContentBlocked
    } else if has(NETWORK_MARKERS) {
        IngestErrorKind::NetworkUnavailable
    } else if has(BUSY_MARKERS) {
        IngestErrorKind::ServiceBusy
    } else if has(INVALID_MARKERS) {
        IngestErrorKind::InvalidInput
    } else if has(MALFORMED_MARKERS) {
        IngestErrorKind::MalformedResponse
    } else {
        IngestErrorKind::Unknown
    }
}
