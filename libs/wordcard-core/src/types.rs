//! Core types for the word card library.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AnalysisError;

/// Easiness factor given to a freshly created item.
pub const DEFAULT_EASINESS: f64 = 2.5;

/// Lower bound for the easiness factor.
pub const MIN_EASINESS: f64 = 1.3;

/// Transient display state of an item.
///
/// Writers must leave an item `Normal` once their flow has finished; the
/// other states only describe work in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Normal,
    Generating,
    Updating,
}

impl Default for ItemStatus {
    fn default() -> Self {
        Self::Normal
    }
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Generating => "GENERATING",
            Self::Updating => "UPDATING",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NORMAL" => Some(Self::Normal),
            "GENERATING" => Some(Self::Generating),
            "UPDATING" => Some(Self::Updating),
            _ => None,
        }
    }
}

/// Structured result of enriching a word.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonetic: Option<String>,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub mnemonic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

impl AnalysisResult {
    /// Check the payload returned by the enrichment provider.
    ///
    /// Only the definition is mandatory; everything else may be blank.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.definition.trim().is_empty() {
            return Err(AnalysisError::MissingDefinition);
        }
        Ok(())
    }
}

/// A single study item (a "card").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub word: String,
    pub analysis: AnalysisResult,
    #[serde(default)]
    pub image_ref: Option<String>,
    /// Blob payload carried in memory only; the record table never holds it.
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
    #[serde(default)]
    pub interval: u32,
    #[serde(default)]
    pub repetition: u32,
    #[serde(default = "default_easiness")]
    pub easiness_factor: f64,
    #[serde(default)]
    pub next_review_at: DateTime<Utc>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
}

fn default_easiness() -> f64 {
    DEFAULT_EASINESS
}

fn default_schema_version() -> u32 {
    1
}

impl Item {
    /// Create a new item in the `Generating` state, due immediately.
    pub fn new(word: &str, analysis: AnalysisResult, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            word: word.trim().to_string(),
            analysis,
            image_ref: None,
            image: None,
            interval: 0,
            repetition: 0,
            easiness_factor: DEFAULT_EASINESS,
            next_review_at: now,
            schema_version: crate::migration::CURRENT_VERSION,
            status: ItemStatus::Generating,
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }

    /// Attach image bytes, pointing `image_ref` at their content hash.
    pub fn with_image(mut self, bytes: Vec<u8>) -> Self {
        self.image_ref = Some(blob_ref(&bytes));
        self.image = Some(bytes);
        self
    }

    /// Copy of the record without the blob payload.
    pub fn record_only(&self) -> Self {
        Self {
            image: None,
            ..self.clone()
        }
    }

    /// Refresh `updated_at` after a mutation.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub fn word_key(&self) -> String {
        normalize_word(&self.word)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.deleted && self.next_review_at <= now
    }
}

/// Normalized form used for duplicate detection.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Content reference for a blob payload.
pub fn blob_ref(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

/// Review quality on the 0..=5 SM-2 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether the answer counts as recalled.
    pub fn is_recalled(self) -> bool {
        self.0 >= 3
    }
}

impl TryFrom<u8> for Quality {
    type Error = crate::error::ReviewError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(crate::error::ReviewError::InvalidQuality(value))
    }
}

impl From<Quality> for u8 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

/// Counts over the non-deleted items of a library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    pub total: usize,
    pub new_items: usize,
    pub due: usize,
    pub learned: usize,
}
