//! Core word card library shared by the local data layer.
//!
//! Provides:
//! - Item and analysis types
//! - SM-2 review scheduling
//! - Record schema migration
//! - Classification of enrichment failures

pub mod algorithm;
pub mod error;
pub mod failure;
pub mod migration;
pub mod types;

pub use algorithm::{review, SpacedRepetitionAlgorithm, Sm2};
pub use error::{AnalysisError, ReviewError};
pub use failure::{classify, IngestErrorKind, ProviderError};
pub use migration::{migrate, migrate_all, needs_migration, CURRENT_VERSION};
pub use types::{
    blob_ref, normalize_word, AnalysisResult, Item, ItemStatus, LibraryStats, Quality,
    DEFAULT_EASINESS, MIN_EASINESS,
};
