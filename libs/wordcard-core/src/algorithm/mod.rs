//! Spaced repetition scheduling.

pub mod sm2;

use crate::types::{Item, Quality};
use chrono::{DateTime, Utc};

pub use sm2::Sm2;

/// Trait for spaced repetition algorithms.
pub trait SpacedRepetitionAlgorithm: Send + Sync {
    /// Algorithm identifier.
    fn name(&self) -> &'static str;

    /// Apply a review outcome, returning the updated item.
    fn review(&self, item: &Item, quality: Quality, now: DateTime<Utc>) -> Item;

    /// Whether the item counts as learned under this algorithm's policy.
    fn is_learned(&self, item: &Item) -> bool;
}

/// Review with the default SM-2 parameters.
pub fn review(item: &Item, quality: Quality, now: DateTime<Utc>) -> Item {
    Sm2::default().review(item, quality, now)
}
