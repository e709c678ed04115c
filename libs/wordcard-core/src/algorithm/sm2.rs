//! SM-2 spaced repetition algorithm.
//!
//! Based on SuperMemo 2 with a 0-5 quality scale and configurable policy.

use super::SpacedRepetitionAlgorithm;
use crate::types::{Item, Quality, MIN_EASINESS};
use chrono::{DateTime, Duration, Utc};

/// SM-2 algorithm with configurable parameters.
#[derive(Debug, Clone)]
pub struct Sm2 {
    pub minimum_ease: f64,
    pub first_interval: u32,
    pub second_interval: u32,
    /// Upper bound on any interval, in days.
    pub maximum_interval: u32,
    /// Items with more successful repetitions than this are "learned".
    pub learned_threshold: u32,
}

impl Default for Sm2 {
    fn default() -> Self {
        Self {
            minimum_ease: MIN_EASINESS,
            first_interval: 1,
            second_interval: 6,
            maximum_interval: 36_500,
            learned_threshold: 3,
        }
    }
}

impl Sm2 {
    pub fn with_learned_threshold(learned_threshold: u32) -> Self {
        Self {
            learned_threshold,
            ..Self::default()
        }
    }

    fn next_interval(&self, item: &Item) -> u32 {
        let interval = match item.repetition {
            0 => self.first_interval,
            1 => self.second_interval,
            _ => {
                let days = (f64::from(item.interval) * item.easiness_factor).round();
                days.min(f64::from(self.maximum_interval)) as u32
            }
        };
        interval.min(self.maximum_interval)
    }

    fn next_ease(&self, ease: f64, quality: Quality) -> f64 {
        let miss = f64::from(Quality::MAX - quality.value());
        let ease = ease + 0.1 - miss * (0.08 + miss * 0.02);
        ease.max(self.minimum_ease)
    }
}

impl SpacedRepetitionAlgorithm for Sm2 {
    fn name(&self) -> &'static str {
        "sm2"
    }

    fn review(&self, item: &Item, quality: Quality, now: DateTime<Utc>) -> Item {
        let (interval, repetition) = if quality.is_recalled() {
            (self.next_interval(item), item.repetition.saturating_add(1))
        } else {
            (self.first_interval.min(self.maximum_interval), 0)
        };

        let mut next = item.clone();
        next.interval = interval;
        next.repetition = repetition;
        next.easiness_factor = self.next_ease(item.easiness_factor, quality);
        next.next_review_at = now
            .checked_add_signed(Duration::days(i64::from(interval)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        next.touch(now);
        next
    }

    fn is_learned(&self, item: &Item) -> bool {
        item.repetition > self.learned_threshold
    }
}
