//! Schema migration for item records.
//!
//! Each step upgrades a record by exactly one version. Steps are pure: they
//! never touch storage, and the caller decides which results to write back.

use chrono::{DateTime, Utc};

use crate::types::{Item, MIN_EASINESS};

/// Schema version written by this build.
pub const CURRENT_VERSION: u32 = 3;

type Step = fn(Item) -> Item;

/// Step `i` upgrades a record from version `i + 1` to `i + 2`.
const STEPS: [Step; (CURRENT_VERSION - 1) as usize] = [repair_scheduling, normalize_analysis];

/// Whether the record is behind the current schema.
pub fn needs_migration(item: &Item) -> bool {
    item.schema_version < CURRENT_VERSION
}

/// Upgrade a record to [`CURRENT_VERSION`].
///
/// Records already current (or newer) are returned untouched, timestamps
/// included.
pub fn migrate(item: Item, now: DateTime<Utc>) -> Item {
    if !needs_migration(&item) {
        return item;
    }

    let from = item.schema_version.max(1);
    let mut item = item;
    for step in &STEPS[(from - 1) as usize..] {
        item = step(item);
    }
    item.schema_version = CURRENT_VERSION;
    item.touch(now);
    item
}

/// Upgrade every record, preserving order.
pub fn migrate_all(items: Vec<Item>, now: DateTime<Utc>) -> Vec<Item> {
    items.into_iter().map(|item| migrate(item, now)).collect()
}

/// v1 -> v2: older schedulers could leave the easiness factor below the
/// floor, and records without a review date deserialize to the epoch.
fn repair_scheduling(mut item: Item) -> Item {
    if item.easiness_factor.is_nan() || item.easiness_factor < MIN_EASINESS {
        item.easiness_factor = MIN_EASINESS;
    }
    if item.next_review_at == DateTime::<Utc>::default() {
        item.next_review_at = item.created_at;
    }
    item
}

/// v2 -> v3: trim free text and drop blank optional fields.
fn normalize_analysis(mut item: Item) -> Item {
    item.word = item.word.trim().to_string();

    let analysis = &mut item.analysis;
    analysis.definition = analysis.definition.trim().to_string();
    analysis.example = analysis.example.trim().to_string();
    analysis.mnemonic = analysis.mnemonic.trim().to_string();
    analysis.phonetic = non_blank(analysis.phonetic.take());
    analysis.image_prompt = non_blank(analysis.image_prompt.take());
    item
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
