//! Test fixtures and factory functions for creating test data.

use chrono::{DateTime, Duration, Utc};

use wordcard_lib::sync::document;
use wordcard_core::types::{AnalysisResult, Item, ItemStatus};

/// Analysis payload with every text field filled.
pub fn analysis(word: &str) -> AnalysisResult {
    AnalysisResult {
        definition: format!("Definition of {}", word),
        phonetic: Some(format!("/{}/", word)),
        example: format!("An example using {}.", word),
        mnemonic: format!("Remember {}.", word),
        image_prompt: Some(format!("A drawing of {}", word)),
    }
}

/// Finished item as the ingestion queue would leave it.
pub fn item(word: &str) -> Item {
    item_at(word, Utc::now())
}

/// Finished item created at a fixed time.
pub fn item_at(word: &str, created_at: DateTime<Utc>) -> Item {
    let mut item = Item::new(word, analysis(word), created_at);
    item.status = ItemStatus::Normal;
    item
}

/// Item written by an old client: schema v1, easiness below the floor.
pub fn legacy_item(word: &str) -> Item {
    let mut item = item_at(word, Utc::now() - Duration::days(30));
    item.schema_version = 1;
    item.easiness_factor = 1.1;
    item.analysis.definition = format!("  Definition of {}  ", word);
    item
}

/// Item already reviewed `repetition` times, due at `due`.
pub fn reviewed_item(word: &str, repetition: u32, due: DateTime<Utc>) -> Item {
    let mut item = item(word);
    item.repetition = repetition;
    item.interval = 6;
    item.next_review_at = due;
    item
}

/// Encode a backup document holding `items`.
pub fn backup(items: &[Item]) -> Vec<u8> {
    document::encode(items).expect("encode backup")
}

/// Decode a backup document.
pub fn cards(bytes: &[u8]) -> Vec<Item> {
    document::decode(bytes).expect("decode backup")
}

/// Small PNG-like payload.
pub fn image_bytes(seed: &str) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G'];
    bytes.extend_from_slice(seed.as_bytes());
    bytes
}
