//! Remote backup document: `{ "cards": [Item, ...] }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wordcard_core::types::Item;

/// Why a downloaded backup could not be used.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("backup uses a legacy layout")]
    Legacy,

    #[error("backup is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct BackupRef<'a> {
    cards: &'a [Item],
}

#[derive(Deserialize)]
struct Backup {
    cards: Vec<Item>,
}

/// Serialize records into the backup document. Blob bytes never leave the device.
pub fn encode(items: &[Item]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&BackupRef { cards: items })
}

pub fn decode(bytes: &[u8]) -> Result<Vec<Item>, DocumentError> {
    let value: Value = serde_json::from_slice(bytes)?;
    match &value {
        Value::Object(map) if map.get("cards").is_some_and(Value::is_array) => {}
        _ => return Err(DocumentError::Legacy),
    }
    let backup: Backup = serde_json::from_value(value)?;
    Ok(backup.cards)
}
