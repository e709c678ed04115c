//! Queue entry types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use wordcard_core::failure::IngestErrorKind;

use crate::db::PendingJob;

/// Observable state of a queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Pending,
    Analyzing,
    GeneratingImage,
    Success,
    /// Terminal until re-armed by a retry.
    Error {
        kind: IngestErrorKind,
        message: String,
    },
}

/// One submitted word and its progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: Uuid,
    pub word: String,
    pub status: EntryStatus,
    /// Id of the persisted item once one exists.
    pub item_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(word: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            word: word.trim().to_string(),
            status: EntryStatus::Pending,
            item_id: None,
            submitted_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == EntryStatus::Pending
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self.status,
            EntryStatus::Analyzing | EntryStatus::GeneratingImage
        )
    }

    /// Pending or in flight.
    pub fn is_active(&self) -> bool {
        self.is_pending() || self.is_in_flight()
    }

    /// Anything short of success still claims its word.
    pub fn is_unresolved(&self) -> bool {
        self.status != EntryStatus::Success
    }

    pub fn to_job(&self) -> PendingJob {
        PendingJob {
            id: self.id,
            word: self.word.clone(),
            item_id: self.item_id.clone(),
            submitted_at: self.submitted_at,
        }
    }
}

impl From<PendingJob> for QueueEntry {
    fn from(job: PendingJob) -> Self {
        Self {
            id: job.id,
            word: job.word,
            status: EntryStatus::Pending,
            item_id: job.item_id,
            submitted_at: job.submitted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_serializes_with_tag() {
        let status = EntryStatus::Error {
            kind: IngestErrorKind::DuplicateItem,
            message: "dup".into(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "ERROR");
        assert_eq!(json["kind"], "DUPLICATE_ITEM");

        let json = serde_json::to_value(EntryStatus::GeneratingImage).unwrap();
        assert_eq!(json["state"], "GENERATING_IMAGE");
    }

    #[test]
    fn job_round_trip_keeps_identity() {
        let entry = QueueEntry::new("  apple ", Utc::now());
        assert_eq!(entry.word, "apple");

        let restored = QueueEntry::from(entry.to_job());
        assert_eq!(restored, entry);
    }

    #[test]
    fn errors_stay_unresolved() {
        let mut entry = QueueEntry::new("apple", Utc::now());
        entry.status = EntryStatus::Error {
            kind: IngestErrorKind::Unknown,
            message: String::new(),
        };
        assert!(entry.is_unresolved());
        assert!(!entry.is_active());

        entry.status = EntryStatus::Success;
        assert!(!entry.is_unresolved());
    }
}
