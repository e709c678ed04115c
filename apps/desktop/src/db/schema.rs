//! SQLite schema definitions.
//!
//! Schema changes are additive: tables are created only when missing and new
//! columns are appended with `ALTER TABLE`, so upgrading never drops data.

/// Current store layout version.
pub const SCHEMA_VERSION: i32 = 3;

/// Base schema for the local SQLite database.
pub const SCHEMA: &str = r#"
-- Item records (no blob bytes)
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    word TEXT NOT NULL,
    word_key TEXT NOT NULL,
    analysis TEXT NOT NULL,
    interval_days INTEGER NOT NULL DEFAULT 0,
    repetition INTEGER NOT NULL DEFAULT 0,
    easiness_factor REAL NOT NULL DEFAULT 2.5,
    next_review_at TEXT NOT NULL,
    schema_version INTEGER NOT NULL DEFAULT 1,
    status TEXT NOT NULL DEFAULT 'NORMAL',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0
);

-- Image payloads, keyed by item id
CREATE TABLE IF NOT EXISTS blobs (
    id TEXT PRIMARY KEY,
    data BLOB NOT NULL
);

-- Pending ingestion jobs
CREATE TABLE IF NOT EXISTS ingest_jobs (
    id TEXT PRIMARY KEY,
    word TEXT NOT NULL,
    position INTEGER NOT NULL,
    submitted_at TEXT NOT NULL
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_items_word_key ON items(word_key);
CREATE INDEX IF NOT EXISTS idx_items_next_review ON items(next_review_at);
"#;

/// Columns added after the first layout, as `(table, column, definition)`.
pub const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    // v2: content reference of the item's blob
    ("items", "image_ref", "TEXT"),
    // v3: item written by an earlier attempt of a retried job
    ("ingest_jobs", "item_id", "TEXT"),
];
