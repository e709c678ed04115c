//! Repository pattern for database access.

use crate::db::error::StoreError;
use crate::db::schema::{ADDED_COLUMNS, SCHEMA, SCHEMA_VERSION};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;
use wordcard_core::types::{blob_ref, normalize_word, AnalysisResult, Item, ItemStatus};

type Result<T> = std::result::Result<T, StoreError>;

/// Repository for item records.
pub trait ItemRepository {
    /// All records, tombstones included, rehydrated with their blobs.
    fn get_all_items(&self) -> Result<Vec<Item>>;
    fn get_item(&self, id: &str) -> Result<Option<Item>>;
    /// Non-deleted item whose normalized word matches.
    fn find_by_word(&self, word: &str) -> Result<Option<Item>>;
    /// Write the record and, if it carries one, its blob in one transaction.
    fn put_item(&self, item: &Item) -> Result<()>;
    fn soft_delete_item(&self, id: &str, now: DateTime<Utc>) -> Result<()>;
    /// Record table only, without blob bytes.
    fn export_items(&self) -> Result<Vec<Item>>;
    /// Upsert records by id in one transaction.
    fn import_items(&self, items: &[Item]) -> Result<usize>;
}

/// Repository for image blobs.
pub trait BlobRepository {
    fn get_blob(&self, id: &str) -> Result<Option<Vec<u8>>>;
    fn put_blob(&self, id: &str, bytes: &[u8]) -> Result<()>;
}

/// Ingestion job waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PendingJob {
    pub id: Uuid,
    pub word: String,
    /// Item left behind by an earlier failed attempt.
    #[serde(default)]
    pub item_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Repository for the ingestion journal.
pub trait JobRepository {
    fn load_pending_jobs(&self) -> Result<Vec<PendingJob>>;
    /// Replace the journal with `jobs`, keeping their order.
    fn save_pending_jobs(&self, jobs: &[PendingJob]) -> Result<()>;
}

const ITEM_COLUMNS: &str = "i.id, i.word, i.analysis, i.image_ref, i.interval_days, i.repetition,
    i.easiness_factor, i.next_review_at, i.schema_version, i.status, i.created_at, i.updated_at,
    i.deleted";

/// SQLite implementation of repositories.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open database at path, creating if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    /// Open in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        for (table, column, definition) in ADDED_COLUMNS {
            self.ensure_column(table, column, definition)?;
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;
        Ok(())
    }

    fn ensure_column(&self, table: &str, column: &str, definition: &str) -> Result<()> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let exists = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .iter()
            .any(|name| name == column);

        if !exists {
            tracing::info!("Adding column {}.{}", table, column);
            self.conn
                .execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition};"))?;
        }
        Ok(())
    }

    /// Highest store layout version recorded in this database.
    pub fn schema_version(&self) -> Result<i32> {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Low-level access for callers that need to run raw SQL (tests, tooling).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn upsert_record(conn: &Connection, item: &Item, image_ref: Option<&str>) -> Result<()> {
        let analysis = serde_json::to_string(&item.analysis)?;
        conn.execute(
            "INSERT INTO items (id, word, word_key, analysis, image_ref, interval_days, repetition,
                easiness_factor, next_review_at, schema_version, status, created_at, updated_at, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                word = excluded.word,
                word_key = excluded.word_key,
                analysis = excluded.analysis,
                image_ref = COALESCE(excluded.image_ref, items.image_ref),
                interval_days = excluded.interval_days,
                repetition = excluded.repetition,
                easiness_factor = excluded.easiness_factor,
                next_review_at = excluded.next_review_at,
                schema_version = MAX(items.schema_version, excluded.schema_version),
                status = excluded.status,
                updated_at = excluded.updated_at,
                deleted = excluded.deleted",
            params![
                item.id,
                item.word,
                item.word_key(),
                analysis,
                image_ref,
                item.interval,
                item.repetition,
                item.easiness_factor,
                item.next_review_at.to_rfc3339(),
                item.schema_version,
                item.status.as_str(),
                item.created_at.to_rfc3339(),
                item.updated_at.to_rfc3339(),
                item.deleted,
            ],
        )?;
        Ok(())
    }

    /// Map a row selected with `ITEM_COLUMNS` (plus an optional trailing blob
    /// column) to an item.
    fn row_to_item(row: &rusqlite::Row, with_blob: bool) -> rusqlite::Result<Item> {
        let analysis_json: String = row.get(2)?;
        let analysis: AnalysisResult = serde_json::from_str(&analysis_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
        let status_str: String = row.get(9)?;
        let stored_ref: Option<String> = row.get(3)?;

        let (image, image_ref) = if with_blob {
            match row.get::<_, Option<Vec<u8>>>(13)? {
                Some(bytes) => {
                    let image_ref = stored_ref.unwrap_or_else(|| blob_ref(&bytes));
                    (Some(bytes), Some(image_ref))
                }
                None => (None, None),
            }
        } else {
            (None, stored_ref)
        };

        Ok(Item {
            id: row.get(0)?,
            word: row.get(1)?,
            analysis,
            image_ref,
            image,
            interval: row.get(4)?,
            repetition: row.get(5)?,
            easiness_factor: row.get(6)?,
            next_review_at: parse_time(row, 7)?,
            schema_version: row.get(8)?,
            status: ItemStatus::from_str(&status_str).unwrap_or_default(),
            created_at: parse_time(row, 10)?,
            updated_at: parse_time(row, 11)?,
            deleted: row.get(12)?,
        })
    }

    fn row_with_blob(row: &rusqlite::Row) -> rusqlite::Result<Item> {
        Self::row_to_item(row, true)
    }

    fn query_items(&self, filter: &str, param: Option<&str>) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS}, b.data FROM items i LEFT JOIN blobs b ON b.id = i.id
             {filter} ORDER BY i.created_at, i.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let items = match param {
            Some(p) => stmt.query_map(params![p], Self::row_with_blob)?,
            None => stmt.query_map([], Self::row_with_blob)?,
        };
        items
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

fn parse_time(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl ItemRepository for SqliteRepository {
    fn get_all_items(&self) -> Result<Vec<Item>> {
        self.query_items("", None)
    }

    fn get_item(&self, id: &str) -> Result<Option<Item>> {
        Ok(self.query_items("WHERE i.id = ?1", Some(id))?.into_iter().next())
    }

    fn find_by_word(&self, word: &str) -> Result<Option<Item>> {
        let key = normalize_word(word);
        Ok(self
            .query_items("WHERE i.word_key = ?1 AND i.deleted = 0", Some(key.as_str()))?
            .into_iter()
            .next())
    }

    fn put_item(&self, item: &Item) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        match &item.image {
            Some(bytes) => {
                let image_ref = blob_ref(bytes);
                Self::upsert_record(&tx, item, Some(&image_ref))?;
                tx.execute(
                    "INSERT OR REPLACE INTO blobs (id, data) VALUES (?1, ?2)",
                    params![item.id, bytes],
                )?;
            }
            None => Self::upsert_record(&tx, item, item.image_ref.as_deref())?,
        }
        tx.commit()?;
        Ok(())
    }

    fn soft_delete_item(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let count = self.conn.execute(
            "UPDATE items SET deleted = 1, updated_at = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), id],
        )?;
        if count == 0 {
            return Err(StoreError::ItemNotFound(id.to_string()));
        }
        Ok(())
    }

    fn export_items(&self) -> Result<Vec<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items i ORDER BY i.created_at, i.id");
        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map([], |row| Self::row_to_item(row, false))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn import_items(&self, items: &[Item]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        for item in items {
            Self::upsert_record(&tx, item, item.image_ref.as_deref())?;
        }
        tx.commit()?;
        Ok(items.len())
    }
}

impl BlobRepository for SqliteRepository {
    fn get_blob(&self, id: &str) -> Result<Option<Vec<u8>>> {
        self.conn
            .query_row("SELECT data FROM blobs WHERE id = ?1", params![id], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    fn put_blob(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO blobs (id, data) VALUES (?1, ?2)",
            params![id, bytes],
        )?;
        tx.execute(
            "UPDATE items SET image_ref = ?1 WHERE id = ?2",
            params![blob_ref(bytes), id],
        )?;
        tx.commit()?;
        Ok(())
    }
}

impl JobRepository for SqliteRepository {
    fn load_pending_jobs(&self) -> Result<Vec<PendingJob>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, word, item_id, submitted_at FROM ingest_jobs ORDER BY position")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    parse_time(row, 3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, word, item_id, submitted_at)| {
                let id = Uuid::parse_str(&id)
                    .map_err(|e| StoreError::InvalidData(format!("job id {id}: {e}")))?;
                Ok(PendingJob {
                    id,
                    word,
                    item_id,
                    submitted_at,
                })
            })
            .collect()
    }

    fn save_pending_jobs(&self, jobs: &[PendingJob]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM ingest_jobs", [])?;
        for (position, job) in jobs.iter().enumerate() {
            tx.execute(
                "INSERT INTO ingest_jobs (id, word, position, submitted_at, item_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    job.id.to_string(),
                    job.word,
                    position as i64,
                    job.submitted_at.to_rfc3339(),
                    job.item_id
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
