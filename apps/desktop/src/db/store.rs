//! Async store contract used by the queue, sync engine and library.
//!
//! SQLite calls run on the blocking pool so callers only ever yield at the
//! store boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use wordcard_core::types::Item;

use crate::db::error::StoreError;
use crate::db::repository::{
    BlobRepository, ItemRepository, JobRepository, PendingJob, SqliteRepository,
};

type Result<T> = std::result::Result<T, StoreError>;

/// Durable item and blob storage.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Item>>;
    async fn get(&self, id: &str) -> Result<Option<Item>>;
    async fn find_by_word(&self, word: &str) -> Result<Option<Item>>;
    async fn put(&self, item: &Item) -> Result<()>;
    async fn delete(&self, id: &str, now: DateTime<Utc>) -> Result<()>;
    async fn get_blob(&self, id: &str) -> Result<Option<Vec<u8>>>;
    async fn put_blob(&self, id: &str, bytes: Vec<u8>) -> Result<()>;
    async fn export_all(&self) -> Result<Vec<Item>>;
    async fn import_many(&self, items: &[Item]) -> Result<usize>;
}

/// Side channel holding the ingestion jobs that have not started yet.
#[async_trait]
pub trait QueueJournal: Send + Sync {
    async fn load_pending(&self) -> Result<Vec<PendingJob>>;
    async fn save_pending(&self, jobs: Vec<PendingJob>) -> Result<()>;
}

/// [`LocalStore`] backed by a shared SQLite repository.
#[derive(Clone)]
pub struct SqliteStore {
    repo: Arc<Mutex<SqliteRepository>>,
}

impl SqliteStore {
    pub fn new(repository: SqliteRepository) -> Self {
        Self {
            repo: Arc::new(Mutex::new(repository)),
        }
    }

    /// Shared handle to the underlying repository.
    pub fn repository(&self) -> Arc<Mutex<SqliteRepository>> {
        Arc::clone(&self.repo)
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteRepository) -> Result<T> + Send + 'static,
    {
        let repo = Arc::clone(&self.repo);
        tokio::task::spawn_blocking(move || {
            let repo = repo.lock().unwrap_or_else(PoisonError::into_inner);
            f(&repo)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn get_all(&self) -> Result<Vec<Item>> {
        self.run(|repo| repo.get_all_items()).await
    }

    async fn get(&self, id: &str) -> Result<Option<Item>> {
        let id = id.to_string();
        self.run(move |repo| repo.get_item(&id)).await
    }

    async fn find_by_word(&self, word: &str) -> Result<Option<Item>> {
        let word = word.to_string();
        self.run(move |repo| repo.find_by_word(&word)).await
    }

    async fn put(&self, item: &Item) -> Result<()> {
        let item = item.clone();
        self.run(move |repo| repo.put_item(&item)).await
    }

    async fn delete(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let id = id.to_string();
        self.run(move |repo| repo.soft_delete_item(&id, now)).await
    }

    async fn get_blob(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let id = id.to_string();
        self.run(move |repo| repo.get_blob(&id)).await
    }

    async fn put_blob(&self, id: &str, bytes: Vec<u8>) -> Result<()> {
        let id = id.to_string();
        self.run(move |repo| repo.put_blob(&id, &bytes)).await
    }

    async fn export_all(&self) -> Result<Vec<Item>> {
        self.run(|repo| repo.export_items()).await
    }

    async fn import_many(&self, items: &[Item]) -> Result<usize> {
        let items = items.to_vec();
        self.run(move |repo| repo.import_items(&items)).await
    }
}

#[async_trait]
impl QueueJournal for SqliteStore {
    async fn load_pending(&self) -> Result<Vec<PendingJob>> {
        self.run(|repo| repo.load_pending_jobs()).await
    }

    async fn save_pending(&self, jobs: Vec<PendingJob>) -> Result<()> {
        self.run(move |repo| repo.save_pending_jobs(&jobs)).await
    }
}
