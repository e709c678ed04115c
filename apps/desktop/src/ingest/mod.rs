//! Durable ingestion queue.
//!
//! Submitted words are enriched, persisted and illustrated one at a time by
//! a single worker task. Entries that have not started yet are mirrored to
//! the [`QueueJournal`] after every change and restored on the next start;
//! work that was already in flight is not resumed.

pub mod entry;

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;
use wordcard_core::failure::{classify, IngestErrorKind};
use wordcard_core::types::{normalize_word, Item, ItemStatus};

use crate::collaborators::{Enricher, ImageRenderer};
use crate::db::{LocalStore, PendingJob, QueueJournal, StoreError};

pub use entry::{EntryStatus, QueueEntry};

/// Misuse of the queue API. Processing failures live in [`EntryStatus::Error`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("word is empty")]
    EmptyWord,

    #[error("\"{0}\" is already queued")]
    AlreadyQueued(String),

    #[error("queue entry {0} not found")]
    NotFound(Uuid),

    #[error("queue entry {0} is being processed")]
    InFlight(Uuid),

    #[error("queue entry {0} has not failed")]
    NotRetryable(Uuid),

    #[error("queue is shut down")]
    Closed,
}

/// Prompt used when the analysis does not suggest one.
pub fn default_image_prompt(word: &str) -> String {
    format!("A simple, memorable illustration of the word \"{word}\"")
}

/// Collaborators the worker needs.
#[derive(Clone)]
pub struct QueueDeps {
    pub store: Arc<dyn LocalStore>,
    pub journal: Arc<dyn QueueJournal>,
    pub enricher: Arc<dyn Enricher>,
    pub renderer: Arc<dyn ImageRenderer>,
}

struct QueueInner {
    entries: Mutex<Vec<QueueEntry>>,
    updates: watch::Sender<Vec<QueueEntry>>,
    wake: Notify,
    closed: AtomicBool,
    /// Serializes journal writes so a stale snapshot never lands last.
    journal_lock: AsyncMutex<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
    deps: QueueDeps,
}

/// Handle to the ingestion queue.
///
/// Clone-able; every clone drives the same worker.
#[derive(Clone)]
pub struct IngestQueue {
    inner: Arc<QueueInner>,
}

/// Failure of one processing step, recorded on the entry.
struct StepFailure {
    kind: IngestErrorKind,
    detail: String,
}

impl StepFailure {
    fn new(kind: IngestErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    fn store(e: StoreError) -> Self {
        Self::new(IngestErrorKind::StoreIoFailed, e.to_string())
    }
}

impl IngestQueue {
    /// Restore pending jobs from the journal and start the worker.
    pub async fn start(deps: QueueDeps) -> Result<Self, StoreError> {
        let restored: Vec<QueueEntry> = deps
            .journal
            .load_pending()
            .await?
            .into_iter()
            .map(QueueEntry::from)
            .collect();

        if !restored.is_empty() {
            tracing::info!("Restored {} pending ingestion job(s)", restored.len());
        }

        let (updates, _) = watch::channel(restored.clone());
        let inner = Arc::new(QueueInner {
            entries: Mutex::new(restored),
            updates,
            wake: Notify::new(),
            closed: AtomicBool::new(false),
            journal_lock: AsyncMutex::new(()),
            worker: Mutex::new(None),
            deps,
        });

        let handle = tokio::spawn(QueueInner::run(Arc::clone(&inner)));
        *inner.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Ok(Self { inner })
    }

    /// Append a word to the queue and return its entry id.
    pub async fn submit(&self, word: &str) -> Result<Uuid, QueueError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        let word = word.trim();
        if word.is_empty() {
            return Err(QueueError::EmptyWord);
        }

        let key = normalize_word(word);
        let id = self.inner.update(|entries| {
            if entries
                .iter()
                .any(|e| e.is_unresolved() && normalize_word(&e.word) == key)
            {
                return Err(QueueError::AlreadyQueued(word.to_string()));
            }
            let entry = QueueEntry::new(word, Utc::now());
            let id = entry.id;
            entries.push(entry);
            Ok(id)
        })?;

        tracing::debug!("Queued \"{}\" as {}", word, id);
        self.inner.persist_pending().await;
        self.inner.wake.notify_one();
        Ok(id)
    }

    /// Re-arm a failed entry. It keeps its place in the queue.
    ///
    /// An entry that already wrote its item resumes at the image step.
    pub async fn retry(&self, id: Uuid) -> Result<(), QueueError> {
        self.inner.update(|entries| {
            let entry = entries
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or(QueueError::NotFound(id))?;
            if !matches!(entry.status, EntryStatus::Error { .. }) {
                return Err(QueueError::NotRetryable(id));
            }
            entry.status = EntryStatus::Pending;
            Ok(())
        })?;

        self.inner.persist_pending().await;
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Drop an entry that is not being processed.
    pub async fn remove(&self, id: Uuid) -> Result<(), QueueError> {
        self.inner.update(|entries| {
            let pos = entries
                .iter()
                .position(|e| e.id == id)
                .ok_or(QueueError::NotFound(id))?;
            if entries[pos].is_in_flight() {
                return Err(QueueError::InFlight(id));
            }
            entries.remove(pos);
            Ok(())
        })?;

        self.inner.persist_pending().await;
        Ok(())
    }

    /// Drop every successful entry.
    pub async fn clear_finished(&self) {
        self.inner
            .update(|entries| entries.retain(|e| e.status != EntryStatus::Success));
        self.inner.persist_pending().await;
    }

    pub fn entries(&self) -> Vec<QueueEntry> {
        self.inner.lock_entries().clone()
    }

    /// Receiver that sees every change to the entry list.
    pub fn subscribe(&self) -> watch::Receiver<Vec<QueueEntry>> {
        self.inner.updates.subscribe()
    }

    /// Wait until nothing is pending or in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        let _ = rx
            .wait_for(|entries| !entries.iter().any(QueueEntry::is_active))
            .await;
    }

    /// Stop the worker once the current entry has finished.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.wake.notify_one();

        let handle = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Ingestion worker ended abnormally: {}", e);
            }
        }
    }
}

impl QueueInner {
    fn lock_entries(&self) -> MutexGuard<'_, Vec<QueueEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the entry list and publish the result.
    fn update<R>(&self, f: impl FnOnce(&mut Vec<QueueEntry>) -> R) -> R {
        let mut entries = self.lock_entries();
        let result = f(&mut entries);
        self.updates.send_replace(entries.clone());
        result
    }

    fn set_status(&self, id: Uuid, status: EntryStatus, item_id: Option<String>) {
        self.update(|entries| {
            if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
                entry.status = status;
                if item_id.is_some() {
                    entry.item_id = item_id;
                }
            }
        });
    }

    async fn persist_pending(&self) {
        let _guard = self.journal_lock.lock().await;
        let jobs: Vec<PendingJob> = self
            .lock_entries()
            .iter()
            .filter(|e| e.is_pending())
            .map(QueueEntry::to_job)
            .collect();

        if let Err(e) = self.deps.journal.save_pending(jobs).await {
            tracing::warn!("Failed to persist ingestion journal: {}", e);
        }
    }

    /// Move the oldest pending entry to `Analyzing`.
    fn claim_next(&self) -> Option<QueueEntry> {
        self.update(|entries| {
            let entry = entries.iter_mut().find(|e| e.is_pending())?;
            entry.status = EntryStatus::Analyzing;
            Some(entry.clone())
        })
    }

    async fn run(inner: Arc<Self>) {
        tracing::debug!("Ingestion worker started");
        while !inner.closed.load(Ordering::Acquire) {
            match inner.claim_next() {
                Some(entry) => {
                    inner.persist_pending().await;
                    inner.process(&entry).await;
                }
                None => inner.wake.notified().await,
            }
        }
        tracing::debug!("Ingestion worker stopped");
    }

    async fn process(&self, entry: &QueueEntry) {
        let (id, word) = (entry.id, entry.word.as_str());
        tracing::info!("Processing \"{}\"", word);
        match self.ingest(entry).await {
            Ok(item_id) => {
                tracing::info!("Ingested \"{}\" as item {}", word, item_id);
                self.set_status(id, EntryStatus::Success, Some(item_id));
            }
            Err(failure) => {
                tracing::warn!(
                    "Ingestion of \"{}\" failed ({:?}): {}",
                    word,
                    failure.kind,
                    failure.detail
                );
                self.set_status(
                    id,
                    EntryStatus::Error {
                        kind: failure.kind,
                        message: failure.kind.user_message().to_string(),
                    },
                    None,
                );
            }
        }
    }

    async fn ingest(&self, entry: &QueueEntry) -> Result<String, StepFailure> {
        let mut item = match self.resumable(entry).await? {
            Some(item) => {
                tracing::info!("Resuming \"{}\" at the image step", entry.word);
                self.set_status(entry.id, EntryStatus::GeneratingImage, Some(item.id.clone()));
                item
            }
            None => self.create_item(entry.id, &entry.word).await?,
        };
        let store = &self.deps.store;

        // 4. Image; failure leaves a text-only item
        if item.image_ref.is_none() {
            let prompt = item
                .analysis
                .image_prompt
                .clone()
                .unwrap_or_else(|| default_image_prompt(&item.word));
            match self.deps.renderer.render_image(&item.word, &prompt).await {
                Ok(bytes) => item = item.with_image(bytes),
                Err(e) => tracing::warn!("Image generation for \"{}\" failed: {}", item.word, e),
            }
        }

        // 5. Finalize
        item.status = ItemStatus::Normal;
        item.touch(Utc::now());
        if let Err(e) = store.put(&item).await {
            // Keep the text-only record usable; a retry resumes from here
            let mut fallback = item.record_only();
            fallback.image_ref = None;
            if let Err(restore) = store.put(&fallback).await {
                tracing::error!("Failed to restore item {}: {}", item.id, restore);
            }
            return Err(StepFailure::store(e));
        }

        Ok(item.id)
    }

    /// Live item written by an earlier attempt of this entry.
    async fn resumable(&self, entry: &QueueEntry) -> Result<Option<Item>, StepFailure> {
        let Some(item_id) = &entry.item_id else {
            return Ok(None);
        };
        let item = self
            .deps
            .store
            .get(item_id)
            .await
            .map_err(StepFailure::store)?;
        Ok(item.filter(|item| !item.deleted))
    }

    /// Steps 1 to 3: duplicate check, enrichment and the text-only record.
    async fn create_item(&self, id: Uuid, word: &str) -> Result<Item, StepFailure> {
        let store = &self.deps.store;

        // 1. Duplicate check, before any provider call
        if let Some(existing) = store.find_by_word(word).await.map_err(StepFailure::store)? {
            return Err(StepFailure::new(
                IngestErrorKind::DuplicateItem,
                format!("already stored as {}", existing.id),
            ));
        }

        // 2. Enrich
        let analysis = self
            .deps
            .enricher
            .enrich(word)
            .await
            .map_err(|e| StepFailure::new(classify(&e), e.to_string()))?;
        analysis
            .validate()
            .map_err(|e| StepFailure::new(IngestErrorKind::MalformedResponse, e.to_string()))?;

        // 3. Persist the text-only item right away
        let item = Item::new(word, analysis, Utc::now());
        store.put(&item).await.map_err(StepFailure::store)?;
        self.set_status(id, EntryStatus::GeneratingImage, Some(item.id.clone()));
        Ok(item)
    }
}
