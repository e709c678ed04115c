//! Common test utilities for integration tests.
//!
//! This module provides shared test infrastructure including:
//! - In-memory fakes for every external collaborator
//! - SQLite-backed stores (in memory or on a temporary file)
//! - Polling helpers for asynchronous state

#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use wordcard_core::failure::ProviderError;
use chrono::{DateTime, Utc};
use wordcard_core::types::{AnalysisResult, Item};
use wordcard_lib::collaborators::{
    AuthMode, AuthToken, Authenticator, Connectivity, Enricher, ImageRenderer, RemoteObject,
    RemoteStore,
};
use wordcard_lib::db::{LocalStore, SqliteRepository, SqliteStore, StoreError};
use wordcard_lib::ingest::{IngestQueue, QueueDeps};
use wordcard_lib::sync::{SyncDeps, SyncEngine};

pub const BACKUP_NAME: &str = "wordcard_backup.json";

pub fn memory_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(
        SqliteRepository::open_in_memory().expect("open in-memory database"),
    ))
}

pub fn file_store(path: &Path) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(
        SqliteRepository::open(path).expect("open database file"),
    ))
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// === Enricher ===

/// Enricher returning canned analyses, with call and concurrency tracking.
#[derive(Default)]
pub struct FakeEnricher {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, VecDeque<ProviderError>>>,
    overrides: Mutex<HashMap<String, AnalysisResult>>,
    hang_on: Mutex<Option<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeEnricher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Never answer for `word`.
    pub fn hanging_on(word: &str) -> Arc<Self> {
        let enricher = Self::default();
        *enricher.hang_on.lock().unwrap() = Some(word.to_string());
        Arc::new(enricher)
    }

    /// Fail the next call for `word` with `error`.
    pub fn fail_next(&self, word: &str, error: ProviderError) {
        self.failures
            .lock()
            .unwrap()
            .entry(word.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn respond_with(&self, word: &str, analysis: AnalysisResult) {
        self.overrides
            .lock()
            .unwrap()
            .insert(word.to_string(), analysis);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Enricher for FakeEnricher {
    async fn enrich(&self, word: &str) -> Result<AnalysisResult, ProviderError> {
        self.calls.lock().unwrap().push(word.to_string());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let hang = self.hang_on.lock().unwrap().as_deref() == Some(word);
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(word)
            .and_then(VecDeque::pop_front);
        let overridden = self.overrides.lock().unwrap().get(word).cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match failure {
            Some(error) => Err(error),
            None => Ok(overridden.unwrap_or_else(|| fixtures::analysis(word))),
        }
    }
}

// === Image renderer ===

#[derive(Default)]
pub struct FakeRenderer {
    fail: AtomicBool,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let renderer = Self::default();
        renderer.fail.store(true, Ordering::SeqCst);
        Arc::new(renderer)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// `(subject, prompt)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageRenderer for FakeRenderer {
    async fn render_image(&self, subject: &str, prompt: &str) -> Result<Vec<u8>, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((subject.to_string(), prompt.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::with_status(500, "image model unavailable"));
        }
        Ok(fixtures::image_bytes(&format!("{}#{}", subject, calls.len())))
    }
}

// === Authenticator ===

#[derive(Default)]
pub struct FakeAuth {
    modes: Mutex<Vec<AuthMode>>,
    fail: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeAuth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Block authentication until [`FakeAuth::release`].
    pub fn hold(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Notify::new()));
    }

    /// Let the held authentication finish and stop holding new ones.
    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.notify_one();
        }
    }

    pub fn modes(&self) -> Vec<AuthMode> {
        self.modes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Authenticator for FakeAuth {
    async fn authenticate(&self, mode: AuthMode) -> Result<AuthToken, ProviderError> {
        self.modes.lock().unwrap().push(mode);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::with_status(401, "sign-in cancelled"));
        }
        Ok(AuthToken("token".to_string()))
    }
}

// === Remote store ===

/// Object store held in memory.
#[derive(Default)]
pub struct MemoryRemote {
    objects: Mutex<Vec<(RemoteObject, Vec<u8>)>>,
    fail_network: AtomicBool,
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Remote already holding `bytes` under the backup name.
    pub fn with_backup(bytes: Vec<u8>) -> Arc<Self> {
        let remote = Self::default();
        remote.objects.lock().unwrap().push((
            RemoteObject {
                id: "obj-1".to_string(),
                name: BACKUP_NAME.to_string(),
            },
            bytes,
        ));
        Arc::new(remote)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail_network.store(fail, Ordering::SeqCst);
    }

    /// Bytes of the backup object, if present.
    pub fn backup(&self) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(obj, _)| obj.name == BACKUP_NAME)
            .map(|(_, bytes)| bytes.clone())
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ProviderError> {
        if self.fail_network.load(Ordering::SeqCst) {
            return Err(ProviderError::new("connection reset"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn list(&self, _token: &AuthToken) -> Result<Vec<RemoteObject>, ProviderError> {
        self.check()?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .map(|(obj, _)| obj.clone())
            .collect())
    }

    async fn get(&self, _token: &AuthToken, id: &str) -> Result<Vec<u8>, ProviderError> {
        self.check()?;
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(obj, _)| obj.id == id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| ProviderError::with_status(404, id.to_string()))
    }

    async fn create(
        &self,
        _token: &AuthToken,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ProviderError> {
        self.check()?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().unwrap();
        let id = format!("obj-{}", objects.len() + 1);
        objects.push((
            RemoteObject {
                id: id.clone(),
                name: name.to_string(),
            },
            bytes,
        ));
        Ok(id)
    }

    async fn update(
        &self,
        _token: &AuthToken,
        id: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ProviderError> {
        self.check()?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().unwrap();
        let slot = objects
            .iter_mut()
            .find(|(obj, _)| obj.id == id)
            .ok_or_else(|| ProviderError::with_status(404, id.to_string()))?;
        slot.1 = bytes;
        Ok(())
    }
}

// === Connectivity ===

pub struct FakeConnectivity(AtomicBool);

impl FakeConnectivity {
    pub fn online() -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(true)))
    }

    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connectivity for FakeConnectivity {
    async fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Store whose n-th `put` fails once; everything else hits SQLite.
pub struct FlakyStore {
    inner: Arc<SqliteStore>,
    puts: AtomicUsize,
    fail_at: usize,
}

impl FlakyStore {
    pub fn failing_put(inner: Arc<SqliteStore>, fail_at: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            puts: AtomicUsize::new(0),
            fail_at,
        })
    }
}

#[async_trait]
impl LocalStore for FlakyStore {
    async fn get_all(&self) -> Result<Vec<Item>, StoreError> {
        self.inner.get_all().await
    }

    async fn get(&self, id: &str) -> Result<Option<Item>, StoreError> {
        self.inner.get(id).await
    }

    async fn find_by_word(&self, word: &str) -> Result<Option<Item>, StoreError> {
        self.inner.find_by_word(word).await
    }

    async fn put(&self, item: &Item) -> Result<(), StoreError> {
        if self.puts.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_at {
            return Err(StoreError::Task("disk full".into()));
        }
        self.inner.put(item).await
    }

    async fn delete(&self, id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.delete(id, now).await
    }

    async fn get_blob(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get_blob(id).await
    }

    async fn put_blob(&self, id: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.inner.put_blob(id, bytes).await
    }

    async fn export_all(&self) -> Result<Vec<Item>, StoreError> {
        self.inner.export_all().await
    }

    async fn import_many(&self, items: &[Item]) -> Result<usize, StoreError> {
        self.inner.import_many(items).await
    }
}

// === Harnesses ===

/// Queue wired to fakes over `store`.
pub async fn start_queue(
    store: Arc<SqliteStore>,
    enricher: Arc<FakeEnricher>,
    renderer: Arc<FakeRenderer>,
) -> IngestQueue {
    IngestQueue::start(QueueDeps {
        store: store.clone(),
        journal: store,
        enricher,
        renderer,
    })
    .await
    .expect("start queue")
}

/// Sync engine and the fakes behind it.
pub struct SyncContext {
    pub store: Arc<SqliteStore>,
    pub remote: Arc<MemoryRemote>,
    pub auth: Arc<FakeAuth>,
    pub connectivity: Arc<FakeConnectivity>,
    pub engine: SyncEngine,
}

impl SyncContext {
    pub fn new(store: Arc<SqliteStore>, remote: Arc<MemoryRemote>) -> Self {
        let auth = FakeAuth::new();
        let connectivity = FakeConnectivity::online();
        let engine = SyncEngine::new(
            SyncDeps {
                store: store.clone(),
                remote: remote.clone(),
                auth: auth.clone(),
                connectivity: connectivity.clone(),
            },
            BACKUP_NAME,
        );
        Self {
            store,
            remote,
            auth,
            connectivity,
            engine,
        }
    }
}
