//! Sync engine for the remote backup.
//!
//! A sync is a union merge: records present remotely but unknown locally are
//! imported, local records always win on id conflicts, and the merged record
//! set is written back over the remote object.

pub mod document;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use wordcard_core::failure::ProviderError;
use wordcard_core::migration::migrate_all;
use wordcard_core::types::Item;

use crate::collaborators::{AuthMode, AuthToken, Authenticator, Connectivity, RemoteStore};
use crate::db::{load_migrated, LocalStore, StoreError};

/// Sync errors. They end the attempt and surface through [`SyncState`].
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Local store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    fn network(e: ProviderError) -> Self {
        Self::Network(e.to_string())
    }

    fn encode(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Observable sync status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub syncing: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Sync statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Remote records added to the local store.
    pub imported: usize,
    /// Local records upgraded to the current schema.
    pub migrated_local: usize,
    /// Records written to the remote object.
    pub uploaded: usize,
    pub created_remote: bool,
    /// The remote object was unreadable and was replaced by local data.
    pub recreated_remote: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    AlreadyRunning,
    Offline,
    /// Background syncs wait for a manual sign-in first.
    NotAuthenticated,
}

/// Result of a [`SyncEngine::sync`] call. Failures are reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    Skipped(SkipReason),
    Failed(String),
}

/// Collaborators the engine talks to.
#[derive(Clone)]
pub struct SyncDeps {
    pub store: Arc<dyn LocalStore>,
    pub remote: Arc<dyn RemoteStore>,
    pub auth: Arc<dyn Authenticator>,
    pub connectivity: Arc<dyn Connectivity>,
}

/// Inner state shared across clones.
struct SyncEngineInner {
    deps: SyncDeps,
    backup_name: String,
    state: watch::Sender<SyncState>,
    manual_auth_done: AtomicBool,
}

/// Sync engine for the remote backup.
///
/// Clone-able; all clones share one status and one single-flight guard.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<SyncEngineInner>,
}

impl SyncEngine {
    pub fn new(deps: SyncDeps, backup_name: impl Into<String>) -> Self {
        let (state, _) = watch::channel(SyncState::default());
        Self {
            inner: Arc::new(SyncEngineInner {
                deps,
                backup_name: backup_name.into(),
                state,
                manual_auth_done: AtomicBool::new(false),
            }),
        }
    }

    /// Get current sync status.
    pub fn status(&self) -> SyncState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    /// Clear the last error without touching anything else.
    pub fn dismiss_error(&self) {
        self.inner.state.send_if_modified(|s| s.last_error.take().is_some());
    }

    /// Whether a manual sync has signed in during this session.
    pub fn is_authenticated(&self) -> bool {
        self.inner.manual_auth_done.load(Ordering::Acquire)
    }

    /// Run one sync.
    ///
    /// `manual` syncs may prompt for sign-in; background syncs never do and
    /// are skipped until a manual one has succeeded in authenticating.
    pub async fn sync(&self, manual: bool) -> SyncOutcome {
        if !self.inner.deps.connectivity.is_online().await {
            tracing::debug!("Skipping sync: offline");
            return SyncOutcome::Skipped(SkipReason::Offline);
        }
        if !manual && !self.is_authenticated() {
            tracing::debug!("Skipping background sync: not signed in");
            return SyncOutcome::Skipped(SkipReason::NotAuthenticated);
        }

        let acquired = self.inner.state.send_if_modified(|s| {
            if s.syncing {
                false
            } else {
                s.syncing = true;
                true
            }
        });
        if !acquired {
            tracing::debug!("Sync already in progress");
            return SyncOutcome::Skipped(SkipReason::AlreadyRunning);
        }

        tracing::info!("Sync started ({})", if manual { "manual" } else { "background" });
        let result = self.run(manual).await;

        self.inner.state.send_modify(|s| {
            s.syncing = false;
            match &result {
                Ok(_) => {
                    s.last_synced_at = Some(Utc::now());
                    s.last_error = None;
                }
                Err(e) => s.last_error = Some(e.to_string()),
            }
        });

        match result {
            Ok(report) => {
                tracing::info!(
                    "Sync completed: {} imported, {} uploaded",
                    report.imported,
                    report.uploaded
                );
                SyncOutcome::Completed(report)
            }
            Err(e) => {
                tracing::warn!("Sync failed: {}", e);
                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    /// Spawn a task that runs a background sync every `interval`.
    ///
    /// The first run happens one full interval after spawning.
    pub fn spawn_periodic(&self, interval: Duration) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let outcome = engine.sync(false).await;
                tracing::debug!("Periodic sync: {:?}", outcome);
            }
        })
    }

    async fn authenticate(&self, manual: bool) -> Result<AuthToken, SyncError> {
        let mode = if manual && !self.is_authenticated() {
            AuthMode::Interactive
        } else {
            AuthMode::Silent
        };
        let token = self
            .inner
            .deps
            .auth
            .authenticate(mode)
            .await
            .map_err(|e| SyncError::Auth(e.to_string()))?;
        if manual {
            self.inner.manual_auth_done.store(true, Ordering::Release);
        }
        Ok(token)
    }

    async fn run(&self, manual: bool) -> Result<SyncReport, SyncError> {
        let deps = &self.inner.deps;
        let mut report = SyncReport::default();

        // 1. Authenticate
        let token = self.authenticate(manual).await?;

        // 2. Locate the backup
        let remote_id = deps
            .remote
            .list(&token)
            .await
            .map_err(SyncError::network)?
            .into_iter()
            .find(|o| o.name == self.inner.backup_name)
            .map(|o| o.id);

        // 3. Bring local records to the current schema
        let local = load_migrated(deps.store.as_ref()).await?;
        report.migrated_local = local.migrated;

        let Some(remote_id) = remote_id else {
            let records = deps.store.export_all().await?;
            let bytes = document::encode(&records).map_err(SyncError::encode)?;
            deps.remote
                .create(&token, &self.inner.backup_name, bytes)
                .await
                .map_err(SyncError::network)?;
            tracing::info!("Created remote backup with {} record(s)", records.len());
            report.uploaded = records.len();
            report.created_remote = true;
            return Ok(report);
        };

        // 4. Download and parse
        let bytes = deps
            .remote
            .get(&token, &remote_id)
            .await
            .map_err(SyncError::network)?;
        let remote_items = match document::decode(&bytes) {
            Ok(items) => migrate_all(items, Utc::now()),
            Err(e) => {
                tracing::warn!("Remote backup unreadable, recreating from local data: {}", e);
                report.recreated_remote = true;
                Vec::new()
            }
        };

        // 5. Import remote records unknown locally
        let incoming = new_records(&local.items, remote_items);
        if !incoming.is_empty() {
            report.imported = deps.store.import_many(&incoming).await?;
        }

        // 6. Overwrite the remote with the merged set
        let merged = deps.store.export_all().await?;
        let bytes = document::encode(&merged).map_err(SyncError::encode)?;
        deps.remote
            .update(&token, &remote_id, bytes)
            .await
            .map_err(SyncError::network)?;
        report.uploaded = merged.len();

        Ok(report)
    }
}

/// Remote records whose ids are not present locally.
fn new_records(local: &[Item], remote: Vec<Item>) -> Vec<Item> {
    let known: HashSet<&str> = local.iter().map(|i| i.id.as_str()).collect();
    remote
        .into_iter()
        .filter(|i| !known.contains(i.id.as_str()))
        .collect()
}
