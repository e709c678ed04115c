//! Application state.

use anyhow::Context;
use std::sync::Arc;
use tokio::task::JoinHandle;
use wordcard_core::algorithm::Sm2;

use crate::collaborators::{
    AlwaysOnline, Authenticator, Connectivity, Enricher, HttpConnectivity, ImageRenderer,
    RemoteStore, S3RemoteStore,
};
use crate::config::Config;
use crate::db::{SqliteRepository, SqliteStore};
use crate::ingest::{IngestQueue, QueueDeps};
use crate::library::Library;
use crate::sync::{SyncDeps, SyncEngine};

/// External services supplied by the embedding application.
///
/// `remote` and `connectivity` fall back to the configured S3 store and
/// health probe when left empty.
pub struct Collaborators {
    pub enricher: Arc<dyn Enricher>,
    pub renderer: Arc<dyn ImageRenderer>,
    pub authenticator: Arc<dyn Authenticator>,
    pub remote: Option<Arc<dyn RemoteStore>>,
    pub connectivity: Option<Arc<dyn Connectivity>>,
}

/// Global application state.
pub struct AppState {
    pub store: SqliteStore,
    pub library: Library,
    pub queue: IngestQueue,
    /// `None` when no remote store is configured.
    pub sync: Option<SyncEngine>,
    sync_task: Option<JoinHandle<()>>,
}

impl AppState {
    /// Open the local store and start the background services.
    pub async fn bootstrap(config: &Config, collaborators: Collaborators) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data directory {}", config.data_dir.display())
        })?;

        let db_path = config.db_path();
        tracing::info!("Opening local store at {}", db_path.display());
        let repository = SqliteRepository::open(&db_path)
            .with_context(|| format!("failed to open database {}", db_path.display()))?;
        let store = SqliteStore::new(repository);
        let shared = Arc::new(store.clone());

        let library = Library::new(shared.clone(), collaborators.renderer.clone())
            .with_scheduler(Sm2::with_learned_threshold(config.learned_threshold));
        library.recover_interrupted().await?;

        let queue = IngestQueue::start(QueueDeps {
            store: shared.clone(),
            journal: shared.clone(),
            enricher: collaborators.enricher,
            renderer: collaborators.renderer,
        })
        .await?;

        let remote: Option<Arc<dyn RemoteStore>> = match (collaborators.remote, &config.remote) {
            (Some(remote), _) => Some(remote),
            (None, Some(remote_config)) => {
                tracing::info!("Initializing S3 storage...");
                Some(Arc::new(S3RemoteStore::new(remote_config).await?))
            }
            (None, None) => {
                tracing::info!("No remote store configured; sync disabled");
                None
            }
        };

        let connectivity: Arc<dyn Connectivity> = match (collaborators.connectivity, &config.health_url) {
            (Some(connectivity), _) => connectivity,
            (None, Some(url)) => Arc::new(HttpConnectivity::new(url.as_str())?),
            (None, None) => Arc::new(AlwaysOnline),
        };

        let sync = remote.map(|remote| {
            SyncEngine::new(
                SyncDeps {
                    store: shared.clone(),
                    remote,
                    auth: collaborators.authenticator,
                    connectivity,
                },
                config.backup_name.clone(),
            )
        });

        let sync_task = match (&sync, config.sync_interval) {
            (Some(engine), Some(interval)) => {
                tracing::info!("Background sync every {}s", interval.as_secs());
                Some(engine.spawn_periodic(interval))
            }
            _ => None,
        };

        Ok(Self {
            store,
            library,
            queue,
            sync,
            sync_task,
        })
    }

    /// Stop background sync and let the queue finish its current entry.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.sync_task.take() {
            task.abort();
        }
        self.queue.shutdown().await;
    }
}
