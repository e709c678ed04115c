//! Local-first data layer for the word card app.
//!
//! Provides:
//! - SQLite item and blob storage with migration-aware loading
//! - A durable, single-worker ingestion queue
//! - Union-merge sync against a remote backup object
//! - Review scheduling and image regeneration

pub mod collaborators;
pub mod config;
pub mod db;
pub mod ingest;
pub mod library;
pub mod state;
pub mod sync;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::Config;
pub use state::{AppState, Collaborators};

/// Install the global tracing subscriber, filtered by `RUST_LOG` (default `info`).
///
/// Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
