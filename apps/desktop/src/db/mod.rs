//! Local SQLite storage.

pub mod error;
pub mod loader;
pub mod repository;
pub mod schema;
pub mod store;

pub use error::StoreError;
pub use loader::{load_migrated, Loaded};
pub use repository::{
    BlobRepository, ItemRepository, JobRepository, PendingJob, SqliteRepository,
};
pub use store::{LocalStore, QueueJournal, SqliteStore};
