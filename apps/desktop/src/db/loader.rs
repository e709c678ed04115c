//! Migration-aware loading of the local store.

use chrono::Utc;
use wordcard_core::migration::{migrate, needs_migration};
use wordcard_core::types::Item;

use crate::db::error::StoreError;
use crate::db::store::LocalStore;

/// Items read from the store, upgraded to the current schema.
#[derive(Debug)]
pub struct Loaded {
    pub items: Vec<Item>,
    /// How many records were behind the current schema.
    pub migrated: usize,
}

/// Load every record, migrate it, and write back the ones that changed.
///
/// A failed write-back is logged and skipped: the caller still gets the
/// migrated record in memory, and the next load retries the write.
pub async fn load_migrated(store: &dyn LocalStore) -> Result<Loaded, StoreError> {
    let now = Utc::now();
    let mut items = Vec::new();
    let mut migrated = 0;

    for item in store.get_all().await? {
        if !needs_migration(&item) {
            items.push(item);
            continue;
        }

        let from = item.schema_version;
        let item = migrate(item, now);
        migrated += 1;
        if let Err(e) = store.put(&item.record_only()).await {
            tracing::warn!(
                "Failed to persist migrated item {} (v{} -> v{}): {}",
                item.id,
                from,
                item.schema_version,
                e
            );
        }
        items.push(item);
    }

    if migrated > 0 {
        tracing::info!("Migrated {} item(s) to the current schema", migrated);
    }

    Ok(Loaded { items, migrated })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::SqliteRepository;
    use crate::db::store::SqliteStore;
    use wordcard_core::migration::CURRENT_VERSION;
    use wordcard_core::types::AnalysisResult;

    fn legacy(word: &str) -> Item {
        let mut item = Item::new(
            word,
            AnalysisResult {
                definition: format!(" {word} "),
                ..Default::default()
            },
            Utc::now(),
        );
        item.schema_version = 1;
        item
    }

    #[test]
    fn persists_only_changed_records() {
        tokio_test::block_on(async {
            let store = SqliteStore::new(SqliteRepository::open_in_memory().unwrap());
            let current = Item::new("dog", AnalysisResult::default(), Utc::now());
            store.import_many(&[legacy("cat"), current.clone()]).await.unwrap();

            let loaded = load_migrated(&store).await.unwrap();
            assert_eq!(loaded.migrated, 1);
            assert!(loaded.items.iter().all(|i| i.schema_version == CURRENT_VERSION));

            let stored = store.export_all().await.unwrap();
            assert!(stored.iter().all(|i| i.schema_version == CURRENT_VERSION));
            let dog = stored.iter().find(|i| i.id == current.id).unwrap();
            assert_eq!(dog.updated_at, current.updated_at);

            let again = load_migrated(&store).await.unwrap();
            assert_eq!(again.migrated, 0);
        });
    }
}
