//! Study operations over stored items.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use wordcard_core::algorithm::{SpacedRepetitionAlgorithm, Sm2};
use wordcard_core::error::ReviewError;
use wordcard_core::failure::ProviderError;
use wordcard_core::migration::migrate;
use wordcard_core::types::{Item, ItemStatus, LibraryStats, Quality};

use crate::collaborators::ImageRenderer;
use crate::db::{load_migrated, LocalStore, StoreError};
use crate::ingest::default_image_prompt;

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("item not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error("image generation failed: {0}")]
    ImageGeneration(ProviderError),
}

type Result<T> = std::result::Result<T, LibraryError>;

/// Reviews, deletion and image regeneration on top of a [`LocalStore`].
#[derive(Clone)]
pub struct Library {
    store: Arc<dyn LocalStore>,
    renderer: Arc<dyn ImageRenderer>,
    scheduler: Sm2,
}

impl Library {
    pub fn new(store: Arc<dyn LocalStore>, renderer: Arc<dyn ImageRenderer>) -> Self {
        Self {
            store,
            renderer,
            scheduler: Sm2::default(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Sm2) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Non-deleted items at the current schema.
    pub async fn items(&self) -> Result<Vec<Item>> {
        let loaded = load_migrated(self.store.as_ref()).await?;
        Ok(loaded.items.into_iter().filter(|i| !i.deleted).collect())
    }

    async fn live_item(&self, id: &str) -> Result<Item> {
        match self.store.get(id).await? {
            Some(item) if item.deleted => Err(ReviewError::Deleted(item.id).into()),
            Some(item) => Ok(item),
            None => Err(LibraryError::NotFound(id.to_string())),
        }
    }

    /// Apply a review answer and persist the rescheduled item.
    pub async fn review(&self, id: &str, quality: u8) -> Result<Item> {
        let quality = Quality::try_from(quality)?;
        let now = Utc::now();
        let item = migrate(self.live_item(id).await?, now);

        let reviewed = self.scheduler.review(&item, quality, now);
        self.store.put(&reviewed.record_only()).await?;

        tracing::debug!(
            "Reviewed {} (q={}): next in {} day(s)",
            reviewed.id,
            quality.value(),
            reviewed.interval
        );
        Ok(reviewed)
    }

    /// Tombstone an item. The record stays so sync can see the deletion.
    pub async fn delete(&self, id: &str) -> Result<()> {
        match self.store.delete(id, Utc::now()).await {
            Err(StoreError::ItemNotFound(id)) => Err(LibraryError::NotFound(id)),
            other => Ok(other?),
        }
    }

    /// Render a new illustration for an item.
    ///
    /// On failure the item returns to `Normal` with its previous image.
    pub async fn regenerate_image(&self, id: &str) -> Result<Item> {
        let mut item = migrate(self.live_item(id).await?, Utc::now());
        item.status = ItemStatus::Updating;
        item.touch(Utc::now());
        self.store.put(&item.record_only()).await?;

        let prompt = item
            .analysis
            .image_prompt
            .clone()
            .unwrap_or_else(|| default_image_prompt(&item.word));
        let rendered = self.renderer.render_image(&item.word, &prompt).await;

        item.status = ItemStatus::Normal;
        item.touch(Utc::now());
        match rendered {
            Ok(bytes) => {
                let item = item.with_image(bytes);
                self.store.put(&item).await?;
                tracing::info!("Regenerated image for {}", item.id);
                Ok(item)
            }
            Err(e) => {
                tracing::warn!("Image regeneration for {} failed: {}", item.id, e);
                self.store.put(&item.record_only()).await?;
                Err(LibraryError::ImageGeneration(e))
            }
        }
    }

    /// Items due for review, oldest due date first.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Item>> {
        let mut due: Vec<Item> = self
            .items()
            .await?
            .into_iter()
            .filter(|i| i.is_due(now))
            .collect();
        due.sort_by_key(|i| i.next_review_at);
        Ok(due)
    }

    pub async fn learned(&self) -> Result<Vec<Item>> {
        Ok(self
            .items()
            .await?
            .into_iter()
            .filter(|i| self.scheduler.is_learned(i))
            .collect())
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> Result<LibraryStats> {
        let items = self.items().await?;
        Ok(LibraryStats {
            total: items.len(),
            new_items: items.iter().filter(|i| i.repetition == 0).count(),
            due: items.iter().filter(|i| i.is_due(now)).count(),
            learned: items
                .iter()
                .filter(|i| self.scheduler.is_learned(i))
                .count(),
        })
    }

    /// Reset items left `Generating` or `Updating` by an interrupted run.
    pub async fn recover_interrupted(&self) -> Result<usize> {
        let mut recovered = 0;
        for item in self.store.get_all().await? {
            if item.status == ItemStatus::Normal {
                continue;
            }
            let mut item = item.record_only();
            item.status = ItemStatus::Normal;
            item.touch(Utc::now());
            self.store.put(&item).await?;
            recovered += 1;
        }
        if recovered > 0 {
            tracing::info!("Recovered {} interrupted item(s)", recovered);
        }
        Ok(recovered)
    }
}
