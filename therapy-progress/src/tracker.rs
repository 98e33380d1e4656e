//! Level/item progress tracking
//!
//! The tracker owns the read-modify-write cycle on a [`ProgressRecord`].
//! Writes for one `(user, module)` pair are serialized by an async mutex held
//! from load to save; derived level fields are recomputed from `items` on
//! every write and never adjusted incrementally.

use chrono::Utc;
use dashmap::DashMap;
use error_common::ErrorContext;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::catalog::ExerciseCatalog;
use crate::error::{Result, TherapyError};
use crate::models::{ItemState, ModuleKey, Position, ProgressRecord, TrialDetail};
use crate::scoring::unit_score;
use crate::store::ProgressStore;

/// Caller-decided outcome for one item
#[derive(Debug, Clone)]
pub struct ItemAttempt {
    pub completed: bool,
    pub average_score: f64,
    pub trial_detail: TrialDetail,
}

type LockKey = (String, String);

pub struct ProgressTracker {
    store: Arc<dyn ProgressStore>,
    catalog: Arc<dyn ExerciseCatalog>,
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn ProgressStore>, catalog: Arc<dyn ExerciseCatalog>) -> Self {
        Self {
            store,
            catalog,
            locks: DashMap::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<dyn ExerciseCatalog> {
        &self.catalog
    }

    /// Store an item outcome decided by the caller.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a level or item outside the module's bounds,
    /// `InvalidScoreRange` for an average outside `[0, 1]`,
    /// `StorageUnavailable` when the store fails. Nothing is retried.
    pub async fn record_item_attempt(
        &self,
        user_id: &str,
        key: &ModuleKey,
        level: u32,
        item_index: u32,
        attempt: ItemAttempt,
    ) -> Result<ProgressRecord> {
        unit_score("average_score", attempt.average_score)?;

        self.update_item(user_id, key, level, item_index, "record_item_attempt", |item| {
            item.completed = attempt.completed;
            item.average_score = attempt.average_score;
            item.last_attempt = attempt.trial_detail.recorded_at;
            item.trial_details.push(attempt.trial_detail);
        })
        .await
    }

    /// Append a scored trial and derive the item outcome from the module policy.
    ///
    /// The average covers the most recent `trials_per_item` trials. An item
    /// becomes complete once that many trials exist and their average meets
    /// the pass threshold; a completed item stays completed.
    pub async fn record_scored_trial(
        &self,
        user_id: &str,
        key: &ModuleKey,
        level: u32,
        item_index: u32,
        detail: TrialDetail,
    ) -> Result<ProgressRecord> {
        unit_score("composite_score", detail.composite_score)?;

        let window = self.catalog.trials_per_item(key.module_type).max(1) as usize;
        let threshold = self.catalog.pass_threshold(key.module_type);

        self.update_item(user_id, key, level, item_index, "record_scored_trial", |item| {
            item.last_attempt = detail.recorded_at;
            item.trial_details.push(detail);

            let recent: Vec<f64> = item
                .trial_details
                .iter()
                .rev()
                .take(window)
                .map(|d| d.composite_score)
                .collect();
            #[allow(clippy::cast_precision_loss)]
            let average = recent.iter().sum::<f64>() / recent.len() as f64;

            item.average_score = average;
            item.completed = item.completed || (recent.len() >= window && average >= threshold);
        })
        .await
    }

    async fn update_item<F>(
        &self,
        user_id: &str,
        key: &ModuleKey,
        level: u32,
        item_index: u32,
        operation: &str,
        update: F,
    ) -> Result<ProgressRecord>
    where
        F: FnOnce(&mut ItemState) + Send,
    {
        self.check_bounds(user_id, key, level, item_index, operation)?;

        let lock = self.lock_for(user_id, key);
        let _guard = lock.lock().await;

        let mut record = self
            .store
            .load_progress(user_id, key)
            .await
            .map_err(|e| TherapyError::storage(e, Self::context(operation, user_id, key)))?
            .unwrap_or_else(|| ProgressRecord::new(user_id, key.clone()));

        let now = Utc::now();
        let level_state = record.levels.entry(level).or_default();
        let item = level_state
            .items
            .entry(item_index)
            .or_insert_with(|| ItemState::new(now));
        update(item);
        let item_completed = item.completed;

        level_state.recompute(self.catalog.required_item_count(key.module_type, level));
        let level_complete = level_state.is_complete;
        let completed_items = level_state.completed_item_count;
        record.updated_at = now;

        self.store
            .save_progress(&record)
            .await
            .map_err(|e| TherapyError::storage(e, Self::context(operation, user_id, key)))?;

        debug!(
            user_id,
            module = %key,
            level,
            item_index,
            item_completed,
            completed_items,
            "Progress updated"
        );
        if level_complete {
            info!(user_id, module = %key, level, "Level complete");
        }

        Ok(record)
    }

    /// Next item to attempt. Lock-free; may observe a slightly stale record.
    pub async fn current_position(&self, user_id: &str, key: &ModuleKey) -> Result<Position> {
        let record = self.load(user_id, key).await?;
        Ok(self.position_of(key, record.as_ref()))
    }

    /// First incomplete level, then the first absent or incomplete item in it
    pub fn position_of(&self, key: &ModuleKey, record: Option<&ProgressRecord>) -> Position {
        let module = key.module_type;
        let total_levels = self.catalog.total_levels(module);
        let max_items = self.catalog.max_items_per_level(module);

        for level in 1..=total_levels {
            if record.is_some_and(|r| r.is_level_complete(level)) {
                continue;
            }
            let item_index = (0..max_items)
                .find(|&index| !record.and_then(|r| r.item(level, index)).is_some_and(|item| item.completed))
                .unwrap_or(0);
            return Position::At { level, item_index };
        }

        Position::ModuleComplete { total_levels }
    }

    pub async fn load(&self, user_id: &str, key: &ModuleKey) -> Result<Option<ProgressRecord>> {
        self.store
            .load_progress(user_id, key)
            .await
            .map_err(|e| TherapyError::storage(e, Self::context("load_progress", user_id, key)))
    }

    pub async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>> {
        self.store
            .list_progress(user_id)
            .await
            .map_err(|e| TherapyError::storage(e, ErrorContext::new("list_progress").with_user_id(user_id)))
    }

    /// Removes every progress document of the user.
    ///
    /// Holds the write lock of every known key of the user while deleting, so
    /// an in-flight write finishes first and later writes start from nothing.
    pub async fn delete_user(&self, user_id: &str) -> Result<u64> {
        let mut keys: Vec<String> = self
            .list_progress(user_id)
            .await?
            .iter()
            .map(|record| record.module.storage_key())
            .collect();
        keys.extend(
            self.locks
                .iter()
                .filter(|entry| entry.key().0 == user_id)
                .map(|entry| entry.key().1.clone()),
        );
        // one acquisition order for concurrent deletes of the same user
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock_for_storage_key(user_id, key).lock_owned().await);
        }

        let removed = self
            .store
            .delete_user(user_id)
            .await
            .map_err(|e| TherapyError::storage(e, ErrorContext::new("delete_progress").with_user_id(user_id)))?;
        drop(guards);

        Ok(removed)
    }

    pub(crate) fn check_bounds(&self, user_id: &str, key: &ModuleKey, level: u32, item_index: u32, operation: &str) -> Result<()> {
        let total_levels = self.catalog.total_levels(key.module_type);
        let max_items = self.catalog.max_items_per_level(key.module_type);

        if level == 0 || level > total_levels {
            return Err(TherapyError::invalid_input(
                format!("level {level} is outside 1..={total_levels}"),
                Self::context(operation, user_id, key),
            ));
        }
        if item_index >= max_items {
            return Err(TherapyError::invalid_input(
                format!("item index {item_index} is outside 0..{max_items}"),
                Self::context(operation, user_id, key),
            ));
        }
        Ok(())
    }

    fn lock_for(&self, user_id: &str, key: &ModuleKey) -> Arc<Mutex<()>> {
        self.lock_for_storage_key(user_id, key.storage_key())
    }

    /// Entries are never removed, so every writer of a key shares one mutex
    fn lock_for_storage_key(&self, user_id: &str, storage_key: String) -> Arc<Mutex<()>> {
        self.locks
            .entry((user_id.to_string(), storage_key))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn context(operation: &str, user_id: &str, key: &ModuleKey) -> ErrorContext {
        ErrorContext::new(operation)
            .with_user_id(user_id)
            .with_module(key.storage_key())
    }
}
