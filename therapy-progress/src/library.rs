//! Therapist-managed exercise catalog
//!
//! Every change is written to the [`ExerciseStore`] first and then applied to
//! the shared [`InMemoryCatalog`], so trial scoring and patient listings see
//! it on the next request. Writers are serialized; reads go to the catalog.

use error_common::ErrorContext;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::catalog::{seeded_exercises, ExerciseCatalog, ExerciseDefinition, InMemoryCatalog};
use crate::error::{Result, TherapyError};
use crate::models::{ModuleKey, ModuleType};
use crate::store::{ExerciseStore, StoreError};

/// Partial edit of one exercise; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExerciseUpdate {
    pub level: Option<u32>,
    pub item_index: Option<u32>,
    pub order: Option<u32>,
    pub instruction: Option<String>,
    pub target: Option<String>,
    pub expected_keywords: Option<Vec<String>>,
    pub min_words: Option<u32>,
    pub active: Option<bool>,
}

pub struct ExerciseLibrary {
    catalog: Arc<InMemoryCatalog>,
    store: Arc<dyn ExerciseStore>,
    write_lock: Mutex<()>,
}

impl ExerciseLibrary {
    /// Load the stored exercises into `catalog`.
    ///
    /// An empty store is a first start: the catalog's current exercises are
    /// written to it instead.
    pub async fn open(catalog: Arc<InMemoryCatalog>, store: Arc<dyn ExerciseStore>) -> Result<Self> {
        let stored = store
            .list_exercises()
            .await
            .map_err(|e| Self::storage(e, "open_exercise_library"))?;

        if stored.is_empty() {
            let seeded = catalog.all_exercises(None);
            for exercise in &seeded {
                store
                    .save_exercise(exercise)
                    .await
                    .map_err(|e| Self::storage(e, "open_exercise_library"))?;
            }
            info!(exercises = seeded.len(), "Exercise store seeded from the built-in tables");
        } else {
            info!(exercises = stored.len(), "Exercises loaded from store");
            catalog.replace_all(stored);
        }

        Ok(Self {
            catalog,
            store,
            write_lock: Mutex::new(()),
        })
    }

    pub fn catalog(&self) -> &Arc<InMemoryCatalog> {
        &self.catalog
    }

    pub fn list(&self, module_type: Option<ModuleType>) -> Vec<ExerciseDefinition> {
        self.catalog.all_exercises(module_type)
    }

    pub fn get(&self, exercise_id: &str) -> Result<ExerciseDefinition> {
        self.catalog
            .exercise_by_id(exercise_id)
            .ok_or_else(|| TherapyError::not_found("exercise", exercise_id, ErrorContext::new("get_exercise")))
    }

    /// Add a new exercise.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when the id or the `(module, level, item)` slot is
    /// taken, `InvalidInput` for an empty id or target or an out-of-bounds
    /// slot, `StorageUnavailable` when the store fails.
    pub async fn create(&self, exercise: ExerciseDefinition) -> Result<ExerciseDefinition> {
        let _guard = self.write_lock.lock().await;
        let exercise = self.normalized(exercise, "create_exercise")?;
        let ctx = || Self::context("create_exercise", &exercise);

        if self.catalog.exercise_by_id(&exercise.exercise_id).is_some() {
            return Err(TherapyError::already_exists(
                format!("exercise id '{}'", exercise.exercise_id),
                ctx(),
            ));
        }
        if let Some(owner) = self.catalog.slot_owner(&exercise.module, exercise.level, exercise.item_index) {
            return Err(TherapyError::already_exists(
                format!("level {} item {} is held by '{owner}'", exercise.level, exercise.item_index),
                ctx(),
            ));
        }

        self.store
            .save_exercise(&exercise)
            .await
            .map_err(|e| TherapyError::storage(e, ctx()))?;
        self.catalog.put(exercise.clone());

        info!(exercise_id = %exercise.exercise_id, module = %exercise.module, level = exercise.level, "Exercise created");
        Ok(exercise)
    }

    pub async fn update(&self, exercise_id: &str, update: ExerciseUpdate) -> Result<ExerciseDefinition> {
        let _guard = self.write_lock.lock().await;
        let current = self.get(exercise_id)?;
        let ctx = || Self::context("update_exercise", &current);

        let mut edited = current.clone();
        if let Some(level) = update.level {
            edited.level = level;
        }
        if let Some(item_index) = update.item_index {
            edited.item_index = item_index;
        }
        if let Some(order) = update.order {
            edited.order = order;
        }
        if let Some(instruction) = update.instruction {
            edited.instruction = instruction;
        }
        if let Some(target) = update.target {
            edited.target = target;
        }
        if let Some(keywords) = update.expected_keywords {
            edited.expected_keywords = keywords;
        }
        if update.min_words.is_some() {
            edited.min_words = update.min_words;
        }
        if let Some(active) = update.active {
            edited.active = active;
        }

        let edited = self.normalized(edited, "update_exercise")?;
        if let Some(owner) = self.catalog.slot_owner(&edited.module, edited.level, edited.item_index) {
            if owner != exercise_id {
                return Err(TherapyError::already_exists(
                    format!("level {} item {} is held by '{owner}'", edited.level, edited.item_index),
                    ctx(),
                ));
            }
        }

        self.store
            .save_exercise(&edited)
            .await
            .map_err(|e| TherapyError::storage(e, ctx()))?;
        self.catalog.put(edited.clone());

        info!(exercise_id, module = %edited.module, "Exercise updated");
        Ok(edited)
    }

    /// Flip the `active` flag that controls patient visibility
    pub async fn toggle_active(&self, exercise_id: &str) -> Result<ExerciseDefinition> {
        let _guard = self.write_lock.lock().await;
        let mut exercise = self.get(exercise_id)?;
        exercise.active = !exercise.active;

        self.store
            .save_exercise(&exercise)
            .await
            .map_err(|e| TherapyError::storage(e, Self::context("toggle_exercise", &exercise)))?;
        self.catalog.put(exercise.clone());

        info!(exercise_id, active = exercise.active, "Exercise visibility changed");
        Ok(exercise)
    }

    pub async fn delete(&self, exercise_id: &str) -> Result<ExerciseDefinition> {
        let _guard = self.write_lock.lock().await;
        let exercise = self.get(exercise_id)?;

        self.store
            .delete_exercise(exercise_id)
            .await
            .map_err(|e| TherapyError::storage(e, Self::context("delete_exercise", &exercise)))?;
        self.catalog.remove(exercise_id);

        info!(exercise_id, module = %exercise.module, "Exercise deleted");
        Ok(exercise)
    }

    /// Remove every exercise, or those of one module type, ahead of re-seeding
    pub async fn delete_all(&self, module_type: Option<ModuleType>) -> Result<u64> {
        let _guard = self.write_lock.lock().await;

        let removed = self
            .store
            .delete_exercises(module_type)
            .await
            .map_err(|e| Self::storage(e, "delete_exercises"))?;
        self.catalog.clear(module_type);

        info!(module = module_type.map_or("all", |m| m.as_str()), removed, "Exercises deleted");
        Ok(removed)
    }

    /// Restore built-in exercises whose id and slot are both free.
    ///
    /// Returns how many were inserted; existing edits are never overwritten.
    pub async fn seed_defaults(&self, module_type: Option<ModuleType>) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let mut inserted = 0u64;
        let mut taken: HashSet<(ModuleKey, u32, u32)> = self
            .catalog
            .all_exercises(None)
            .into_iter()
            .map(|e| (e.module, e.level, e.item_index))
            .collect();

        for exercise in seeded_exercises()
            .into_iter()
            .filter(|e| module_type.map_or(true, |m| e.module.module_type == m))
        {
            let slot = (exercise.module.clone(), exercise.level, exercise.item_index);
            if self.catalog.exercise_by_id(&exercise.exercise_id).is_some() || taken.contains(&slot) {
                continue;
            }

            self.store
                .save_exercise(&exercise)
                .await
                .map_err(|e| Self::storage(e, "seed_exercises"))?;
            self.catalog.put(exercise);
            taken.insert(slot);
            inserted += 1;
        }

        info!(module = module_type.map_or("all", |m| m.as_str()), inserted, "Built-in exercises seeded");
        Ok(inserted)
    }

    /// Trim text fields, re-validate the module key and check slot bounds
    fn normalized(&self, mut exercise: ExerciseDefinition, operation: &str) -> Result<ExerciseDefinition> {
        exercise.exercise_id = exercise.exercise_id.trim().to_string();
        exercise.target = exercise.target.trim().to_string();
        exercise.instruction = exercise.instruction.trim().to_string();
        exercise.module = ModuleKey::new(exercise.module.module_type, exercise.module.sub_mode.as_deref())?;
        exercise.expected_keywords.retain(|k| !k.trim().is_empty());

        let ctx = Self::context(operation, &exercise);
        if exercise.exercise_id.is_empty() {
            return Err(TherapyError::invalid_input("exercise id is required", ctx));
        }
        if exercise.target.is_empty() {
            return Err(TherapyError::invalid_input("target is required", ctx));
        }

        let module = exercise.module.module_type;
        let total_levels = self.catalog.total_levels(module);
        let max_items = self.catalog.max_items_per_level(module);
        if exercise.level == 0 || exercise.level > total_levels {
            return Err(TherapyError::invalid_input(
                format!("level {} is outside 1..={total_levels}", exercise.level),
                ctx,
            ));
        }
        if exercise.item_index >= max_items {
            return Err(TherapyError::invalid_input(
                format!("item index {} is outside 0..{max_items}", exercise.item_index),
                ctx,
            ));
        }

        Ok(exercise)
    }

    fn context(operation: &str, exercise: &ExerciseDefinition) -> ErrorContext {
        ErrorContext::new(operation)
            .with_module(exercise.module.storage_key())
            .add_context("exercise_id", exercise.exercise_id.clone())
    }

    fn storage(err: StoreError, operation: &str) -> TherapyError {
        TherapyError::storage(err, ErrorContext::new(operation))
    }
}
