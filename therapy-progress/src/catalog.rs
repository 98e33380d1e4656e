//! Exercise reference data and per-module level policy

mod seed;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{ModuleKey, ModuleType};

/// Item bound scanned by `current_position` within one level
pub const DEFAULT_MAX_ITEMS_PER_LEVEL: u32 = 10;

/// One exercise prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseDefinition {
    pub exercise_id: String,
    #[serde(flatten)]
    pub module: ModuleKey,
    pub level: u32,
    pub item_index: u32,
    pub order: u32,
    pub instruction: String,
    /// Reference text for assessment, or the expected answer for receptive items
    pub target: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_words: Option<u32>,
    pub active: bool,
}

/// How levels of one module are completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelPolicy {
    /// Completed items needed per level, index 0 is level 1
    pub required_items: Vec<u32>,
    pub max_items_per_level: u32,
    /// Trials averaged when deciding whether an item is complete
    pub trials_per_item: u32,
    pub pass_threshold: f64,
}

impl LevelPolicy {
    pub fn total_levels(&self) -> u32 {
        u32::try_from(self.required_items.len()).unwrap_or(u32::MAX)
    }

    pub fn required_item_count(&self, level: u32) -> u32 {
        level
            .checked_sub(1)
            .and_then(|i| self.required_items.get(i as usize))
            .copied()
            .unwrap_or(0)
    }
}

pub trait ExerciseCatalog: Send + Sync {
    fn required_item_count(&self, module: ModuleType, level: u32) -> u32;

    fn total_levels(&self, module: ModuleType) -> u32;

    fn max_items_per_level(&self, module: ModuleType) -> u32;

    fn trials_per_item(&self, module: ModuleType) -> u32;

    fn pass_threshold(&self, module: ModuleType) -> f64;

    /// Exercises of one level ordered by `order`
    fn exercises(&self, key: &ModuleKey, level: u32, include_inactive: bool) -> Vec<ExerciseDefinition>;

    fn exercise(&self, key: &ModuleKey, level: u32, item_index: u32) -> Option<ExerciseDefinition>;

    /// Target sounds that have articulation exercises
    fn sounds(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Catalog held in memory.
///
/// Level policies are fixed at construction. Exercises are keyed by
/// `exercise_id` and may be replaced at runtime; [`crate::library::ExerciseLibrary`]
/// is the writer that keeps them in step with an [`crate::store::ExerciseStore`].
#[derive(Debug)]
pub struct InMemoryCatalog {
    policies: HashMap<ModuleType, LevelPolicy>,
    exercises: DashMap<String, ExerciseDefinition>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            policies: HashMap::new(),
            exercises: DashMap::new(),
        }
    }

    pub fn with_policy(mut self, module: ModuleType, policy: LevelPolicy) -> Self {
        self.policies.insert(module, policy);
        self
    }

    /// Adds the exercise, displacing whatever occupied its slot
    pub fn with_exercise(self, exercise: ExerciseDefinition) -> Self {
        if let Some(previous) = self.slot_owner(&exercise.module, exercise.level, exercise.item_index) {
            self.exercises.remove(&previous);
        }
        self.exercises.insert(exercise.exercise_id.clone(), exercise);
        self
    }

    pub fn policy(&self, module: ModuleType) -> Option<&LevelPolicy> {
        self.policies.get(&module)
    }

    pub fn exercise_by_id(&self, exercise_id: &str) -> Option<ExerciseDefinition> {
        self.exercises.get(exercise_id).map(|entry| entry.value().clone())
    }

    /// Id of the exercise at `(key, level, item_index)`, if any
    pub fn slot_owner(&self, key: &ModuleKey, level: u32, item_index: u32) -> Option<String> {
        self.exercises
            .iter()
            .find(|e| &e.module == key && e.level == level && e.item_index == item_index)
            .map(|e| e.key().clone())
    }

    /// Every exercise, optionally of one module type, in catalog order
    pub fn all_exercises(&self, module_type: Option<ModuleType>) -> Vec<ExerciseDefinition> {
        let mut found: Vec<ExerciseDefinition> = self
            .exercises
            .iter()
            .filter(|e| module_type.map_or(true, |m| e.module.module_type == m))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by(|a, b| {
            (&a.module, a.level, a.order, a.item_index).cmp(&(&b.module, b.level, b.order, b.item_index))
        });
        found
    }

    /// Insert or replace by `exercise_id`
    pub fn put(&self, exercise: ExerciseDefinition) {
        self.exercises.insert(exercise.exercise_id.clone(), exercise);
    }

    pub fn remove(&self, exercise_id: &str) -> Option<ExerciseDefinition> {
        self.exercises.remove(exercise_id).map(|(_, exercise)| exercise)
    }

    /// Drops every exercise, or those of one module type
    pub fn clear(&self, module_type: Option<ModuleType>) {
        self.exercises
            .retain(|_, e| module_type.is_some_and(|m| e.module.module_type != m));
    }

    /// Swap the whole exercise set, keeping the policies
    pub fn replace_all(&self, exercises: Vec<ExerciseDefinition>) {
        self.exercises.clear();
        for exercise in exercises {
            self.put(exercise);
        }
    }
}

/// The built-in exercise tables
pub fn seeded_exercises() -> Vec<ExerciseDefinition> {
    seed::exercises()
}

impl Default for InMemoryCatalog {
    /// Seeded with the built-in exercise tables and level policies
    fn default() -> Self {
        let catalog = seed::policies()
            .into_iter()
            .fold(Self::new(), |catalog, (module, policy)| catalog.with_policy(module, policy));
        seed::exercises().into_iter().fold(catalog, InMemoryCatalog::with_exercise)
    }
}

impl ExerciseCatalog for InMemoryCatalog {
    fn required_item_count(&self, module: ModuleType, level: u32) -> u32 {
        self.policy(module).map_or(0, |p| p.required_item_count(level))
    }

    fn total_levels(&self, module: ModuleType) -> u32 {
        self.policy(module).map_or(0, LevelPolicy::total_levels)
    }

    fn max_items_per_level(&self, module: ModuleType) -> u32 {
        self.policy(module).map_or(DEFAULT_MAX_ITEMS_PER_LEVEL, |p| p.max_items_per_level)
    }

    fn trials_per_item(&self, module: ModuleType) -> u32 {
        self.policy(module).map_or(1, |p| p.trials_per_item.max(1))
    }

    fn pass_threshold(&self, module: ModuleType) -> f64 {
        self.policy(module).map_or(1.0, |p| p.pass_threshold)
    }

    fn exercises(&self, key: &ModuleKey, level: u32, include_inactive: bool) -> Vec<ExerciseDefinition> {
        let mut found: Vec<ExerciseDefinition> = self
            .exercises
            .iter()
            .filter(|e| &e.module == key && e.level == level && (include_inactive || e.active))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|e| (e.order, e.item_index));
        found
    }

    fn exercise(&self, key: &ModuleKey, level: u32, item_index: u32) -> Option<ExerciseDefinition> {
        self.exercises
            .iter()
            .find(|e| &e.module == key && e.level == level && e.item_index == item_index)
            .map(|e| e.value().clone())
    }

    fn sounds(&self) -> Vec<String> {
        let mut sounds: Vec<String> = self
            .exercises
            .iter()
            .filter(|e| e.module.module_type == ModuleType::Articulation)
            .filter_map(|e| e.module.sub_mode.clone())
            .collect();
        sounds.sort();
        sounds.dedup();
        sounds
    }
}
