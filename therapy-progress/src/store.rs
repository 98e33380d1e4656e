//! Persistence interfaces for progress documents, the trial log and the
//! exercise catalog

pub mod postgres;

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::catalog::ExerciseDefinition;
use crate::models::{ModuleKey, ModuleType, ProgressRecord, Trial};

pub use postgres::PostgresStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Stored document could not be decoded: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Filter for trial history queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialQuery {
    pub module_type: Option<ModuleType>,
    pub sub_mode: Option<String>,
    pub limit: usize,
}

impl Default for TrialQuery {
    fn default() -> Self {
        Self {
            module_type: None,
            sub_mode: None,
            limit: 50,
        }
    }
}

impl TrialQuery {
    pub fn matches(&self, trial: &Trial) -> bool {
        let module = trial.module();
        self.module_type.map_or(true, |m| module.module_type == m)
            && self.sub_mode.as_ref().map_or(true, |s| module.sub_mode.as_ref() == Some(s))
    }
}

/// Progress documents, written whole
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load_progress(&self, user_id: &str, key: &ModuleKey) -> Result<Option<ProgressRecord>, StoreError>;

    /// Insert or replace the document for `(record.user_id, record.module)`
    async fn save_progress(&self, record: &ProgressRecord) -> Result<(), StoreError>;

    async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>, StoreError>;

    /// Returns the number of documents removed
    async fn delete_user(&self, user_id: &str) -> Result<u64, StoreError>;
}

/// Append-only trial history
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrialLog: Send + Sync {
    async fn append_trial(&self, trial: &Trial) -> Result<(), StoreError>;

    /// Newest first
    async fn list_trials(&self, user_id: &str, query: &TrialQuery) -> Result<Vec<Trial>, StoreError>;

    async fn delete_user(&self, user_id: &str) -> Result<u64, StoreError>;
}

/// Therapist-editable exercise definitions, keyed by `exercise_id`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExerciseStore: Send + Sync {
    async fn list_exercises(&self) -> Result<Vec<ExerciseDefinition>, StoreError>;

    /// Insert or replace by `exercise_id`
    async fn save_exercise(&self, exercise: &ExerciseDefinition) -> Result<(), StoreError>;

    /// Whether a row was removed
    async fn delete_exercise(&self, exercise_id: &str) -> Result<bool, StoreError>;

    /// Every exercise, or every exercise of one module type
    async fn delete_exercises(&self, module_type: Option<ModuleType>) -> Result<u64, StoreError>;
}

/// In-memory progress store for testing and development
pub struct InMemoryProgressStore {
    records: Arc<DashMap<(String, String), ProgressRecord>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
        }
    }

    fn record_key(user_id: &str, key: &ModuleKey) -> (String, String) {
        (user_id.to_string(), key.storage_key())
    }
}

impl Default for InMemoryProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn load_progress(&self, user_id: &str, key: &ModuleKey) -> Result<Option<ProgressRecord>, StoreError> {
        Ok(self
            .records
            .get(&Self::record_key(user_id, key))
            .map(|entry| entry.value().clone()))
    }

    async fn save_progress(&self, record: &ProgressRecord) -> Result<(), StoreError> {
        self.records
            .insert(Self::record_key(&record.user_id, &record.module), record.clone());
        Ok(())
    }

    async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>, StoreError> {
        let mut records: Vec<ProgressRecord> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.module.cmp(&b.module));
        Ok(records)
    }

    async fn delete_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let before = self.records.len();
        self.records.retain(|(owner, _), _| owner != user_id);
        Ok(u64::try_from(before.saturating_sub(self.records.len())).unwrap_or(u64::MAX))
    }
}

/// In-memory trial log, partitioned by user
pub struct InMemoryTrialLog {
    trials: Arc<DashMap<String, Vec<Trial>>>,
}

impl InMemoryTrialLog {
    pub fn new() -> Self {
        Self {
            trials: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryTrialLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrialLog for InMemoryTrialLog {
    async fn append_trial(&self, trial: &Trial) -> Result<(), StoreError> {
        self.trials
            .entry(trial.user_id.clone())
            .or_default()
            .push(trial.clone());
        Ok(())
    }

    async fn list_trials(&self, user_id: &str, query: &TrialQuery) -> Result<Vec<Trial>, StoreError> {
        let Some(trials) = self.trials.get(user_id) else {
            return Ok(Vec::new());
        };

        // appended in order, so reverse gives newest first
        Ok(trials
            .iter()
            .rev()
            .filter(|trial| query.matches(trial))
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn delete_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let removed = self.trials.remove(user_id).map_or(0, |(_, trials)| trials.len());
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

/// In-memory exercise store
pub struct InMemoryExerciseStore {
    exercises: Arc<DashMap<String, ExerciseDefinition>>,
}

impl InMemoryExerciseStore {
    pub fn new() -> Self {
        Self {
            exercises: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryExerciseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExerciseStore for InMemoryExerciseStore {
    async fn list_exercises(&self) -> Result<Vec<ExerciseDefinition>, StoreError> {
        Ok(self.exercises.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn save_exercise(&self, exercise: &ExerciseDefinition) -> Result<(), StoreError> {
        self.exercises.insert(exercise.exercise_id.clone(), exercise.clone());
        Ok(())
    }

    async fn delete_exercise(&self, exercise_id: &str) -> Result<bool, StoreError> {
        Ok(self.exercises.remove(exercise_id).is_some())
    }

    async fn delete_exercises(&self, module_type: Option<ModuleType>) -> Result<u64, StoreError> {
        let before = self.exercises.len();
        self.exercises
            .retain(|_, e| module_type.is_some_and(|m| e.module.module_type != m));
        Ok(u64::try_from(before.saturating_sub(self.exercises.len())).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExerciseRef;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn trial(user_id: &str, key: ModuleKey, level: u32) -> Trial {
        Trial {
            trial_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            exercise: ExerciseRef::new(key, level, 0),
            sub_scores: BTreeMap::new(),
            composite_score: 0.5,
            transcription: String::new(),
            fallback: false,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_progress_store() {
        let store = InMemoryProgressStore::new();
        let record = ProgressRecord::new("alice", ModuleKey::articulation("s"));

        store.save_progress(&record).await.unwrap();
        store.save_progress(&ProgressRecord::new("alice", ModuleKey::fluency())).await.unwrap();
        store.save_progress(&ProgressRecord::new("bob", ModuleKey::fluency())).await.unwrap();

        let loaded = store.load_progress("alice", &ModuleKey::articulation("s")).await.unwrap();
        assert_eq!(loaded, Some(record));
        assert!(store.load_progress("alice", &ModuleKey::articulation("r")).await.unwrap().is_none());
        assert_eq!(store.list_progress("alice").await.unwrap().len(), 2);

        assert_eq!(store.delete_user("alice").await.unwrap(), 2);
        assert!(store.list_progress("alice").await.unwrap().is_empty());
        assert_eq!(store.list_progress("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_trial_log_filters_newest_first() {
        let log = InMemoryTrialLog::new();
        let first = trial("alice", ModuleKey::articulation("s"), 1);
        let second = trial("alice", ModuleKey::fluency(), 1);
        let third = trial("alice", ModuleKey::articulation("r"), 2);
        for t in [&first, &second, &third] {
            log.append_trial(t).await.unwrap();
        }

        let all = log.list_trials("alice", &TrialQuery::default()).await.unwrap();
        let ids: Vec<Uuid> = all.iter().map(|t| t.trial_id).collect();
        assert_eq!(ids, vec![third.trial_id, second.trial_id, first.trial_id]);

        let query = TrialQuery {
            module_type: Some(ModuleType::Articulation),
            sub_mode: Some("s".to_string()),
            limit: 10,
        };
        let filtered = log.list_trials("alice", &query).await.unwrap();
        assert_eq!(filtered, vec![first]);

        let limited = log.list_trials("alice", &TrialQuery { limit: 1, ..TrialQuery::default() }).await.unwrap();
        assert_eq!(limited.len(), 1);

        assert_eq!(log.delete_user("alice").await.unwrap(), 3);
        assert!(log.list_trials("alice", &TrialQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_exercise_store() {
        let store = InMemoryExerciseStore::new();
        for exercise in crate::catalog::seeded_exercises() {
            store.save_exercise(&exercise).await.unwrap();
        }
        let seeded = store.list_exercises().await.unwrap().len();

        assert!(store.delete_exercise("s-1-1").await.unwrap());
        assert!(!store.delete_exercise("s-1-1").await.unwrap());

        // five sounds, fifteen articulation items each, one already gone
        assert_eq!(store.delete_exercises(Some(ModuleType::Articulation)).await.unwrap(), 74);
        let remaining = store.list_exercises().await.unwrap();
        assert_eq!(remaining.len(), seeded - 75);
        assert!(remaining.iter().all(|e| e.module.module_type != ModuleType::Articulation));

        assert_eq!(store.delete_exercises(None).await.unwrap(), u64::try_from(seeded - 75).unwrap());
    }
}
