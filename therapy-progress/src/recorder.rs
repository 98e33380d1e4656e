use chrono::Utc;
use error_common::ErrorContext;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{Result, TherapyError};
use crate::models::{ExerciseRef, Trial};
use crate::store::{TrialLog, TrialQuery};

/// Everything needed to append one trial
#[derive(Debug, Clone)]
pub struct NewTrial {
    pub user_id: String,
    pub exercise: ExerciseRef,
    pub sub_scores: BTreeMap<String, f64>,
    pub composite_score: f64,
    pub transcription: String,
    pub fallback: bool,
}

/// Appends immutable trial records.
///
/// There is no dedup key: a retried submission is recorded as another attempt.
pub struct TrialRecorder {
    log: Arc<dyn TrialLog>,
}

impl TrialRecorder {
    pub fn new(log: Arc<dyn TrialLog>) -> Self {
        Self { log }
    }

    /// Appends the trial and returns the stored record, id and timestamp included
    pub async fn record_trial(&self, new_trial: NewTrial) -> Result<Trial> {
        let trial = Trial {
            trial_id: Uuid::new_v4(),
            user_id: new_trial.user_id,
            exercise: new_trial.exercise,
            sub_scores: new_trial.sub_scores,
            composite_score: new_trial.composite_score,
            transcription: new_trial.transcription,
            fallback: new_trial.fallback,
            timestamp: Utc::now(),
        };

        if let Err(e) = self.log.append_trial(&trial).await {
            error!(user_id = %trial.user_id, module = %trial.module(), error = %e, "Failed to append trial");
            return Err(TherapyError::storage(e, Self::context("record_trial", &trial.user_id)));
        }

        debug!(
            trial_id = %trial.trial_id,
            user_id = %trial.user_id,
            module = %trial.module(),
            level = trial.exercise.level,
            item_index = trial.exercise.item_index,
            fallback = trial.fallback,
            "Trial recorded"
        );
        Ok(trial)
    }

    pub async fn list_trials(&self, user_id: &str, query: &TrialQuery) -> Result<Vec<Trial>> {
        self.log
            .list_trials(user_id, query)
            .await
            .map_err(|e| TherapyError::storage(e, Self::context("list_trials", user_id)))
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<u64> {
        self.log
            .delete_user(user_id)
            .await
            .map_err(|e| TherapyError::storage(e, Self::context("delete_trials", user_id)))
    }

    fn context(operation: &str, user_id: &str) -> ErrorContext {
        ErrorContext::new(operation).with_user_id(user_id)
    }
}
