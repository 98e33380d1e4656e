//! PostgreSQL-backed progress store, trial log and exercise store
//!
//! Progress documents are stored whole as JSONB, one row per
//! `(user_id, module_type, sub_mode)`. Trials are append-only rows with the
//! full trial as JSONB alongside the columns used for filtering. Exercises
//! are one JSONB row per `exercise_id`.

use async_trait::async_trait;
use sqlx::{types::Json, Executor, PgPool, Row};
use tracing::{debug, info};

use crate::{
    catalog::ExerciseDefinition,
    models::{ModuleKey, ModuleType, ProgressRecord, Trial},
    store::{ExerciseStore, ProgressStore, StoreError, TrialLog, TrialQuery},
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS therapy_progress (
    user_id     TEXT NOT NULL,
    module_type TEXT NOT NULL,
    sub_mode    TEXT NOT NULL DEFAULT '',
    document    JSONB NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (user_id, module_type, sub_mode)
);

CREATE TABLE IF NOT EXISTS therapy_trials (
    trial_id    UUID PRIMARY KEY,
    user_id     TEXT NOT NULL,
    module_type TEXT NOT NULL,
    sub_mode    TEXT NOT NULL DEFAULT '',
    level       INTEGER NOT NULL,
    item_index  INTEGER NOT NULL,
    document    JSONB NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_therapy_trials_user_time
    ON therapy_trials (user_id, recorded_at DESC);

CREATE TABLE IF NOT EXISTS therapy_exercises (
    exercise_id TEXT PRIMARY KEY,
    module_type TEXT NOT NULL,
    sub_mode    TEXT NOT NULL DEFAULT '',
    level       INTEGER NOT NULL,
    item_index  INTEGER NOT NULL,
    document    JSONB NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create with connection string
    pub async fn from_connection_string(connection_string: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(connection_string)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {}", e)))?;

        Ok(Self::new(pool))
    }

    /// Create the tables if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        // simple-query protocol, so the multi-statement script runs as one call
        (&self.pool)
            .execute(SCHEMA)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to create schema: {}", e)))?;

        info!("Therapy schema ready");
        Ok(())
    }

    fn sub_mode_column(key: &ModuleKey) -> &str {
        key.sub_mode.as_deref().unwrap_or("")
    }
}

#[async_trait]
impl ProgressStore for PostgresStore {
    async fn load_progress(&self, user_id: &str, key: &ModuleKey) -> Result<Option<ProgressRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT document FROM therapy_progress
            WHERE user_id = $1 AND module_type = $2 AND sub_mode = $3
            "#,
        )
        .bind(user_id)
        .bind(key.module_type.as_str())
        .bind(Self::sub_mode_column(key))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("Failed to load progress: {}", e)))?;

        row.map(|row| {
            let Json(record): Json<ProgressRecord> = row
                .try_get("document")
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            Ok(record)
        })
        .transpose()
    }

    async fn save_progress(&self, record: &ProgressRecord) -> Result<(), StoreError> {
        debug!(user_id = %record.user_id, module = %record.module, "Saving progress document");

        sqlx::query(
            r#"
            INSERT INTO therapy_progress (user_id, module_type, sub_mode, document, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, module_type, sub_mode)
            DO UPDATE SET document = EXCLUDED.document, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.user_id)
        .bind(record.module.module_type.as_str())
        .bind(Self::sub_mode_column(&record.module))
        .bind(Json(record))
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("Failed to save progress: {}", e)))?;

        Ok(())
    }

    async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT document FROM therapy_progress
            WHERE user_id = $1
            ORDER BY module_type, sub_mode
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("Failed to list progress: {}", e)))?;

        rows.into_iter()
            .map(|row| {
                let Json(record): Json<ProgressRecord> = row
                    .try_get("document")
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(record)
            })
            .collect()
    }

    async fn delete_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM therapy_progress WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to delete progress: {}", e)))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TrialLog for PostgresStore {
    async fn append_trial(&self, trial: &Trial) -> Result<(), StoreError> {
        let module = trial.module();
        let level = i32::try_from(trial.exercise.level)
            .map_err(|_| StoreError::Serialization(format!("level {} out of range", trial.exercise.level)))?;
        let item_index = i32::try_from(trial.exercise.item_index)
            .map_err(|_| StoreError::Serialization(format!("item {} out of range", trial.exercise.item_index)))?;

        sqlx::query(
            r#"
            INSERT INTO therapy_trials (
                trial_id, user_id, module_type, sub_mode, level, item_index, document, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(trial.trial_id)
        .bind(&trial.user_id)
        .bind(module.module_type.as_str())
        .bind(Self::sub_mode_column(module))
        .bind(level)
        .bind(item_index)
        .bind(Json(trial))
        .bind(trial.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("Failed to append trial: {}", e)))?;

        Ok(())
    }

    async fn list_trials(&self, user_id: &str, query: &TrialQuery) -> Result<Vec<Trial>, StoreError> {
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
            SELECT document FROM therapy_trials
            WHERE user_id = $1
              AND ($2::TEXT IS NULL OR module_type = $2)
              AND ($3::TEXT IS NULL OR sub_mode = $3)
            ORDER BY recorded_at DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(query.module_type.map(|m| m.as_str()))
        .bind(query.sub_mode.as_deref())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("Failed to list trials: {}", e)))?;

        rows.into_iter()
            .map(|row| {
                let Json(trial): Json<Trial> = row
                    .try_get("document")
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(trial)
            })
            .collect()
    }

    async fn delete_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM therapy_trials WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to delete trials: {}", e)))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ExerciseStore for PostgresStore {
    async fn list_exercises(&self) -> Result<Vec<ExerciseDefinition>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT document FROM therapy_exercises
            ORDER BY module_type, sub_mode, level, item_index
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("Failed to list exercises: {}", e)))?;

        rows.into_iter()
            .map(|row| {
                let Json(exercise): Json<ExerciseDefinition> = row
                    .try_get("document")
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(exercise)
            })
            .collect()
    }

    async fn save_exercise(&self, exercise: &ExerciseDefinition) -> Result<(), StoreError> {
        let level = i32::try_from(exercise.level)
            .map_err(|_| StoreError::Serialization(format!("level {} out of range", exercise.level)))?;
        let item_index = i32::try_from(exercise.item_index)
            .map_err(|_| StoreError::Serialization(format!("item {} out of range", exercise.item_index)))?;

        debug!(exercise_id = %exercise.exercise_id, module = %exercise.module, "Saving exercise");

        sqlx::query(
            r#"
            INSERT INTO therapy_exercises (exercise_id, module_type, sub_mode, level, item_index, document, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (exercise_id)
            DO UPDATE SET module_type = EXCLUDED.module_type,
                          sub_mode = EXCLUDED.sub_mode,
                          level = EXCLUDED.level,
                          item_index = EXCLUDED.item_index,
                          document = EXCLUDED.document,
                          updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&exercise.exercise_id)
        .bind(exercise.module.module_type.as_str())
        .bind(Self::sub_mode_column(&exercise.module))
        .bind(level)
        .bind(item_index)
        .bind(Json(exercise))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("Failed to save exercise: {}", e)))?;

        Ok(())
    }

    async fn delete_exercise(&self, exercise_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM therapy_exercises WHERE exercise_id = $1")
            .bind(exercise_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to delete exercise: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_exercises(&self, module_type: Option<ModuleType>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM therapy_exercises WHERE ($1::TEXT IS NULL OR module_type = $1)")
            .bind(module_type.map(|m| m.as_str()))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to delete exercises: {}", e)))?;

        Ok(result.rows_affected())
    }
}
