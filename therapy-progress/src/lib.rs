//! Therapy progress engine for SpeechCare Engine
//!
//! Turns assessed recordings into trials and keeps each patient's position
//! within a therapy module.
//!
//! # Flow
//!
//! ```text
//! submission -> AssessmentProvider -> ScoreCombiner -> TrialRecorder -> ProgressTracker
//! ```
//!
//! - [`scoring::ScoreCombiner`] maps sub-scores to one composite on `[0, 1]`
//! - [`recorder::TrialRecorder`] appends immutable trials
//! - [`tracker::ProgressTracker`] maintains the per-module progress document
//!   and derives the next item to attempt
//! - [`service::TherapyService`] wires the above together for the request layer
//! - [`library::ExerciseLibrary`] lets therapists edit the exercise catalog,
//!   persisting every change through an [`store::ExerciseStore`]
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use speech_assessment::{create_provider, AssessmentConfig};
//! use therapy_progress::{
//!     InMemoryProgressStore, InMemoryTrialLog, ModuleKey, InMemoryCatalog, TherapyService, TrialSubmission,
//! };
//!
//! # async fn example(audio: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let provider = create_provider(&AssessmentConfig::from_env()?)?;
//! let service = TherapyService::new(
//!     Arc::from(provider),
//!     Arc::new(InMemoryCatalog::default()),
//!     Arc::new(InMemoryProgressStore::new()),
//!     Arc::new(InMemoryTrialLog::new()),
//! );
//!
//! let outcome = service
//!     .submit_trial(TrialSubmission {
//!         user_id: "patient-42".to_string(),
//!         module: ModuleKey::articulation("s"),
//!         level: 1,
//!         item_index: 0,
//!         audio,
//!         reference_text: "sss".to_string(),
//!         expected_keywords: None,
//!         min_words: None,
//!     })
//!     .await?;
//! println!("score {:.2}, next {:?}", outcome.composite_score, outcome.next_position);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod error;
pub mod library;
pub mod models;
pub mod recorder;
pub mod scoring;
pub mod service;
pub mod store;
pub mod tracker;

pub use catalog::{seeded_exercises, ExerciseCatalog, ExerciseDefinition, InMemoryCatalog, LevelPolicy};
pub use error::TherapyError;
pub use library::{ExerciseLibrary, ExerciseUpdate};
pub use models::*;
pub use recorder::{NewTrial, TrialRecorder};
pub use scoring::{Feedback, FluencyScoringConfig, ScoreCombiner};
pub use service::{DeletionSummary, TherapyService, TrialOutcome, TrialSubmission};
pub use store::{
    ExerciseStore, InMemoryExerciseStore, InMemoryProgressStore, InMemoryTrialLog, PostgresStore, ProgressStore, StoreError,
    TrialLog, TrialQuery,
};
pub use tracker::{ItemAttempt, ProgressTracker};
