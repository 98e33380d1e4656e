//! Request-facing operations: submit a trial, read progress, erase a user

use error_common::ErrorContext;
use serde::Serialize;
use speech_assessment::{
    inspect_wav, match_keywords, sub_scores, word_count, AssessmentFailure, AssessmentProvider, AssessmentResult,
    KeywordMatch, SpeechMetrics,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::{ExerciseCatalog, ExerciseDefinition};
use crate::error::{Result, TherapyError};
use crate::models::{ExerciseRef, ModuleKey, ModuleType, Position, ProgressRecord, ProgressView, Trial, TrialId};
use crate::recorder::{NewTrial, TrialRecorder};
use crate::scoring::{ExpressiveInput, Feedback, FluencyInput, ScoreCombiner, FALLBACK_SCORE};
use crate::store::{ProgressStore, TrialLog, TrialQuery};
use crate::tracker::ProgressTracker;

const DEFAULT_PAUSE_THRESHOLD_MS: u64 = 500;

/// One recorded attempt as submitted by a patient
#[derive(Debug, Clone)]
pub struct TrialSubmission {
    pub user_id: String,
    pub module: ModuleKey,
    pub level: u32,
    pub item_index: u32,
    pub audio: Vec<u8>,
    /// Falls back to the catalog target when empty
    pub reference_text: String,
    /// Expressive language only; falls back to the catalog
    pub expected_keywords: Option<Vec<String>>,
    pub min_words: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialOutcome {
    pub trial_id: TrialId,
    pub module: ModuleKey,
    pub level: u32,
    pub item_index: u32,
    pub composite_score: f64,
    pub sub_scores: BTreeMap<String, f64>,
    pub transcription: String,
    pub feedback: Feedback,
    pub feedback_message: String,
    /// The score is the fixed placeholder, not a real assessment
    pub fallback: bool,
    /// Whether the item is now complete
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<KeywordMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<SpeechMetrics>,
    pub updated_progress: ProgressRecord,
    pub next_position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeletionSummary {
    pub progress_records: u64,
    pub trials: u64,
}

/// Composite score plus whatever analysis produced it
struct Scored {
    composite: f64,
    keywords: Option<KeywordMatch>,
    metrics: Option<SpeechMetrics>,
}

pub struct TherapyService {
    provider: Arc<dyn AssessmentProvider>,
    catalog: Arc<dyn ExerciseCatalog>,
    combiner: ScoreCombiner,
    recorder: TrialRecorder,
    tracker: ProgressTracker,
    pause_threshold_ms: u64,
}

impl TherapyService {
    pub fn new(
        provider: Arc<dyn AssessmentProvider>,
        catalog: Arc<dyn ExerciseCatalog>,
        progress_store: Arc<dyn ProgressStore>,
        trial_log: Arc<dyn TrialLog>,
    ) -> Self {
        Self {
            provider,
            tracker: ProgressTracker::new(progress_store, Arc::clone(&catalog)),
            catalog,
            combiner: ScoreCombiner::default(),
            recorder: TrialRecorder::new(trial_log),
            pause_threshold_ms: DEFAULT_PAUSE_THRESHOLD_MS,
        }
    }

    pub fn with_combiner(mut self, combiner: ScoreCombiner) -> Self {
        self.combiner = combiner;
        self
    }

    pub fn with_pause_threshold_ms(mut self, pause_threshold_ms: u64) -> Self {
        self.pause_threshold_ms = pause_threshold_ms;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn catalog(&self) -> &Arc<dyn ExerciseCatalog> {
        &self.catalog
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Validate, assess, combine, record the trial, update progress.
    ///
    /// `NotConfigured` from the provider is not an error: the trial is
    /// recorded with the fallback score and flagged. Any other assessment
    /// failure records nothing.
    pub async fn submit_trial(&self, submission: TrialSubmission) -> Result<TrialOutcome> {
        let TrialSubmission {
            user_id,
            module,
            level,
            item_index,
            audio,
            reference_text,
            expected_keywords,
            min_words,
        } = submission;
        let ctx = Self::context("submit_trial", &user_id, &module);

        if user_id.trim().is_empty() {
            return Err(TherapyError::invalid_input("user id is required", ctx));
        }
        if module.module_type == ModuleType::ReceptiveLanguage {
            return Err(TherapyError::invalid_input(
                "receptive language items are answered, not recorded",
                ctx,
            ));
        }
        if audio.is_empty() {
            return Err(TherapyError::invalid_input("audio recording is empty", ctx));
        }
        self.tracker.check_bounds(&user_id, &module, level, item_index, "submit_trial")?;

        let exercise = self.catalog.exercise(&module, level, item_index);
        let reference_text = match reference_text.trim() {
            "" => exercise.as_ref().map(|e| e.target.clone()).unwrap_or_default(),
            text => text.to_string(),
        };
        if reference_text.is_empty() {
            return Err(TherapyError::invalid_input("reference text is required", ctx));
        }

        info!(
            user_id = %user_id,
            module = %module,
            level,
            item_index,
            audio_bytes = audio.len(),
            provider = self.provider.name(),
            "Assessing trial"
        );

        let (scored, sub_scores, transcription, fallback) = match self.provider.assess(&audio, &reference_text).await {
            Ok(result) => {
                let keywords = expected_keywords
                    .or_else(|| exercise.as_ref().map(|e| e.expected_keywords.clone()))
                    .unwrap_or_default();
                let min_words = min_words.or_else(|| exercise.as_ref().and_then(|e| e.min_words)).unwrap_or(0);
                let scored = self.combine(&module, &result, &audio, &keywords, min_words, &ctx)?;
                (scored, result.sub_scores, result.transcription, false)
            }
            Err(AssessmentFailure::NotConfigured(reason)) => {
                warn!(user_id = %user_id, module = %module, %reason, "Assessment provider not configured, recording fallback score");
                let scored = Scored { composite: FALLBACK_SCORE, keywords: None, metrics: None };
                (scored, BTreeMap::new(), reference_text.clone(), true)
            }
            Err(AssessmentFailure::InvalidAudio(reason)) => {
                return Err(TherapyError::invalid_input(format!("unreadable audio: {reason}"), ctx));
            }
            Err(failure) => {
                warn!(user_id = %user_id, module = %module, error = %failure, "Assessment failed, no trial recorded");
                return Err(TherapyError::assessment(failure, ctx));
            }
        };

        let trial = self
            .recorder
            .record_trial(NewTrial {
                user_id: user_id.clone(),
                exercise: ExerciseRef::new(module.clone(), level, item_index),
                sub_scores,
                composite_score: scored.composite,
                transcription,
                fallback,
            })
            .await?;

        self.finish(trial, scored.keywords, scored.metrics).await
    }

    /// Score a receptive-language answer: 1.0 when correct, 0.0 otherwise
    pub async fn submit_receptive_answer(
        &self,
        user_id: &str,
        level: u32,
        item_index: u32,
        correct: bool,
    ) -> Result<TrialOutcome> {
        let module = ModuleKey::receptive();
        self.tracker.check_bounds(user_id, &module, level, item_index, "submit_receptive_answer")?;

        let score = self.combiner.receptive(correct);
        let transcription = self
            .catalog
            .exercise(&module, level, item_index)
            .filter(|_| correct)
            .map(|e| e.target)
            .unwrap_or_default();

        let trial = self
            .recorder
            .record_trial(NewTrial {
                user_id: user_id.to_string(),
                exercise: ExerciseRef::new(module, level, item_index),
                sub_scores: BTreeMap::from([("correct".to_string(), score)]),
                composite_score: score,
                transcription,
                fallback: false,
            })
            .await?;

        self.finish(trial, None, None).await
    }

    async fn finish(
        &self,
        trial: Trial,
        keywords: Option<KeywordMatch>,
        metrics: Option<SpeechMetrics>,
    ) -> Result<TrialOutcome> {
        let ExerciseRef { module, level, item_index } = trial.exercise.clone();
        let record = self
            .tracker
            .record_scored_trial(&trial.user_id, &module, level, item_index, trial.detail())
            .await?;
        let passed = record.item(level, item_index).is_some_and(|item| item.completed);
        let next_position = self.tracker.position_of(&module, Some(&record));
        let feedback = Feedback::for_score(trial.composite_score);

        info!(
            trial_id = %trial.trial_id,
            user_id = %trial.user_id,
            module = %module,
            level,
            item_index,
            composite_score = trial.composite_score,
            fallback = trial.fallback,
            passed,
            "Trial scored"
        );

        Ok(TrialOutcome {
            trial_id: trial.trial_id,
            module,
            level,
            item_index,
            composite_score: trial.composite_score,
            sub_scores: trial.sub_scores,
            transcription: trial.transcription,
            feedback,
            feedback_message: feedback.message().to_string(),
            fallback: trial.fallback,
            passed,
            keywords,
            metrics,
            updated_progress: record,
            next_position,
        })
    }

    fn combine(
        &self,
        module: &ModuleKey,
        result: &AssessmentResult,
        audio: &[u8],
        keywords: &[String],
        min_words: u32,
        ctx: &ErrorContext,
    ) -> Result<Scored> {
        match module.module_type {
            ModuleType::Articulation => {
                let score = |name: &str| {
                    result.sub_score(name).ok_or_else(|| {
                        TherapyError::assessment(
                            AssessmentFailure::ServiceUnavailable(format!("provider returned no {name} score")),
                            ctx.clone(),
                        )
                    })
                };
                let composite = self.combiner.articulation(
                    score(sub_scores::PRONUNCIATION)?,
                    score(sub_scores::ACCURACY)?,
                    score(sub_scores::COMPLETENESS)?,
                )?;
                Ok(Scored { composite, keywords: None, metrics: None })
            }
            ModuleType::ExpressiveLanguage => {
                let matched = match_keywords(&result.transcription, keywords);
                let composite = self.combiner.expressive(ExpressiveInput {
                    matched_keywords: matched.matched.len(),
                    total_keywords: matched.total(),
                    word_count: word_count(&result.transcription),
                    min_words,
                })?;
                Ok(Scored { composite, keywords: Some(matched), metrics: None })
            }
            ModuleType::Fluency => {
                let wav_duration = inspect_wav(audio).ok().map(|info| info.duration_ms);
                let metrics = SpeechMetrics::from_assessment(result, wav_duration, self.pause_threshold_ms);
                // without a duration there is no rate to score
                let speaking_rate_wpm = metrics.speaking_rate_wpm.ok_or_else(|| {
                    TherapyError::assessment(
                        AssessmentFailure::ServiceUnavailable("provider returned no audio duration".to_string()),
                        ctx.clone(),
                    )
                })?;
                let composite = self.combiner.fluency(FluencyInput {
                    speaking_rate_wpm,
                    pause_count: metrics.pause_count,
                    disfluency_count: metrics.disfluency_count,
                })?;
                Ok(Scored { composite, keywords: None, metrics: Some(metrics) })
            }
            ModuleType::ReceptiveLanguage => Err(TherapyError::invalid_input(
                "receptive language items are answered, not recorded",
                ctx.clone(),
            )),
        }
    }

    pub async fn get_progress(&self, user_id: &str, module: &ModuleKey) -> Result<ProgressView> {
        let record = self.tracker.load(user_id, module).await?;
        let position = self.tracker.position_of(module, record.as_ref());
        let total_levels = self.catalog.total_levels(module.module_type);
        Ok(ProgressView::new(user_id, module.clone(), record, position, total_levels))
    }

    /// Every module the user has started
    pub async fn get_all_progress(&self, user_id: &str) -> Result<Vec<ProgressView>> {
        let records = self.tracker.list_progress(user_id).await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let module = record.module.clone();
                let position = self.tracker.position_of(&module, Some(&record));
                let total_levels = self.catalog.total_levels(module.module_type);
                ProgressView::new(user_id, module, Some(record), position, total_levels)
            })
            .collect())
    }

    pub async fn list_trials(&self, user_id: &str, query: &TrialQuery) -> Result<Vec<Trial>> {
        self.recorder.list_trials(user_id, query).await
    }

    /// Exercises of one level, inactive ones only when asked for
    pub fn exercises(&self, module: &ModuleKey, level: u32, include_inactive: bool) -> Result<Vec<ExerciseDefinition>> {
        let total_levels = self.catalog.total_levels(module.module_type);
        if level == 0 || level > total_levels {
            return Err(TherapyError::invalid_input(
                format!("level {level} is outside 1..={total_levels}"),
                ErrorContext::new("list_exercises").with_module(module.storage_key()),
            ));
        }
        Ok(self.catalog.exercises(module, level, include_inactive))
    }

    /// Cascading delete of all progress documents and trials of a user
    pub async fn delete_user_data(&self, user_id: &str) -> Result<DeletionSummary> {
        let progress_records = self.tracker.delete_user(user_id).await?;
        let trials = self.recorder.delete_user(user_id).await?;

        info!(user_id, progress_records, trials, "User therapy data deleted");
        Ok(DeletionSummary { progress_records, trials })
    }

    fn context(operation: &str, user_id: &str, module: &ModuleKey) -> ErrorContext {
        ErrorContext::new(operation)
            .with_user_id(user_id)
            .with_module(module.storage_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::store::{InMemoryProgressStore, InMemoryTrialLog};
    use async_trait::async_trait;
    use mockall::mock;
    use speech_assessment::{AssessmentResultOf, WordTiming};

    mock! {
        pub Provider {}

        #[async_trait]
        impl AssessmentProvider for Provider {
            async fn assess(&self, audio: &[u8], reference_text: &str) -> AssessmentResultOf<AssessmentResult>;
            fn name(&self) -> &'static str;
        }
    }

    struct Fixture {
        service: TherapyService,
        trials: Arc<InMemoryTrialLog>,
    }

    fn fixture(provider: MockProvider) -> Fixture {
        let trials = Arc::new(InMemoryTrialLog::new());
        let service = TherapyService::new(
            Arc::new(provider),
            Arc::new(InMemoryCatalog::default()),
            Arc::new(InMemoryProgressStore::new()),
            trials.clone(),
        );
        Fixture { service, trials }
    }

    fn provider_returning(result: AssessmentResultOf<AssessmentResult>) -> MockProvider {
        let mut provider = MockProvider::new();
        provider.expect_assess().returning(move |_, _| result.clone());
        provider.expect_name().return_const("mock");
        provider
    }

    fn articulation_result(pronunciation: f64, accuracy: f64, completeness: f64) -> AssessmentResult {
        AssessmentResult {
            sub_scores: BTreeMap::from([
                (sub_scores::PRONUNCIATION.to_string(), pronunciation),
                (sub_scores::ACCURACY.to_string(), accuracy),
                (sub_scores::COMPLETENESS.to_string(), completeness),
                (sub_scores::FLUENCY.to_string(), 1.0),
            ]),
            transcription: "sun".to_string(),
            words: Vec::new(),
            phonemes: Vec::new(),
            audio_duration_ms: Some(800),
            provider: "mock".to_string(),
        }
    }

    fn submission(module: ModuleKey, level: u32, item_index: u32) -> TrialSubmission {
        TrialSubmission {
            user_id: "patient-1".to_string(),
            module,
            level,
            item_index,
            audio: vec![1, 2, 3],
            reference_text: String::new(),
            expected_keywords: None,
            min_words: None,
        }
    }

    async fn trial_count(fixture: &Fixture) -> usize {
        fixture.trials.list_trials("patient-1", &TrialQuery::default()).await.unwrap().len()
    }

    #[tokio::test]
    async fn test_articulation_trial_is_scored_and_recorded() {
        let fixture = fixture(provider_returning(Ok(articulation_result(1.0, 0.8, 1.0))));

        let outcome = fixture
            .service
            .submit_trial(submission(ModuleKey::articulation("s"), 3, 0))
            .await
            .unwrap();

        assert!((outcome.composite_score - 0.94).abs() < 1e-9);
        assert_eq!(outcome.feedback, Feedback::Excellent);
        assert!(!outcome.fallback);
        // one trial is not enough for an articulation item
        assert!(!outcome.passed);
        assert_eq!(outcome.transcription, "sun");
        assert_eq!(outcome.next_position, Position::At { level: 1, item_index: 0 });
        assert_eq!(trial_count(&fixture).await, 1);
    }

    #[tokio::test]
    async fn test_not_configured_records_flagged_fallback() {
        let fixture = fixture(provider_returning(Err(AssessmentFailure::NotConfigured("no key".to_string()))));

        let outcome = fixture
            .service
            .submit_trial(submission(ModuleKey::fluency(), 1, 2))
            .await
            .unwrap();

        assert!(outcome.fallback);
        assert!((outcome.composite_score - FALLBACK_SCORE).abs() < f64::EPSILON);
        assert_eq!(outcome.transcription, "Welcome");
        assert!(outcome.sub_scores.is_empty());
        // fluency passes at 0.70, so the fallback completes the item
        assert!(outcome.passed);

        let trials = fixture.trials.list_trials("patient-1", &TrialQuery::default()).await.unwrap();
        assert!(trials[0].fallback);
    }

    #[tokio::test]
    async fn test_hard_failures_record_nothing() {
        for failure in [AssessmentFailure::NoSpeechDetected, AssessmentFailure::ServiceUnavailable("timeout".to_string())] {
            let fixture = fixture(provider_returning(Err(failure.clone())));

            let err = fixture
                .service
                .submit_trial(submission(ModuleKey::articulation("r"), 1, 0))
                .await
                .unwrap_err();

            assert!(matches!(err, TherapyError::Assessment { ref source, .. } if *source == failure));
            assert_eq!(trial_count(&fixture).await, 0);
            let view = fixture.service.get_progress("patient-1", &ModuleKey::articulation("r")).await.unwrap();
            assert!(view.levels.is_empty());
        }
    }

    #[tokio::test]
    async fn test_validation_happens_before_assessment() {
        let mut provider = MockProvider::new();
        provider.expect_assess().times(0);
        provider.expect_name().return_const("mock");
        let fixture = fixture(provider);

        let mut empty_audio = submission(ModuleKey::fluency(), 1, 0);
        empty_audio.audio.clear();
        let err = fixture.service.submit_trial(empty_audio).await.unwrap_err();
        assert!(matches!(err, TherapyError::InvalidInput { .. }));

        let err = fixture
            .service
            .submit_trial(submission(ModuleKey::fluency(), 9, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, TherapyError::InvalidInput { .. }));

        let err = fixture
            .service
            .submit_trial(submission(ModuleKey::receptive(), 1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, TherapyError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_missing_sub_score_is_service_error() {
        let mut result = articulation_result(0.9, 0.9, 0.9);
        result.sub_scores.remove(sub_scores::ACCURACY);
        let fixture = fixture(provider_returning(Ok(result)));

        let err = fixture
            .service
            .submit_trial(submission(ModuleKey::articulation("l"), 1, 0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("accuracy"));
        assert_eq!(trial_count(&fixture).await, 0);
    }

    #[tokio::test]
    async fn test_expressive_uses_catalog_keywords() {
        let mut result = articulation_result(0.9, 0.9, 0.9);
        result.transcription = "The boy is playing outside".to_string();
        let fixture = fixture(provider_returning(Ok(result)));

        let outcome = fixture
            .service
            .submit_trial(submission(ModuleKey::expressive(), 2, 0))
            .await
            .unwrap();

        let keywords = outcome.keywords.unwrap();
        assert_eq!(keywords.matched, vec!["boy", "playing"]);
        assert_eq!(keywords.missing, vec!["ball"]);
        // 0.7 * 2/3 + 0.3 * 1
        assert!((outcome.composite_score - (0.7 * 2.0 / 3.0 + 0.3)).abs() < 1e-9);
        assert!(outcome.passed);
    }

    #[tokio::test]
    async fn test_fluency_uses_word_timings() {
        let words = ["i", "like", "um", "hiking"]
            .iter()
            .zip([0u64, 400, 1_600, 2_000])
            .map(|(word, offset_ms)| WordTiming {
                word: (*word).to_string(),
                offset_ms,
                duration_ms: 300,
                accuracy: None,
            })
            .collect();
        let mut result = articulation_result(0.9, 0.9, 0.9);
        result.transcription = "I like um hiking".to_string();
        result.words = words;
        result.audio_duration_ms = Some(2_400);
        let fixture = fixture(provider_returning(Ok(result)));

        let outcome = fixture
            .service
            .submit_trial(submission(ModuleKey::fluency(), 1, 0))
            .await
            .unwrap();

        let metrics = outcome.metrics.unwrap();
        assert_eq!(metrics.pause_count, 1);
        assert_eq!(metrics.disfluency_count, 1);
        // 100 wpm is in the ideal band: 100 - 5 - 10
        assert!((outcome.composite_score - 0.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fluency_without_duration_is_not_scored() {
        let mut result = articulation_result(0.9, 0.9, 0.9);
        result.transcription = "I like hiking".to_string();
        result.audio_duration_ms = None;
        // not a WAV, so there is no header length to fall back on either
        let fixture = fixture(provider_returning(Ok(result)));

        let err = fixture
            .service
            .submit_trial(submission(ModuleKey::fluency(), 1, 0))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TherapyError::Assessment { source: AssessmentFailure::ServiceUnavailable(ref reason), .. }
                if reason.contains("duration")
        ));
        assert_eq!(trial_count(&fixture).await, 0);
        let view = fixture.service.get_progress("patient-1", &ModuleKey::fluency()).await.unwrap();
        assert!(view.levels.is_empty());
    }

    #[tokio::test]
    async fn test_receptive_answers() {
        let mut provider = MockProvider::new();
        provider.expect_assess().times(0);
        let fixture = fixture(provider);

        let outcome = fixture.service.submit_receptive_answer("patient-1", 1, 0, true).await.unwrap();
        assert_eq!(outcome.composite_score, 1.0);
        assert!(outcome.passed);
        assert_eq!(outcome.transcription, "apple");

        let outcome = fixture.service.submit_receptive_answer("patient-1", 1, 1, false).await.unwrap();
        assert_eq!(outcome.composite_score, 0.0);
        assert!(!outcome.passed);
        assert_eq!(outcome.next_position, Position::At { level: 1, item_index: 1 });
    }

    #[tokio::test]
    async fn test_delete_user_data_cascades() {
        let fixture = fixture(provider_returning(Err(AssessmentFailure::NotConfigured("no key".to_string()))));
        fixture.service.submit_trial(submission(ModuleKey::fluency(), 1, 0)).await.unwrap();
        fixture.service.submit_trial(submission(ModuleKey::articulation("s"), 1, 0)).await.unwrap();
        fixture.service.submit_receptive_answer("patient-1", 1, 0, true).await.unwrap();

        let summary = fixture.service.delete_user_data("patient-1").await.unwrap();
        assert_eq!(summary, DeletionSummary { progress_records: 3, trials: 3 });
        assert!(fixture.service.get_all_progress("patient-1").await.unwrap().is_empty());
        assert_eq!(trial_count(&fixture).await, 0);
    }
}
