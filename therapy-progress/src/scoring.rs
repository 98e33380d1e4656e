//! Composite score calculation
//!
//! Every module is reported on one canonical scale, `[0, 1]`. Inputs outside
//! that range are rejected rather than clamped.

use serde::{Deserialize, Serialize};

use crate::error::TherapyError;

pub const ARTICULATION_PRONUNCIATION_WEIGHT: f64 = 0.5;
pub const ARTICULATION_ACCURACY_WEIGHT: f64 = 0.3;
pub const ARTICULATION_COMPLETENESS_WEIGHT: f64 = 0.2;

pub const EXPRESSIVE_KEYWORD_WEIGHT: f64 = 0.7;
pub const EXPRESSIVE_LENGTH_WEIGHT: f64 = 0.3;

/// Score recorded when no assessment provider is configured
pub const FALLBACK_SCORE: f64 = 0.75;

const FLUENCY_SCALE: f64 = 100.0;

/// Constants of the fluency formula, all on the 0-100 scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluencyScoringConfig {
    pub ideal_min_wpm: f64,
    pub ideal_max_wpm: f64,
    pub ideal_center_wpm: f64,
    pub per_pause_penalty: f64,
    pub max_pause_penalty: f64,
    pub per_disfluency_penalty: f64,
    pub max_disfluency_penalty: f64,
}

impl Default for FluencyScoringConfig {
    fn default() -> Self {
        Self {
            ideal_min_wpm: 80.0,
            ideal_max_wpm: 180.0,
            ideal_center_wpm: 130.0,
            per_pause_penalty: 5.0,
            max_pause_penalty: 20.0,
            per_disfluency_penalty: 10.0,
            max_disfluency_penalty: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpressiveInput {
    pub matched_keywords: usize,
    pub total_keywords: usize,
    pub word_count: usize,
    pub min_words: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluencyInput {
    pub speaking_rate_wpm: f64,
    pub pause_count: u32,
    pub disfluency_count: u32,
}

/// Pure, I/O free composite scoring
#[derive(Debug, Clone, Default)]
pub struct ScoreCombiner {
    fluency: FluencyScoringConfig,
}

impl ScoreCombiner {
    pub fn new(fluency: FluencyScoringConfig) -> Self {
        Self { fluency }
    }

    pub fn fluency_config(&self) -> &FluencyScoringConfig {
        &self.fluency
    }

    pub fn articulation(&self, pronunciation: f64, accuracy: f64, completeness: f64) -> Result<f64, TherapyError> {
        let pronunciation = unit_score("pronunciation", pronunciation)?;
        let accuracy = unit_score("accuracy", accuracy)?;
        let completeness = unit_score("completeness", completeness)?;

        let composite = ARTICULATION_PRONUNCIATION_WEIGHT * pronunciation
            + ARTICULATION_ACCURACY_WEIGHT * accuracy
            + ARTICULATION_COMPLETENESS_WEIGHT * completeness;
        // float rounding can leave 1.0000000000000002
        Ok(composite.min(1.0))
    }

    /// Keyword coverage is 0 when no keywords are expected; a `min_words`
    /// of 0 makes the length factor 1.
    pub fn expressive(&self, input: ExpressiveInput) -> Result<f64, TherapyError> {
        let coverage = if input.total_keywords == 0 {
            0.0
        } else {
            ratio(input.matched_keywords, input.total_keywords)
        };
        let coverage = unit_score("keyword_coverage", coverage)?;

        let length_factor = if input.min_words == 0 {
            1.0
        } else {
            ratio(input.word_count, input.min_words as usize).min(1.0)
        };

        Ok((EXPRESSIVE_KEYWORD_WEIGHT * coverage + EXPRESSIVE_LENGTH_WEIGHT * length_factor).min(1.0))
    }

    pub fn fluency(&self, input: FluencyInput) -> Result<f64, TherapyError> {
        let rate = input.speaking_rate_wpm;
        if !rate.is_finite() || rate < 0.0 {
            return Err(TherapyError::InvalidScoreRange {
                name: "speaking_rate_wpm".to_string(),
                value: rate,
            });
        }

        let config = &self.fluency;
        let rate_score = if (config.ideal_min_wpm..=config.ideal_max_wpm).contains(&rate) {
            FLUENCY_SCALE
        } else {
            (FLUENCY_SCALE - (rate - config.ideal_center_wpm).abs()).max(0.0)
        };
        let pause_penalty = (f64::from(input.pause_count) * config.per_pause_penalty).min(config.max_pause_penalty);
        let disfluency_penalty =
            (f64::from(input.disfluency_count) * config.per_disfluency_penalty).min(config.max_disfluency_penalty);

        let raw = (rate_score - pause_penalty - disfluency_penalty).clamp(0.0, FLUENCY_SCALE);
        Ok(raw / FLUENCY_SCALE)
    }

    pub fn receptive(&self, correct: bool) -> f64 {
        if correct {
            1.0
        } else {
            0.0
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    numerator as f64 / denominator as f64
}

/// Rejects NaN and anything outside `[0, 1]`.
pub fn unit_score(name: &str, value: f64) -> Result<f64, TherapyError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(TherapyError::InvalidScoreRange {
            name: name.to_string(),
            value,
        })
    }
}

/// Patient-facing feedback band for a composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Excellent,
    Good,
    KeepPracticing,
    ListenAgain,
}

impl Feedback {
    pub fn for_score(score: f64) -> Self {
        if score >= 0.90 {
            Feedback::Excellent
        } else if score >= 0.75 {
            Feedback::Good
        } else if score >= 0.50 {
            Feedback::KeepPracticing
        } else {
            Feedback::ListenAgain
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Feedback::Excellent => "Excellent! Perfect pronunciation!",
            Feedback::Good => "Good job! Keep practicing!",
            Feedback::KeepPracticing => "Nice try! Try again!",
            Feedback::ListenAgain => "Keep trying! Listen to the model again.",
        }
    }
}
