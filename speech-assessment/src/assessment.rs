use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sub-score names shared by providers and the score combiner
pub mod sub_scores {
    pub const PRONUNCIATION: &str = "pronunciation";
    pub const ACCURACY: &str = "accuracy";
    pub const COMPLETENESS: &str = "completeness";
    pub const FLUENCY: &str = "fluency";
}

/// Outcome of one successful assessment call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    /// Named sub-scores, each in `[0, 1]`
    pub sub_scores: BTreeMap<String, f64>,
    pub transcription: String,
    pub words: Vec<WordTiming>,
    pub phonemes: Vec<PhonemeScore>,
    /// Length of the recognised speech segment, when the provider reports it
    pub audio_duration_ms: Option<u64>,
    pub provider: String,
}

impl AssessmentResult {
    pub fn sub_score(&self, name: &str) -> Option<f64> {
        self.sub_scores.get(name).copied()
    }
}

/// Timing of a recognised word, relative to the start of the recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub offset_ms: u64,
    pub duration_ms: u64,
    pub accuracy: Option<f64>,
}

impl WordTiming {
    pub fn end_ms(&self) -> u64 {
        self.offset_ms.saturating_add(self.duration_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeScore {
    pub phoneme: String,
    pub score: f64,
}
