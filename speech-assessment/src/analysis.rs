//! Transcript and timing analysis
//!
//! Turns an [`AssessmentResult`] into the counts the fluency and expressive
//! language scores are built from: words, speaking rate, pauses, disfluencies
//! and keyword coverage.

use serde::{Deserialize, Serialize};
use crate::assessment::{AssessmentResult, WordTiming};

/// Hesitation sounds counted as disfluencies
pub const FILLER_WORDS: &[&str] = &["um", "umm", "uh", "uhh", "uhm", "er", "erm", "ah", "hmm", "mm"];

/// Lowercase words with surrounding punctuation removed; inner apostrophes
/// and hyphens are kept ("don't", "well-known").
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|raw| {
            raw.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

pub fn word_count(text: &str) -> usize {
    tokenize(text).len()
}

/// Words per minute; `None` when the duration is unknown or zero.
pub fn speaking_rate_wpm(words: usize, duration_ms: u64) -> Option<f64> {
    if duration_ms == 0 {
        return None;
    }
    Some(words as f64 * 60_000.0 / duration_ms as f64)
}

/// Gaps between consecutive words of at least `threshold_ms`.
pub fn count_pauses(words: &[WordTiming], threshold_ms: u64) -> u32 {
    let pauses = words
        .windows(2)
        .filter(|pair| match pair {
            [prev, next] => next.offset_ms.saturating_sub(prev.end_ms()) >= threshold_ms,
            _ => false,
        })
        .count();
    u32::try_from(pauses).unwrap_or(u32::MAX)
}

/// Filler words plus immediate repetitions ("I I want", "the the").
pub fn count_disfluencies(text: &str) -> u32 {
    let tokens = tokenize(text);
    let fillers = tokens
        .iter()
        .filter(|token| FILLER_WORDS.contains(&token.as_str()))
        .count();
    let repetitions = tokens
        .windows(2)
        .filter(|pair| match pair {
            [a, b] => a == b && !FILLER_WORDS.contains(&a.as_str()),
            _ => false,
        })
        .count();
    u32::try_from(fillers + repetitions).unwrap_or(u32::MAX)
}

/// Which expected keywords appear in a transcript
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
}

impl KeywordMatch {
    pub fn total(&self) -> usize {
        self.matched.len() + self.missing.len()
    }
}

/// Case and punctuation insensitive. Multi-word keywords must appear as a
/// contiguous run of words.
pub fn match_keywords(transcript: &str, keywords: &[String]) -> KeywordMatch {
    let tokens = tokenize(transcript);
    let mut result = KeywordMatch::default();

    for keyword in keywords {
        let needle = tokenize(keyword);
        if needle.is_empty() {
            continue;
        }
        let found = tokens.windows(needle.len()).any(|window| window == needle.as_slice());
        if found {
            result.matched.push(keyword.clone());
        } else {
            result.missing.push(keyword.clone());
        }
    }

    result
}

/// Everything the fluency score needs, derived from one assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechMetrics {
    pub word_count: usize,
    pub duration_ms: Option<u64>,
    pub speaking_rate_wpm: Option<f64>,
    pub pause_count: u32,
    pub disfluency_count: u32,
}

impl SpeechMetrics {
    /// `fallback_duration_ms` is used when the provider did not report one
    /// (typically the WAV header length).
    pub fn from_assessment(result: &AssessmentResult, fallback_duration_ms: Option<u64>, pause_threshold_ms: u64) -> Self {
        let word_count = if result.words.is_empty() {
            word_count(&result.transcription)
        } else {
            result.words.len()
        };
        let duration_ms = result.audio_duration_ms.or(fallback_duration_ms);

        Self {
            word_count,
            duration_ms,
            speaking_rate_wpm: duration_ms.and_then(|ms| speaking_rate_wpm(word_count, ms)),
            pause_count: count_pauses(&result.words, pause_threshold_ms),
            disfluency_count: count_disfluencies(&result.transcription),
        }
    }
}
