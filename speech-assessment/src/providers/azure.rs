//! Azure Speech pronunciation assessment provider
//!
//! Uses the short-audio REST endpoint with the `Pronunciation-Assessment`
//! header (HundredMark grading, phoneme granularity, miscue detection).
//! Azure reports scores on 0-100 and times in 100ns ticks; both are converted
//! here.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use crate::assessment::{sub_scores, AssessmentResult, PhonemeScore, WordTiming};
use crate::audio::inspect_wav;
use crate::config::{AssessmentConfig, ProviderConfig};
use crate::error::{AssessmentFailure, AssessmentResultOf};
use crate::providers::AssessmentProvider;

const TICKS_PER_MS: u64 = 10_000;

pub struct AzurePronunciationProvider {
    client: reqwest::Client,
    endpoint: String,
    subscription_key: Secret<String>,
}

impl AzurePronunciationProvider {
    pub fn new(config: &AssessmentConfig) -> AssessmentResultOf<Self> {
        let ProviderConfig::Azure { region, subscription_key, endpoint } = &config.provider else {
            return Err(AssessmentFailure::NotConfigured("Azure provider requires Azure configuration".to_string()));
        };

        let base = endpoint.clone().unwrap_or_else(|| {
            format!("https://{region}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1")
        });
        let endpoint = format!("{base}?language={}&format=detailed", config.language);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AssessmentFailure::NotConfigured(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            subscription_key: subscription_key.clone(),
        })
    }

    fn assessment_header(reference_text: &str) -> AssessmentResultOf<String> {
        let params = serde_json::json!({
            "ReferenceText": reference_text,
            "GradingSystem": "HundredMark",
            "Granularity": "Phoneme",
            "Dimension": "Comprehensive",
            "EnableMiscue": true,
        });
        let json = serde_json::to_vec(&params)
            .map_err(|e| AssessmentFailure::ServiceUnavailable(format!("could not encode request: {e}")))?;
        Ok(general_purpose::STANDARD.encode(json))
    }
}

#[async_trait]
impl AssessmentProvider for AzurePronunciationProvider {
    async fn assess(&self, audio: &[u8], reference_text: &str) -> AssessmentResultOf<AssessmentResult> {
        let wav = inspect_wav(audio)?;
        tracing::debug!(
            audio_bytes = audio.len(),
            sample_rate = wav.sample_rate,
            duration_ms = wav.duration_ms,
            "Sending recording to Azure pronunciation assessment"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", self.subscription_key.expose_secret())
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("audio/wav; codecs=audio/pcm; samplerate={}", wav.sample_rate),
            )
            .header(reqwest::header::ACCEPT, "application/json")
            .header("Pronunciation-Assessment", Self::assessment_header(reference_text)?)
            .body(audio.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_http_status(status));
        }

        let body: RecognitionResponse = response.json().await?;
        let mut result = parse_recognition(body)?;
        if result.audio_duration_ms.is_none() {
            result.audio_duration_ms = Some(wav.duration_ms);
        }
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "azure"
    }
}

fn map_http_status(status: StatusCode) -> AssessmentFailure {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNSUPPORTED_MEDIA_TYPE => {
            AssessmentFailure::InvalidAudio(format!("provider rejected audio ({status})"))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AssessmentFailure::ServiceUnavailable(format!("provider rejected credentials ({status})"))
        }
        _ => AssessmentFailure::ServiceUnavailable(format!("provider returned {status}")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecognitionResponse {
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
    #[serde(default)]
    duration: Option<u64>,
    #[serde(default, rename = "NBest")]
    n_best: Vec<NBestEntry>,
}

/// Older API versions put scores directly on the entry, newer ones nest them
/// under `PronunciationAssessment`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScoreBlock {
    accuracy_score: Option<f64>,
    fluency_score: Option<f64>,
    completeness_score: Option<f64>,
    pron_score: Option<f64>,
}

impl ScoreBlock {
    fn or(self, other: ScoreBlock) -> ScoreBlock {
        ScoreBlock {
            accuracy_score: self.accuracy_score.or(other.accuracy_score),
            fluency_score: self.fluency_score.or(other.fluency_score),
            completeness_score: self.completeness_score.or(other.completeness_score),
            pron_score: self.pron_score.or(other.pron_score),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NBestEntry {
    #[serde(default)]
    display: Option<String>,
    #[serde(default)]
    lexical: Option<String>,
    #[serde(default)]
    pronunciation_assessment: Option<ScoreBlock>,
    #[serde(flatten)]
    scores: ScoreBlock,
    #[serde(default)]
    words: Vec<WordEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WordEntry {
    word: String,
    #[serde(default)]
    offset: u64,
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    accuracy_score: Option<f64>,
    #[serde(default)]
    pronunciation_assessment: Option<WordAssessment>,
    #[serde(default)]
    phonemes: Vec<PhonemeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WordAssessment {
    accuracy_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PhonemeEntry {
    phoneme: String,
    #[serde(default)]
    accuracy_score: Option<f64>,
    #[serde(default)]
    pronunciation_assessment: Option<WordAssessment>,
}

fn parse_recognition(body: RecognitionResponse) -> AssessmentResultOf<AssessmentResult> {
    match body.recognition_status.as_str() {
        "Success" => {}
        "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => return Err(AssessmentFailure::NoSpeechDetected),
        other => {
            return Err(AssessmentFailure::ServiceUnavailable(format!("recognition status {other}")));
        }
    }

    let Some(best) = body.n_best.into_iter().next() else {
        return Err(AssessmentFailure::NoSpeechDetected);
    };

    let scores = best.pronunciation_assessment.unwrap_or_default().or(best.scores);
    let mut sub_scores = BTreeMap::new();
    for (name, value) in [
        (sub_scores::ACCURACY, scores.accuracy_score),
        (sub_scores::PRONUNCIATION, scores.pron_score),
        (sub_scores::COMPLETENESS, scores.completeness_score),
        (sub_scores::FLUENCY, scores.fluency_score),
    ] {
        let Some(value) = value else {
            return Err(AssessmentFailure::ServiceUnavailable(format!("response missing {name} score")));
        };
        sub_scores.insert(name.to_string(), value / 100.0);
    }

    let mut phonemes = Vec::new();
    let words = best
        .words
        .into_iter()
        .map(|word| {
            phonemes.extend(word.phonemes.into_iter().filter_map(|p| {
                let score = p.pronunciation_assessment.and_then(|a| a.accuracy_score).or(p.accuracy_score)?;
                Some(PhonemeScore { phoneme: p.phoneme, score: score / 100.0 })
            }));
            WordTiming {
                word: word.word,
                offset_ms: word.offset / TICKS_PER_MS,
                duration_ms: word.duration / TICKS_PER_MS,
                accuracy: word
                    .pronunciation_assessment
                    .and_then(|a| a.accuracy_score)
                    .or(word.accuracy_score)
                    .map(|s| s / 100.0),
            }
        })
        .collect();

    let transcription = best
        .display
        .or(body.display_text)
        .or(best.lexical)
        .unwrap_or_default();

    Ok(AssessmentResult {
        sub_scores,
        transcription,
        words,
        phonemes,
        audio_duration_ms: body.duration.map(|ticks| ticks / TICKS_PER_MS),
        provider: "azure".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> AssessmentResultOf<AssessmentResult> {
        parse_recognition(serde_json::from_value(json).unwrap())
    }

    #[test]
    fn test_parses_flat_scores() {
        let result = parse(serde_json::json!({
            "RecognitionStatus": "Success",
            "DisplayText": "See the sun.",
            "Duration": 15_000_000u64,
            "NBest": [{
                "Display": "See the sun.",
                "AccuracyScore": 90.0,
                "FluencyScore": 80.0,
                "CompletenessScore": 100.0,
                "PronScore": 88.0,
                "Words": [
                    {"Word": "see", "Offset": 1_000_000u64, "Duration": 3_000_000u64, "AccuracyScore": 95.0,
                     "Phonemes": [{"Phoneme": "s", "AccuracyScore": 70.0}]},
                    {"Word": "the", "Offset": 5_000_000u64, "Duration": 2_000_000u64, "AccuracyScore": 85.0}
                ]
            }]
        }))
        .unwrap();

        assert_eq!(result.transcription, "See the sun.");
        assert_eq!(result.sub_score(sub_scores::PRONUNCIATION), Some(0.88));
        assert_eq!(result.sub_score(sub_scores::COMPLETENESS), Some(1.0));
        assert_eq!(result.audio_duration_ms, Some(1_500));
        assert_eq!(result.words.len(), 2);
        assert_eq!(result.words[0].offset_ms, 100);
        assert_eq!(result.words[0].end_ms(), 400);
        assert_eq!(result.phonemes, vec![PhonemeScore { phoneme: "s".to_string(), score: 0.7 }]);
    }

    #[test]
    fn test_parses_nested_scores() {
        let result = parse(serde_json::json!({
            "RecognitionStatus": "Success",
            "NBest": [{
                "Lexical": "hiss",
                "PronunciationAssessment": {
                    "AccuracyScore": 60.0, "FluencyScore": 50.0, "CompletenessScore": 100.0, "PronScore": 65.0
                },
                "Words": [{"Word": "hiss", "PronunciationAssessment": {"AccuracyScore": 60.0}}]
            }]
        }))
        .unwrap();

        assert_eq!(result.transcription, "hiss");
        assert_eq!(result.sub_score(sub_scores::ACCURACY), Some(0.6));
        assert_eq!(result.words[0].accuracy, Some(0.6));
        assert_eq!(result.audio_duration_ms, None);
    }

    #[test]
    fn test_no_match_is_no_speech() {
        let err = parse(serde_json::json!({"RecognitionStatus": "InitialSilenceTimeout"})).unwrap_err();
        assert_eq!(err, AssessmentFailure::NoSpeechDetected);
    }

    #[test]
    fn test_missing_scores_is_unavailable() {
        let err = parse(serde_json::json!({
            "RecognitionStatus": "Success",
            "NBest": [{"Display": "hi"}]
        }))
        .unwrap_err();
        assert!(matches!(err, AssessmentFailure::ServiceUnavailable(_)));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(map_http_status(StatusCode::BAD_REQUEST), AssessmentFailure::InvalidAudio(_)));
        assert!(map_http_status(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(map_http_status(StatusCode::UNAUTHORIZED).is_retryable());
    }

    #[test]
    fn test_new_builds_regional_endpoint() {
        let config = AssessmentConfig {
            provider: ProviderConfig::Azure {
                region: "westeurope".to_string(),
                subscription_key: Secret::new("k".to_string()),
                endpoint: None,
            },
            language: "en-GB".to_string(),
            timeout_secs: 5,
            pause_threshold_ms: 500,
        };
        let provider = AzurePronunciationProvider::new(&config).unwrap();
        assert!(provider.endpoint.starts_with("https://westeurope.stt.speech.microsoft.com/"));
        assert!(provider.endpoint.ends_with("?language=en-GB&format=detailed"));
    }
}
