use thiserror::Error;

/// Why an assessment produced no scores
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssessmentFailure {
    /// The provider heard nothing it could match against the reference text
    #[error("No speech detected in recording")]
    NoSpeechDetected,

    /// Transport failure, timeout, throttling or an unreadable provider response.
    /// Retryable by the caller.
    #[error("Assessment service unavailable: {0}")]
    ServiceUnavailable(String),

    /// No provider credentials are configured
    #[error("Assessment provider not configured: {0}")]
    NotConfigured(String),

    /// The upload is not audio the provider accepts
    #[error("Invalid audio: {0}")]
    InvalidAudio(String),
}

impl AssessmentFailure {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AssessmentFailure::ServiceUnavailable(_))
    }
}

impl From<reqwest::Error> for AssessmentFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AssessmentFailure::ServiceUnavailable("request timed out".to_string())
        } else if err.is_decode() {
            AssessmentFailure::ServiceUnavailable(format!("unreadable response: {err}"))
        } else {
            AssessmentFailure::ServiceUnavailable(err.without_url().to_string())
        }
    }
}

pub type AssessmentResultOf<T> = Result<T, AssessmentFailure>;
