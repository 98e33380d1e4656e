use error_common::{codes, Categorized, ErrorCategory, ErrorContext};
use speech_assessment::AssessmentFailure;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum TherapyError {
    #[error("Invalid input: {message} [{context}]")]
    InvalidInput { message: String, context: ErrorContext },

    #[error("Score '{name}' is outside [0, 1]: {value}")]
    InvalidScoreRange { name: String, value: f64 },

    #[error("Assessment failed: {source} [{context}]")]
    Assessment {
        #[source]
        source: AssessmentFailure,
        context: ErrorContext,
    },

    #[error("Storage unavailable: {message} [{context}]")]
    StorageUnavailable { message: String, context: ErrorContext },

    #[error("{resource} '{id}' not found [{context}]")]
    NotFound {
        resource: &'static str,
        id: String,
        context: ErrorContext,
    },

    #[error("Already exists: {message} [{context}]")]
    AlreadyExists { message: String, context: ErrorContext },
}

pub type Result<T> = std::result::Result<T, TherapyError>;

impl TherapyError {
    pub fn invalid_input(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::InvalidInput {
            message: message.into(),
            context,
        }
    }

    pub fn assessment(source: AssessmentFailure, context: ErrorContext) -> Self {
        Self::Assessment { source, context }
    }

    pub fn storage(err: StoreError, context: ErrorContext) -> Self {
        Self::StorageUnavailable {
            message: err.to_string(),
            context,
        }
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>, context: ErrorContext) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
            context,
        }
    }

    pub fn already_exists(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::AlreadyExists {
            message: message.into(),
            context,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::InvalidInput { context, .. }
            | Self::Assessment { context, .. }
            | Self::StorageUnavailable { context, .. }
            | Self::NotFound { context, .. }
            | Self::AlreadyExists { context, .. } => Some(context),
            Self::InvalidScoreRange { .. } => None,
        }
    }
}

impl Categorized for TherapyError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput { .. } | Self::InvalidScoreRange { .. } => ErrorCategory::Validation,
            Self::Assessment { source, .. } => match source {
                AssessmentFailure::InvalidAudio(_) => ErrorCategory::Validation,
                _ => ErrorCategory::Assessment,
            },
            Self::StorageUnavailable { .. } => ErrorCategory::Storage,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => codes::validation::INVALID_INPUT,
            Self::InvalidScoreRange { .. } => codes::validation::INVALID_SCORE_RANGE,
            Self::Assessment { source, .. } => match source {
                AssessmentFailure::NoSpeechDetected => codes::assessment::NO_SPEECH_DETECTED,
                AssessmentFailure::ServiceUnavailable(_) => codes::assessment::SERVICE_UNAVAILABLE,
                AssessmentFailure::NotConfigured(_) => codes::assessment::NOT_CONFIGURED,
                AssessmentFailure::InvalidAudio(_) => codes::assessment::INVALID_AUDIO,
            },
            Self::StorageUnavailable { .. } => codes::storage::UNAVAILABLE,
            Self::NotFound { .. } => codes::resource::NOT_FOUND,
            Self::AlreadyExists { .. } => codes::resource::ALREADY_EXISTS,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Assessment { source, .. } => source.is_retryable(),
            other => other.category().is_retryable(),
        }
    }
}
