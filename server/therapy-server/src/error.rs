use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use error_common::{codes, Categorized, DataSanitizer, ErrorCategory};
use serde::{Deserialize, Serialize};
use speech_assessment::AssessmentFailure;
use std::collections::HashMap;
use therapy_progress::TherapyError;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Standard API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Error type, e.g. `validation_error`
    pub error_type: String,
    /// Stable code from `error_common::codes`
    pub code: String,
    /// Human-readable error message, sanitized
    pub message: String,
    /// Field-specific validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<HashMap<String, Vec<String>>>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Whether repeating the same request may succeed
    pub retryable: bool,
}

/// Standard API success response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, Vec<String>>>,
    },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Authorization error: {message}")]
    Authorization { message: String },

    #[error("Resource not found: {resource_type}")]
    NotFound { resource_type: String },

    #[error("Payload too large: {message}")]
    PayloadTooLarge { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error(transparent)]
    Therapy(#[from] TherapyError),
}

impl ApiError {
    pub fn validation_with_fields(message: impl Into<String>, field_errors: HashMap<String, Vec<String>>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn not_found(resource_type: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Authorization { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Therapy(err) => match err {
                TherapyError::Assessment {
                    source: AssessmentFailure::NoSpeechDetected,
                    ..
                } => StatusCode::UNPROCESSABLE_ENTITY,
                other => match other.category() {
                    ErrorCategory::Validation => StatusCode::BAD_REQUEST,
                    ErrorCategory::Assessment | ErrorCategory::Storage => StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCategory::Authentication => StatusCode::UNAUTHORIZED,
                    ErrorCategory::Authorization => StatusCode::FORBIDDEN,
                    ErrorCategory::NotFound => StatusCode::NOT_FOUND,
                    ErrorCategory::Conflict => StatusCode::CONFLICT,
                    ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                },
            },
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "validation_error",
            ApiError::Authentication { .. } => "authentication_error",
            ApiError::Authorization { .. } => "authorization_error",
            ApiError::NotFound { .. } => "not_found",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::Internal { .. } => "internal_error",
            ApiError::Therapy(err) => match err {
                TherapyError::InvalidInput { .. } | TherapyError::InvalidScoreRange { .. } => "validation_error",
                TherapyError::Assessment { source, .. } => match source {
                    AssessmentFailure::NoSpeechDetected => "no_speech_detected",
                    AssessmentFailure::InvalidAudio(_) => "invalid_audio",
                    AssessmentFailure::ServiceUnavailable(_) | AssessmentFailure::NotConfigured(_) => {
                        "assessment_unavailable"
                    }
                },
                TherapyError::StorageUnavailable { .. } => "storage_unavailable",
                TherapyError::NotFound { .. } => "not_found",
                TherapyError::AlreadyExists { .. } => "conflict",
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } | ApiError::PayloadTooLarge { .. } => codes::validation::INVALID_INPUT,
            ApiError::Authentication { .. } => codes::authentication::INVALID_TOKEN,
            ApiError::Authorization { .. } => codes::authorization::ACCESS_DENIED,
            ApiError::NotFound { .. } => codes::resource::NOT_FOUND,
            ApiError::Internal { .. } => codes::internal::INTERNAL_ERROR,
            ApiError::Therapy(err) => err.code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Therapy(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Message safe to return to the caller.
    ///
    /// Storage failures and internal errors do not echo backend details.
    fn public_message(&self) -> String {
        match self {
            ApiError::Internal { .. } => "Internal server error".to_string(),
            ApiError::Therapy(err) => match err {
                TherapyError::InvalidInput { message, .. } => message.clone(),
                TherapyError::InvalidScoreRange { .. } => err.to_string(),
                TherapyError::Assessment { source, .. } => source.to_string(),
                TherapyError::StorageUnavailable { .. } => {
                    "Storage is temporarily unavailable".to_string()
                }
                TherapyError::NotFound { resource, id, .. } => format!("{resource} '{id}' not found"),
                TherapyError::AlreadyExists { message, .. } => format!("Already exists: {message}"),
            },
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();
        let sanitizer = DataSanitizer::new();
        let detail = sanitizer.sanitize_for_logging(&self.to_string());

        if status_code.is_server_error() {
            error!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %detail,
                "API error occurred"
            );
        } else {
            warn!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %detail,
                "Request rejected"
            );
        }

        let field_errors = match &self {
            ApiError::Validation { field_errors, .. } => field_errors.clone(),
            _ => None,
        };

        let error_response = ApiErrorResponse {
            error_id,
            error_type: self.error_type().to_string(),
            code: self.code().to_string(),
            message: sanitizer.sanitize_for_logging(&self.public_message()),
            field_errors,
            timestamp: chrono::Utc::now(),
            retryable: self.is_retryable(),
        };

        (status_code, Json(error_response)).into_response()
    }
}

/// Convert derive-validator failures into a field map
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors: HashMap<String, Vec<String>> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map_or_else(|| e.code.to_string(), ToString::to_string)
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();

        ApiError::validation_with_fields("Request validation failed", field_errors)
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge {
                message: "audio upload exceeds the size limit".to_string(),
            }
        } else {
            ApiError::validation(format!("Malformed multipart body: {}", error.body_text()))
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::validation(format!("Invalid JSON: {error}"))
    }
}

/// Helper function to create success responses
pub fn api_success<T>(data: T) -> ApiResponse<T> {
    ApiResponse { success: true, data }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
