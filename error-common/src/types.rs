use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse error classification shared by all crates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Authentication,
    Authorization,
    Assessment,
    Storage,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorCategory {
    /// Whether a caller may reasonably retry the same request unchanged.
    ///
    /// Nothing inside the engine retries on its own; this is a hint for clients.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Assessment | ErrorCategory::Storage)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Assessment => "assessment",
            ErrorCategory::Storage => "storage",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by domain error enums so the request layer can map them
/// without matching on every variant.
pub trait Categorized {
    fn category(&self) -> ErrorCategory;

    /// Stable code from [`crate::codes`]
    fn code(&self) -> &'static str;

    fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}
