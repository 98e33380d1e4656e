//! Common error handling utilities for SpeechCare Engine
//!
//! Every crate in the workspace defines its own `thiserror` enum; this crate
//! provides the pieces they share so errors look the same at the edges:
//!
//! - **ErrorContext**: who/what/where an error happened (user, module, operation)
//! - **ErrorCategory**: coarse classification used for HTTP mapping and retry hints
//! - **Error codes**: stable string codes returned to API clients
//! - **Sanitization**: scrubbing credentials and payload blobs out of messages
//!
//! # Example
//!
//! ```rust
//! use error_common::{ErrorContext, ErrorCategory, codes};
//!
//! let ctx = ErrorContext::new("submit_trial")
//!     .with_user_id("patient-42")
//!     .with_module("articulation/s");
//!
//! assert_eq!(ctx.operation, "submit_trial");
//! assert!(ErrorCategory::Storage.is_retryable());
//! assert_eq!(codes::storage::UNAVAILABLE, "STORAGE_4001");
//! ```

pub mod codes;
pub mod context;
pub mod sanitization;
pub mod types;

pub use context::*;
pub use sanitization::*;
pub use types::*;
