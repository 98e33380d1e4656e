//! Tracing setup with automatic redaction for SpeechCare Engine
//!
//! Therapy sessions produce patient-identifying text (names in transcriptions,
//! emails in profile payloads) and the request layer handles bearer tokens and
//! provider keys. Every formatted log line passes through [`PiiRedactor`]
//! before it reaches stdout, so a stray `debug!` cannot leak them.
//!
//! # Detected Data
//!
//! - **Email addresses**: `jane@example.com` → `EMAIL[hash]` or `j***@e***`
//! - **Phone numbers**: `(555) 123-4567` → `PHONE[hash]` or `(***) ***-****`
//! - **IP addresses**: `192.168.1.10` → `IP[hash]` or `192.***.***.10`
//! - **Credentials**: bearer tokens, `api_key=...`, encoded blobs (via `error-common`)
//!
//! # Example
//!
//! ```rust,no_run
//! use logger_redacted::{init_tracing, LoggerConfig};
//!
//! let config = LoggerConfig::from_env();
//! init_tracing(&config).expect("tracing already initialised");
//!
//! tracing::info!(user_id = "patient-7", "Progress loaded");
//! ```

pub mod config;
pub mod redactor;
pub mod subscriber;

pub use config::*;
pub use redactor::*;
pub use subscriber::*;
