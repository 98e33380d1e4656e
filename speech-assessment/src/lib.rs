//! Speech Assessment Service for SpeechCare Engine
//!
//! Scores a patient's recorded attempt at a therapy prompt. The engine never
//! looks at audio itself; it hands the bytes and the reference text to an
//! [`AssessmentProvider`] and gets back normalized sub-scores, a transcription
//! and word timings.
//!
//! # Providers
//!
//! - **Azure Speech** pronunciation assessment (REST, short audio). Returns
//!   accuracy, pronunciation, completeness and fluency scores plus phoneme detail.
//! - **Unconfigured**: selected when no key is present. Every call fails with
//!   [`AssessmentFailure::NotConfigured`], which callers turn into an explicitly
//!   flagged fallback score.
//!
//! # Scales
//!
//! Providers normalize every sub-score to `[0, 1]` before returning.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use speech_assessment::{create_provider, AssessmentConfig};
//!
//! # async fn example(audio: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AssessmentConfig::from_env()?;
//! let provider = create_provider(&config)?;
//!
//! let result = provider.assess(&audio, "She sells sea shells.").await?;
//! println!("Heard: {} ({:?})", result.transcription, result.sub_scores);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod assessment;
pub mod audio;
pub mod config;
pub mod error;
pub mod providers;

pub use analysis::*;
pub use assessment::*;
pub use audio::*;
pub use config::*;
pub use error::*;
pub use providers::{create_provider, AssessmentProvider};
