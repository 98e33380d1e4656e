pub mod azure;
pub mod unconfigured;

use async_trait::async_trait;
use crate::assessment::AssessmentResult;
use crate::config::{AssessmentConfig, ProviderConfig};
use crate::error::AssessmentResultOf;

/// Trait for pronunciation/fluency assessment providers
#[async_trait]
pub trait AssessmentProvider: Send + Sync {
    /// Score a recording against the text the patient was asked to say.
    ///
    /// Provider timeouts surface as `ServiceUnavailable`.
    async fn assess(&self, audio: &[u8], reference_text: &str) -> AssessmentResultOf<AssessmentResult>;

    /// Short stable name for logs and health output
    fn name(&self) -> &'static str;
}

/// Create a provider instance based on configuration
pub fn create_provider(config: &AssessmentConfig) -> AssessmentResultOf<Box<dyn AssessmentProvider>> {
    match &config.provider {
        ProviderConfig::Azure { .. } => Ok(Box::new(azure::AzurePronunciationProvider::new(config)?)),
        ProviderConfig::Unconfigured { reason } => {
            tracing::warn!(reason = %reason, "Speech assessment not configured; trials will use fallback scoring");
            Ok(Box::new(unconfigured::UnconfiguredProvider::new(reason.clone())))
        }
    }
}
