use secrecy::{ExposeSecret, Secret};
use crate::error::{AssessmentFailure, AssessmentResultOf};

/// Placeholder shipped in sample `.env` files; treated as "no key".
pub const PLACEHOLDER_KEY: &str = "YOUR_AZURE_SPEECH_KEY_HERE";

/// Provider-specific configuration
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    /// Azure Speech pronunciation assessment
    Azure {
        region: String,
        subscription_key: Secret<String>,
        /// Overrides the regional endpoint (sovereign clouds, test doubles)
        endpoint: Option<String>,
    },
    /// No credentials; assessments fail with `NotConfigured`
    Unconfigured { reason: String },
}

impl ProviderConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::Azure { .. } => "azure",
            ProviderConfig::Unconfigured { .. } => "unconfigured",
        }
    }
}

/// Assessment service configuration
#[derive(Debug, Clone)]
pub struct AssessmentConfig {
    pub provider: ProviderConfig,
    /// BCP-47 locale sent to the provider
    pub language: String,
    pub timeout_secs: u64,
    /// Gap between consecutive words that counts as a pause
    pub pause_threshold_ms: u64,
}

impl AssessmentConfig {
    /// Load configuration from environment variables
    ///
    /// `ASSESSMENT_PROVIDER` selects `azure` (default) or `none`. Azure without
    /// `AZURE_SPEECH_KEY`, or with the placeholder key, degrades to the
    /// unconfigured provider instead of failing startup.
    pub fn from_env() -> AssessmentResultOf<Self> {
        let language = std::env::var("ASSESSMENT_LANGUAGE").unwrap_or_else(|_| "en-US".to_string());

        let timeout_secs = std::env::var("ASSESSMENT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let pause_threshold_ms = std::env::var("ASSESSMENT_PAUSE_THRESHOLD_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(500);

        let provider_type = std::env::var("ASSESSMENT_PROVIDER").unwrap_or_else(|_| "azure".to_string());
        let provider = match provider_type.to_lowercase().as_str() {
            "azure" => Self::azure_from_env(),
            "none" | "disabled" => ProviderConfig::Unconfigured {
                reason: "assessment disabled by ASSESSMENT_PROVIDER".to_string(),
            },
            _ => {
                return Err(AssessmentFailure::NotConfigured(format!(
                    "Unknown assessment provider: {provider_type}"
                )))
            }
        };

        Ok(Self {
            provider,
            language,
            timeout_secs,
            pause_threshold_ms,
        })
    }

    fn azure_from_env() -> ProviderConfig {
        let key = std::env::var("AZURE_SPEECH_KEY").unwrap_or_default();
        if key.trim().is_empty() || key == PLACEHOLDER_KEY {
            return ProviderConfig::Unconfigured {
                reason: "AZURE_SPEECH_KEY is not set".to_string(),
            };
        }

        ProviderConfig::Azure {
            region: std::env::var("AZURE_SPEECH_REGION").unwrap_or_else(|_| "eastus".to_string()),
            subscription_key: Secret::new(key),
            endpoint: std::env::var("AZURE_SPEECH_ENDPOINT").ok(),
        }
    }

    /// Config for tests and tools that must never reach a provider
    pub fn unconfigured(reason: impl Into<String>) -> Self {
        Self {
            provider: ProviderConfig::Unconfigured { reason: reason.into() },
            language: "en-US".to_string(),
            timeout_secs: 30,
            pause_threshold_ms: 500,
        }
    }

    pub fn is_configured(&self) -> bool {
        match &self.provider {
            ProviderConfig::Azure { subscription_key, .. } => !subscription_key.expose_secret().is_empty(),
            ProviderConfig::Unconfigured { .. } => false,
        }
    }
}
