use async_trait::async_trait;
use crate::assessment::AssessmentResult;
use crate::error::{AssessmentFailure, AssessmentResultOf};
use crate::providers::AssessmentProvider;

/// Stand-in used when no provider credentials exist
pub struct UnconfiguredProvider {
    reason: String,
}

impl UnconfiguredProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl AssessmentProvider for UnconfiguredProvider {
    async fn assess(&self, _audio: &[u8], _reference_text: &str) -> AssessmentResultOf<AssessmentResult> {
        Err(AssessmentFailure::NotConfigured(self.reason.clone()))
    }

    fn name(&self) -> &'static str {
        "unconfigured"
    }
}
