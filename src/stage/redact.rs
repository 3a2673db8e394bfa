//! Redact stage - substitutes the inspected text with its redacted variant

use super::Stage;
use crate::config::FailurePolicy;
use crate::error::Result;
use crate::provider::Redactor;
use crate::types::{PipelineConfig, StageInput};
use async_trait::async_trait;
use std::sync::Arc;

/// Replaces the latest human message (or the reply) with redacted text
///
/// Only content is substituted; messages are never removed or reordered.
/// When the redactor reports no change the input is returned as-is.
pub struct RedactStage {
    redactor: Arc<dyn Redactor>,
    on_failure: FailurePolicy,
}

impl RedactStage {
    /// Redact stage that aborts when the redactor fails
    pub fn new(redactor: Arc<dyn Redactor>) -> Self {
        Self {
            redactor,
            on_failure: FailurePolicy::Closed,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }
}

#[async_trait]
impl Stage for RedactStage {
    fn name(&self) -> &str {
        "redact"
    }

    async fn invoke(&self, input: StageInput, _config: &PipelineConfig) -> Result<StageInput> {
        let Some(text) = input.inspected_text() else {
            return Ok(input);
        };

        let redaction = match self.redactor.redact(text).await {
            Ok(redaction) => redaction,
            Err(e) => match self.on_failure {
                FailurePolicy::Open => {
                    tracing::warn!(
                        redactor = %self.redactor.name(),
                        error = %e,
                        "Redaction failed, passing content through unredacted"
                    );
                    return Ok(input);
                }
                FailurePolicy::Closed => return Err(e),
            },
        };

        match redaction.changed_text() {
            Some(redacted) => {
                tracing::debug!(kind = %input.kind(), "Content redacted");
                let redacted = redacted.to_string();
                Ok(input.with_inspected_text(redacted))
            }
            None => Ok(input),
        }
    }
}
