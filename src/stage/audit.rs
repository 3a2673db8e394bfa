//! Audit stage - observational only, never rewrites content

use super::Stage;
use crate::config::{FailurePolicy, DEFAULT_PROMPT_EVENT_MESSAGE, DEFAULT_RESPONSE_EVENT_MESSAGE};
use crate::error::Result;
use crate::provider::AuditLog;
use crate::types::{AuditRecord, PipelineConfig, StageInput};
use async_trait::async_trait;
use std::sync::Arc;

/// Submits the latest human prompt (or the engine reply) to the audit log
pub struct AuditStage {
    log: Arc<dyn AuditLog>,
    prompt_event_message: String,
    response_event_message: String,
    on_failure: FailurePolicy,
}

impl AuditStage {
    /// Audit stage with default event messages; log failures are non-fatal
    pub fn new(log: Arc<dyn AuditLog>) -> Self {
        Self {
            log,
            prompt_event_message: DEFAULT_PROMPT_EVENT_MESSAGE.to_string(),
            response_event_message: DEFAULT_RESPONSE_EVENT_MESSAGE.to_string(),
            on_failure: FailurePolicy::Open,
        }
    }

    pub fn with_event_messages(
        mut self,
        prompt: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.prompt_event_message = prompt.into();
        self.response_event_message = response.into();
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    fn default_event_message(&self, input: &StageInput) -> &str {
        match input {
            StageInput::Conversation(_) => &self.prompt_event_message,
            StageInput::Reply(_) => &self.response_event_message,
        }
    }
}

#[async_trait]
impl Stage for AuditStage {
    fn name(&self) -> &str {
        "audit"
    }

    async fn invoke(&self, input: StageInput, config: &PipelineConfig) -> Result<StageInput> {
        let Some(text) = input.inspected_text() else {
            return Ok(input);
        };

        let event_message = config
            .event_message
            .clone()
            .unwrap_or_else(|| self.default_event_message(&input).to_string());
        let record = AuditRecord::new(event_message, text);

        if let Err(e) = self.log.append(vec![record]).await {
            match self.on_failure {
                FailurePolicy::Open => {
                    tracing::warn!(
                        log = %self.log.name(),
                        error = %e,
                        "Audit append failed, continuing"
                    );
                }
                FailurePolicy::Closed => return Err(e),
            }
        }

        Ok(input)
    }
}
