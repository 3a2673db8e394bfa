//! RAG-enrich stage

use super::{Accepts, Stage};
use crate::error::{ModerationError, Result};
use crate::provider::ContextSource;
use crate::types::{InputKind, Message, PipelineConfig, StageInput};
use async_trait::async_trait;
use std::sync::Arc;

/// Appends retrieved context to the conversation as one system message
///
/// Existing messages, including the redacted human prompt, are kept as-is.
pub struct RagEnrichStage {
    source: Arc<dyn ContextSource>,
}

impl RagEnrichStage {
    pub fn new(source: Arc<dyn ContextSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Stage for RagEnrichStage {
    fn name(&self) -> &str {
        "rag_enrich"
    }

    fn accepts(&self) -> Accepts {
        Accepts::Conversation
    }

    async fn invoke(&self, input: StageInput, _config: &PipelineConfig) -> Result<StageInput> {
        let conversation = match input {
            StageInput::Conversation(conversation) => conversation,
            StageInput::Reply(_) => {
                return Err(ModerationError::UnsupportedInput {
                    stage: self.name().to_string(),
                    found: InputKind::Reply,
                })
            }
        };

        let context = self.source.context(&conversation).await?;
        tracing::debug!(source = %self.source.name(), bytes = context.len(), "Context retrieved");

        Ok(StageInput::Conversation(
            conversation.with_appended(Message::system(context)),
        ))
    }
}
