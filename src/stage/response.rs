//! Response stage - hands the moderated conversation to the engine

use super::{Accepts, Stage};
use crate::error::{ModerationError, Result};
use crate::provider::ResponseEngine;
use crate::types::{InputKind, Message, PipelineConfig, StageInput};
use async_trait::async_trait;
use std::sync::Arc;

/// Turns a conversation into the engine's AI-authored reply
pub struct ResponseStage {
    engine: Arc<dyn ResponseEngine>,
}

impl ResponseStage {
    pub fn new(engine: Arc<dyn ResponseEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Stage for ResponseStage {
    fn name(&self) -> &str {
        "response"
    }

    fn accepts(&self) -> Accepts {
        Accepts::Conversation
    }

    fn produces(&self, _input: InputKind) -> InputKind {
        InputKind::Reply
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

        if conversation.is_empty() {
            return Err(ModerationError::Contract(
                "Response engine received an empty conversation".to_string(),
            ));
        }

        let text = self.engine.generate(&conversation).await?;
        tracing::debug!(engine = %self.engine.name(), "Reply generated");
        Ok(StageInput::Reply(Message::ai(text)))
    }
}
