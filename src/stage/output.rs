//! Output extraction - the terminal step that yields the final string

use super::Accepts;
use crate::error::{ModerationError, Result};
use crate::types::StageInput;

/// Pulls the reply text out of the final pipeline value
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputExtract;

impl OutputExtract {
    pub fn accepts(&self) -> Accepts {
        Accepts::Reply
    }

    pub fn extract(&self, input: StageInput) -> Result<String> {
        match input {
            StageInput::Reply(reply) => Ok(reply.into_content()),
            StageInput::Conversation(_) => Err(ModerationError::Contract(
                "Pipeline ended without producing a reply".to_string(),
            )),
        }
    }
}
