//! Stage trait - the unit of pipeline work
//!
//! Every stage maps a [`StageInput`] to a [`StageInput`] of the same variant
//! (the response stage is the one exception: it turns a conversation into a
//! reply), or fails. Stages hold no per-invocation state, so one instance can
//! serve concurrent invocations and appear at several pipeline positions.

use crate::error::{ModerationError, Result};
use crate::types::{InputKind, PipelineConfig, StageInput};
use async_trait::async_trait;

pub mod audit;
pub mod output;
pub mod rag;
pub mod redact;
pub mod response;
pub mod threat;

pub use audit::AuditStage;
pub use output::OutputExtract;
pub use rag::RagEnrichStage;
pub use redact::RedactStage;
pub use response::ResponseStage;
pub use threat::ThreatIntelStage;

/// Input variants a stage can handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepts {
    Conversation,
    Reply,
    Both,
}

impl Accepts {
    pub fn permits(&self, kind: InputKind) -> bool {
        matches!(
            (self, kind),
            (Accepts::Both, _)
                | (Accepts::Conversation, InputKind::Conversation)
                | (Accepts::Reply, InputKind::Reply)
        )
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable stage name used as the default pipeline label
    fn name(&self) -> &str;

    /// Which input variants this stage handles
    fn accepts(&self) -> Accepts {
        Accepts::Both
    }

    /// Variant this stage returns for a given input variant
    fn produces(&self, input: InputKind) -> InputKind {
        input
    }

    /// Run the stage
    ///
    /// Returns the input unchanged, a rewritten value, or an error. A
    /// `DisqualifyingContent` error aborts the remainder of the pipeline.
    async fn invoke(&self, input: StageInput, config: &PipelineConfig) -> Result<StageInput>;
}

/// Reject inputs the stage did not declare support for
pub(crate) fn ensure_accepted(stage: &dyn Stage, input: &StageInput) -> Result<()> {
    if stage.accepts().permits(input.kind()) {
        Ok(())
    } else {
        Err(ModerationError::UnsupportedInput {
            stage: stage.name().to_string(),
            found: input.kind(),
        })
    }
}
