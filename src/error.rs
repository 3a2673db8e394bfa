//! Error types for a3s-moderation

use crate::types::{IndicatorKind, InputKind};
use thiserror::Error;

/// Errors that can occur while running a moderation pipeline
#[derive(Debug, Error)]
pub enum ModerationError {
    /// A scored indicator met or exceeded the malice threshold.
    ///
    /// This is the pipeline's abort signal: no stage after the one that
    /// raised it is executed.
    #[error("{reason}")]
    DisqualifyingContent {
        kind: IndicatorKind,
        reason: String,
    },

    /// A stage was handed an input variant it does not accept
    #[error("Stage '{stage}' does not accept {found} input")]
    UnsupportedInput {
        stage: String,
        found: InputKind,
    },

    /// A pipeline invariant was broken upstream
    #[error("Contract violation: {0}")]
    Contract(String),

    /// Audit-log append failure
    #[error("Audit log error: {0}")]
    AuditLog(String),

    /// Redaction service failure
    #[error("Redaction error: {0}")]
    Redaction(String),

    /// Reputation lookup failure
    #[error("Reputation lookup failed for {kind} indicators: {reason}")]
    Reputation {
        kind: IndicatorKind,
        reason: String,
    },

    /// Response engine failure
    #[error("Response engine error: {0}")]
    Engine(String),

    /// Context source failure
    #[error("Context source error: {0}")]
    Context(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ModerationError {
    /// Whether this error is the disqualifying-content abort signal
    pub fn is_disqualifying(&self) -> bool {
        matches!(self, Self::DisqualifyingContent { .. })
    }

    /// Indicator kind behind a disqualifying-content abort, if any
    pub fn indicator_kind(&self) -> Option<IndicatorKind> {
        match self {
            Self::DisqualifyingContent { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Render the user-facing diagnostic string for this error
    ///
    /// Disqualifying content becomes `MaliciousContentError: <reason>`;
    /// every other failure becomes `PipelineError: <message>`.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::DisqualifyingContent { reason, .. } => {
                format!("MaliciousContentError: {}", reason)
            }
            other => format!("PipelineError: {}", other),
        }
    }
}

/// Result type alias for moderation operations
pub type Result<T> = std::result::Result<T, ModerationError>;
