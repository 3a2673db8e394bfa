//! Collaborator traits - the pipeline's only boundary to external services
//!
//! Stages own `Arc` handles to these collaborators, injected at
//! construction. Implementations handle the transport-specific details;
//! swap `memory` for `http` (or your own backend) without touching stages.

use crate::error::Result;
use crate::types::{AuditRecord, Conversation};
use async_trait::async_trait;
use std::collections::HashMap;

pub mod http;
pub mod memory;

/// Append-only audit log
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append a batch of records
    ///
    /// The pipeline always submits exactly one record per call.
    async fn append(&self, records: Vec<AuditRecord>) -> Result<()>;

    /// Backend name (e.g., "memory", "http")
    fn name(&self) -> &str;
}

/// Outcome of a redaction request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redaction {
    /// Redacted variant of the text; `None` or empty means "no change"
    pub redacted_text: Option<String>,
}

impl Redaction {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn redacted(text: impl Into<String>) -> Self {
        Self {
            redacted_text: Some(text.into()),
        }
    }

    /// The redacted text, if the service reported a non-empty change
    pub fn changed_text(&self) -> Option<&str> {
        self.redacted_text.as_deref().filter(|t| !t.is_empty())
    }
}

/// Sensitive-data redaction service
#[async_trait]
pub trait Redactor: Send + Sync {
    async fn redact(&self, text: &str) -> Result<Redaction>;

    fn name(&self) -> &str;
}

/// Reputation service for one indicator kind
#[async_trait]
pub trait ReputationProvider: Send + Sync {
    /// Score a batch of indicators in a single call
    ///
    /// Returns a malice score (0–100) per indicator. Indicators the service
    /// could not score may be absent from the map.
    async fn reputation(&self, indicators: &[String]) -> Result<HashMap<String, f64>>;

    fn name(&self) -> &str;
}

/// Generative response engine
#[async_trait]
pub trait ResponseEngine: Send + Sync {
    /// Produce the AI reply text for a (non-empty) conversation
    async fn generate(&self, conversation: &Conversation) -> Result<String>;

    fn name(&self) -> &str;
}

/// Source of retrieval context appended before generation
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Context text for the given conversation; treated as opaque
    async fn context(&self, conversation: &Conversation) -> Result<String>;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction_changed_text() {
        assert!(Redaction::unchanged().changed_text().is_none());
        assert!(Redaction::redacted("").changed_text().is_none());
        assert_eq!(
            Redaction::redacted("<EMAIL_ADDRESS>").changed_text(),
            Some("<EMAIL_ADDRESS>")
        );
    }
}
