//! Moderation pipeline configuration
//!
//! Loaded from a JSON file; every field has a default so an empty object
//! (`{}`) is a valid configuration.

use crate::error::{ModerationError, Result};
use crate::provider::http::HttpConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default malice score at or above which an indicator disqualifies content
pub const DEFAULT_MALICE_THRESHOLD: f64 = 70.0;

/// Upper bound of the reputation score scale
pub const MAX_MALICE_SCORE: f64 = 100.0;

/// Default event message for audited human prompts
pub const DEFAULT_PROMPT_EVENT_MESSAGE: &str = "Received a human prompt";

/// Default event message for audited engine responses
pub const DEFAULT_RESPONSE_EVENT_MESSAGE: &str = "Received a response";

/// What a stage does when its collaborator call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and let the value through
    Open,
    /// Abort the pipeline with the collaborator's error
    Closed,
}

/// Audit stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSettings {
    #[serde(default = "default_prompt_event_message")]
    pub prompt_event_message: String,

    #[serde(default = "default_response_event_message")]
    pub response_event_message: String,

    #[serde(default = "default_open")]
    pub on_failure: FailurePolicy,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            prompt_event_message: default_prompt_event_message(),
            response_event_message: default_response_event_message(),
            on_failure: FailurePolicy::Open,
        }
    }
}

/// Redaction stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactionSettings {
    #[serde(default = "default_closed")]
    pub on_failure: FailurePolicy,
}

impl Default for RedactionSettings {
    fn default() -> Self {
        Self {
            on_failure: FailurePolicy::Closed,
        }
    }
}

/// Threat-intelligence gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationSettings {
    #[serde(default = "default_closed")]
    pub on_failure: FailurePolicy,
}

impl Default for ReputationSettings {
    fn default() -> Self {
        Self {
            on_failure: FailurePolicy::Closed,
        }
    }
}

/// Top-level configuration for a moderation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationConfig {
    /// Score (0–100) at or above which an indicator aborts the pipeline
    #[serde(default = "default_threshold")]
    pub malice_threshold: f64,

    #[serde(default)]
    pub audit: AuditSettings,

    #[serde(default)]
    pub redaction: RedactionSettings,

    #[serde(default)]
    pub reputation: ReputationSettings,

    /// Fixed retrieval context appended before the response engine runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Remote collaborator service; in-memory collaborators are used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<HttpConfig>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            malice_threshold: DEFAULT_MALICE_THRESHOLD,
            audit: AuditSettings::default(),
            redaction: RedactionSettings::default(),
            reputation: ReputationSettings::default(),
            context: None,
            service: None,
        }
    }
}

impl ModerationConfig {
    /// Parse and validate a configuration from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ModerationConfig = serde_json::from_str(json)
            .map_err(|e| ModerationError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ModerationError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_json(&json)?;
        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.malice_threshold)?;
        if let Some(service) = &self.service {
            service.validate()?;
        }
        Ok(())
    }
}

/// Check a malice threshold lies within `0..=MAX_MALICE_SCORE`
///
/// NaN is rejected: it compares false against every score and would let
/// all content through.
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if (0.0..=MAX_MALICE_SCORE).contains(&threshold) {
        Ok(())
    } else {
        Err(ModerationError::Config(format!(
            "maliceThreshold must be within 0..={}, got {}",
            MAX_MALICE_SCORE, threshold
        )))
    }
}

fn default_threshold() -> f64 {
    DEFAULT_MALICE_THRESHOLD
}

fn default_prompt_event_message() -> String {
    DEFAULT_PROMPT_EVENT_MESSAGE.to_string()
}

fn default_response_event_message() -> String {
    DEFAULT_RESPONSE_EVENT_MESSAGE.to_string()
}

fn default_open() -> FailurePolicy {
    FailurePolicy::Open
}

fn default_closed() -> FailurePolicy {
    FailurePolicy::Closed
}
