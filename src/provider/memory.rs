//! In-memory collaborators for testing and single-process use
//!
//! Nothing here leaves the process: the audit log is a bounded `Vec`,
//! redaction is rule-based, and reputation scores come from a fixed table.

use super::{AuditLog, ContextSource, Redaction, Redactor, ReputationProvider, ResponseEngine};
use crate::error::{ModerationError, Result};
use crate::types::{AuditRecord, Conversation};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// An audit record as stored by [`MemoryAuditLog`]
#[derive(Debug, Clone)]
pub struct LoggedRecord {
    /// Unique identifier (aud-<uuid>)
    pub id: String,

    /// The submitted record
    pub record: AuditRecord,

    /// Unix timestamp in milliseconds when the record was appended
    pub logged_at: i64,
}

/// Bounded in-memory audit log
///
/// Oldest records are drained once `max_records` is exceeded.
pub struct MemoryAuditLog {
    records: Arc<RwLock<Vec<LoggedRecord>>>,
    max_records: usize,
}

impl MemoryAuditLog {
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            max_records,
        }
    }

    /// Number of records currently retained
    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Retained records, oldest first
    pub async fn records(&self) -> Vec<LoggedRecord> {
        self.records.read().await.clone()
    }

    /// Most recent records, newest first
    pub async fn recent(&self, limit: usize) -> Vec<LoggedRecord> {
        let records = self.records.read().await;
        records.iter().rev().take(limit).cloned().collect()
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, records: Vec<AuditRecord>) -> Result<()> {
        let mut stored = self.records.write().await;
        for record in records {
            tracing::debug!(
                event_message = %record.event_message,
                "Audit record appended"
            );
            stored.push(LoggedRecord {
                id: format!("aud-{}", uuid::Uuid::new_v4()),
                record,
                logged_at: chrono::Utc::now().timestamp_millis(),
            });
        }

        if self.max_records > 0 && stored.len() > self.max_records {
            let drain_count = stored.len() - self.max_records;
            stored.drain(..drain_count);
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// A single redaction rule: every match of `pattern` becomes `placeholder`
#[derive(Debug, Clone)]
pub struct RedactionRule {
    pub name: String,
    pub pattern: String,
    pub placeholder: String,
}

impl RedactionRule {
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            placeholder: placeholder.into(),
        }
    }
}

/// Built-in PII rules. Placeholders never match any rule, which keeps
/// redaction idempotent.
pub fn default_redaction_rules() -> Vec<RedactionRule> {
    vec![
        RedactionRule::new(
            "email",
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            "<EMAIL_ADDRESS>",
        ),
        RedactionRule::new("us_ssn", r"\b\d{3}-\d{2}-\d{4}\b", "<US_SSN>"),
        RedactionRule::new(
            "credit_card",
            r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b",
            "<CREDIT_CARD>",
        ),
        RedactionRule::new(
            "phone_number",
            r"\(?\b\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b",
            "<PHONE_NUMBER>",
        ),
    ]
}

/// Regex rule-based redactor
pub struct RegexRedactor {
    rules: Vec<(String, Regex, String)>,
}

impl RegexRedactor {
    /// Compile the given rules
    pub fn new(rules: &[RedactionRule]) -> Result<Self> {
        let compiled = rules
            .iter()
            .map(|rule| {
                let regex = Regex::new(&rule.pattern).map_err(|e| {
                    ModerationError::Config(format!(
                        "Invalid redaction rule '{}': {}",
                        rule.name, e
                    ))
                })?;
                Ok((rule.name.clone(), regex, rule.placeholder.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules: compiled })
    }

    /// Redactor with [`default_redaction_rules`]
    pub fn with_default_rules() -> Result<Self> {
        Self::new(&default_redaction_rules())
    }

    fn apply(&self, text: &str) -> Option<String> {
        let mut current = text.to_string();
        let mut changed = false;
        for (name, regex, placeholder) in &self.rules {
            if regex.is_match(&current) {
                tracing::debug!(rule = %name, "Redaction rule matched");
                current = regex
                    .replace_all(&current, regex::NoExpand(placeholder.as_str()))
                    .into_owned();
                changed = true;
            }
        }
        changed.then_some(current)
    }
}

#[async_trait]
impl Redactor for RegexRedactor {
    async fn redact(&self, text: &str) -> Result<Redaction> {
        Ok(Redaction {
            redacted_text: self.apply(text),
        })
    }

    fn name(&self) -> &str {
        "regex"
    }
}

/// Fixed indicator→score table
///
/// Unknown indicators receive `default_score`. Counts lookups so tests can
/// assert whether the service was consulted.
pub struct StaticReputation {
    scores: HashMap<String, f64>,
    default_score: f64,
    lookups: AtomicUsize,
}

impl StaticReputation {
    pub fn new(default_score: f64) -> Self {
        Self {
            scores: HashMap::new(),
            default_score,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Add a scored indicator
    pub fn with_score(mut self, indicator: impl Into<String>, score: f64) -> Self {
        self.scores.insert(indicator.into(), score);
        self
    }

    /// Number of batched lookups served
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Default for StaticReputation {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[async_trait]
impl ReputationProvider for StaticReputation {
    async fn reputation(&self, indicators: &[String]) -> Result<HashMap<String, f64>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(indicators
            .iter()
            .map(|indicator| {
                let score = self
                    .scores
                    .get(indicator)
                    .copied()
                    .unwrap_or(self.default_score);
                (indicator.clone(), score)
            })
            .collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Context source returning the same text for every conversation
pub struct StaticContext {
    text: String,
}

impl StaticContext {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl ContextSource for StaticContext {
    async fn context(&self, _conversation: &Conversation) -> Result<String> {
        Ok(self.text.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Engine that answers with the latest human message
pub struct EchoEngine;

#[async_trait]
impl ResponseEngine for EchoEngine {
    async fn generate(&self, conversation: &Conversation) -> Result<String> {
        let prompt = conversation
            .latest_human()
            .map(|(_, m)| m.content().to_string())
            .unwrap_or_default();
        Ok(format!("Echo: {}", prompt))
    }

    fn name(&self) -> &str {
        "echo"
    }
}
