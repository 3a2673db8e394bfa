//! Threat-intelligence gate - blocks or passes, never rewrites
//!
//! One generic gate serves domains, URLs and IP addresses; instances differ
//! only in their extractor and reputation collaborator. The threshold is
//! shared policy, so the three gates behave identically apart from kind.

use super::Stage;
use crate::config::{validate_threshold, FailurePolicy, DEFAULT_MALICE_THRESHOLD};
use crate::error::{ModerationError, Result};
use crate::extract::{IndicatorExtractor, PatternExtractor};
use crate::provider::{AuditLog, ReputationProvider};
use crate::types::{AuditRecord, IndicatorKind, PipelineConfig, StageInput, ThreatFinding};
use async_trait::async_trait;
use std::sync::Arc;

/// Gate that aborts the pipeline when any extracted indicator scores at or
/// above the malice threshold
pub struct ThreatIntelStage {
    name: String,
    extractor: Arc<dyn IndicatorExtractor>,
    reputation: Arc<dyn ReputationProvider>,
    audit: Arc<dyn AuditLog>,
    threshold: f64,
    on_failure: FailurePolicy,
}

impl ThreatIntelStage {
    /// Gate with a custom extractor
    pub fn new(
        extractor: Arc<dyn IndicatorExtractor>,
        reputation: Arc<dyn ReputationProvider>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            name: format!("{}_intel", extractor.kind().as_str()),
            extractor,
            reputation,
            audit,
            threshold: DEFAULT_MALICE_THRESHOLD,
            on_failure: FailurePolicy::Closed,
        }
    }

    /// Gate using the built-in extraction pattern for `kind`
    pub fn for_kind(
        kind: IndicatorKind,
        reputation: Arc<dyn ReputationProvider>,
        audit: Arc<dyn AuditLog>,
    ) -> Result<Self> {
        let extractor = PatternExtractor::for_kind(kind)?;
        Ok(Self::new(Arc::new(extractor), reputation, audit))
    }

    pub fn domain(
        reputation: Arc<dyn ReputationProvider>,
        audit: Arc<dyn AuditLog>,
    ) -> Result<Self> {
        Self::for_kind(IndicatorKind::Domain, reputation, audit)
    }

    pub fn url(
        reputation: Arc<dyn ReputationProvider>,
        audit: Arc<dyn AuditLog>,
    ) -> Result<Self> {
        Self::for_kind(IndicatorKind::Url, reputation, audit)
    }

    pub fn ip(
        reputation: Arc<dyn ReputationProvider>,
        audit: Arc<dyn AuditLog>,
    ) -> Result<Self> {
        Self::for_kind(IndicatorKind::Ip, reputation, audit)
    }

    /// Override the malice threshold; must lie within `0..=100`
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self> {
        validate_threshold(threshold)?;
        self.threshold = threshold;
        Ok(self)
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn kind(&self) -> IndicatorKind {
        self.extractor.kind()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score indicators in one batched lookup
    ///
    /// Under the closed policy a failed lookup, or an indicator the service
    /// left unscored, is an error. Under the open policy both are logged and
    /// the affected indicators are skipped.
    async fn score(&self, indicators: &[String]) -> Result<Vec<ThreatFinding>> {
        let kind = self.kind();
        let scores = match self.reputation.reputation(indicators).await {
            Ok(scores) => scores,
            Err(e) => match self.on_failure {
                FailurePolicy::Closed => return Err(e),
                FailurePolicy::Open => {
                    tracing::warn!(
                        kind = %kind,
                        provider = %self.reputation.name(),
                        error = %e,
                        "Reputation lookup failed, passing content unscored"
                    );
                    return Ok(Vec::new());
                }
            },
        };

        let mut findings = Vec::with_capacity(indicators.len());
        for indicator in indicators {
            match scores.get(indicator) {
                Some(score) => findings.push(ThreatFinding {
                    indicator: indicator.clone(),
                    score: *score,
                    kind,
                }),
                None => match self.on_failure {
                    FailurePolicy::Closed => {
                        return Err(ModerationError::Reputation {
                            kind,
                            reason: format!("no score returned for '{}'", indicator),
                        });
                    }
                    FailurePolicy::Open => {
                        tracing::warn!(
                            kind = %kind,
                            indicator = %indicator,
                            "Indicator left unscored"
                        );
                    }
                },
            }
        }
        Ok(findings)
    }

    fn abort_record(&self, findings: &[ThreatFinding]) -> AuditRecord {
        let kind = self.kind();
        let captured = findings
            .iter()
            .map(|f| {
                let verdict = if f.exceeds(self.threshold) { "malicious" } else { "ok" };
                format!("{}: score {} ({})", f.indicator, f.score, verdict)
            })
            .collect::<Vec<_>>()
            .join("\n");
        AuditRecord::new(
            format!(
                "Malicious {} detected: one or more {} scored at or above {}",
                kind,
                kind.plural(),
                self.threshold
            ),
            captured,
        )
    }
}

#[async_trait]
impl Stage for ThreatIntelStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: StageInput, _config: &PipelineConfig) -> Result<StageInput> {
        let Some(text) = input.inspected_text() else {
            return Ok(input);
        };

        let indicators = self.extractor.extract(text);
        if indicators.is_empty() {
            return Ok(input);
        }

        let kind = self.kind();
        tracing::debug!(kind = %kind, count = indicators.len(), "Scoring indicators");

        let findings = self.score(&indicators).await?;
        if !findings.iter().any(|f| f.exceeds(self.threshold)) {
            return Ok(input);
        }

        let record = self.abort_record(&findings);
        if let Err(e) = self.audit.append(vec![record]).await {
            tracing::warn!(
                kind = %kind,
                error = %e,
                "Failed to audit disqualifying content"
            );
        }

        tracing::info!(
            kind = %kind,
            threshold = self.threshold,
            "Disqualifying content detected"
        );
        Err(ModerationError::DisqualifyingContent {
            kind,
            reason: kind.disqualifying_reason(),
        })
    }
}
