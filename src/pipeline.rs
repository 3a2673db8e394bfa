//! Pipeline executor and standard assembly
//!
//! A `Pipeline` is an ordered list of labeled stages terminated by
//! [`OutputExtract`]. Stages run strictly one after another; the first error
//! ends the run and no later stage is invoked. The builder checks the
//! conversation → reply variant flow up front, so a pipeline that builds is
//! guaranteed to hand output extraction a reply.
//!
//! ```rust,no_run
//! use a3s_moderation::{run_pipeline, standard_pipeline, Collaborators, ModerationConfig};
//!
//! # async fn example() -> a3s_moderation::Result<()> {
//! let config = ModerationConfig::default();
//! let collaborators = Collaborators::in_memory(&config)?;
//! let pipeline = standard_pipeline(&config, &collaborators)?;
//!
//! let answer = run_pipeline(&pipeline, "Please give me the emails.").await;
//! println!("{}", answer);
//! # Ok(())
//! # }
//! ```

use crate::config::ModerationConfig;
use crate::error::{ModerationError, Result};
use crate::provider::http::HttpServices;
use crate::provider::memory::{
    EchoEngine, MemoryAuditLog, RegexRedactor, StaticContext, StaticReputation,
};
use crate::provider::{AuditLog, ContextSource, Redactor, ReputationProvider, ResponseEngine};
use crate::stage::{
    ensure_accepted, AuditStage, OutputExtract, RagEnrichStage, RedactStage, ResponseStage, Stage,
    ThreatIntelStage,
};
use crate::types::{Conversation, IndicatorKind, InputKind, PipelineConfig, StageInput};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One position in a pipeline
#[derive(Clone)]
pub struct Step {
    label: String,
    stage: Arc<dyn Stage>,
    config: PipelineConfig,
}

impl Step {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stage(&self) -> &Arc<dyn Stage> {
        &self.stage
    }

    /// Default configuration handed to the stage at this position
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("label", &self.label)
            .field("stage", &self.stage.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Per-invocation configuration overrides, keyed by step label
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    overrides: HashMap<String, PipelineConfig>,
}

impl RunOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the configuration of the step labeled `label`
    pub fn set(mut self, label: impl Into<String>, config: PipelineConfig) -> Self {
        self.overrides.insert(label.into(), config);
        self
    }

    pub fn get(&self, label: &str) -> Option<&PipelineConfig> {
        self.overrides.get(label)
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

/// Builder for [`Pipeline`]
#[derive(Default)]
pub struct PipelineBuilder {
    steps: Vec<Step>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage labeled with its own name
    pub fn stage(self, stage: Arc<dyn Stage>) -> Self {
        self.stage_with(stage, PipelineConfig::default())
    }

    /// Append a stage with a default configuration
    pub fn stage_with(self, stage: Arc<dyn Stage>, config: PipelineConfig) -> Self {
        let label = stage.name().to_string();
        self.labeled(label, stage, config)
    }

    /// Append a stage under an explicit label
    ///
    /// Labels must be unique; they address the step in [`RunOverrides`].
    pub fn labeled(
        mut self,
        label: impl Into<String>,
        stage: Arc<dyn Stage>,
        config: PipelineConfig,
    ) -> Self {
        self.steps.push(Step {
            label: label.into(),
            stage,
            config,
        });
        self
    }

    /// Validate the stage sequence and build the pipeline
    pub fn build(self) -> Result<Pipeline> {
        validate_flow(&self.steps)?;
        Ok(Pipeline {
            steps: self.steps,
            output: OutputExtract,
        })
    }
}

fn validate_flow(steps: &[Step]) -> Result<()> {
    if steps.is_empty() {
        return Err(ModerationError::Config(
            "Pipeline must contain at least one stage".to_string(),
        ));
    }

    let mut labels = HashSet::new();
    let mut kind = InputKind::Conversation;
    for (position, step) in steps.iter().enumerate() {
        if !labels.insert(step.label.as_str()) {
            return Err(ModerationError::Config(format!(
                "Duplicate step label '{}'",
                step.label
            )));
        }
        if !step.stage.accepts().permits(kind) {
            return Err(ModerationError::Config(format!(
                "Step '{}' at position {} does not accept {} input",
                step.label, position, kind
            )));
        }
        kind = step.stage.produces(kind);
    }

    if !OutputExtract.accepts().permits(kind) {
        return Err(ModerationError::Config(format!(
            "Pipeline ends with {} output; output extraction requires a reply",
            kind
        )));
    }
    Ok(())
}

/// Ordered, validated stage sequence
pub struct Pipeline {
    steps: Vec<Step>,
    output: OutputExtract,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Step labels in execution order
    pub fn labels(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.label.as_str()).collect()
    }

    /// Run raw user text through every stage
    pub async fn run(&self, raw: &str) -> Result<String> {
        self.run_with(raw, &RunOverrides::default()).await
    }

    /// Run raw user text with per-step configuration overrides
    pub async fn run_with(&self, raw: &str, overrides: &RunOverrides) -> Result<String> {
        self.run_conversation(Conversation::from_prompt(raw), overrides)
            .await
    }

    /// Run a seeded conversation; its latest human message is the prompt
    pub async fn run_conversation(
        &self,
        conversation: Conversation,
        overrides: &RunOverrides,
    ) -> Result<String> {
        let mut value = StageInput::Conversation(conversation);

        for (position, step) in self.steps.iter().enumerate() {
            ensure_accepted(step.stage.as_ref(), &value)?;

            let config = match overrides.get(&step.label) {
                Some(overlay) => step.config.merged(overlay),
                None => step.config.clone(),
            };

            tracing::debug!(
                step = %step.label,
                position,
                input = %value.kind(),
                "Invoking stage"
            );

            value = match step.stage.invoke(value, &config).await {
                Ok(next) => {
                    tracing::debug!(
                        step = %step.label,
                        position,
                        output = %next.kind(),
                        "Stage finished"
                    );
                    next
                }
                Err(e) => {
                    if e.is_disqualifying() {
                        tracing::info!(
                            step = %step.label,
                            position,
                            reason = %e,
                            "Pipeline aborted on disqualifying content"
                        );
                    } else {
                        tracing::warn!(
                            step = %step.label,
                            position,
                            error = %e,
                            "Pipeline stage failed"
                        );
                    }
                    return Err(e);
                }
            };
        }

        self.output.extract(value)
    }
}

/// Collaborators the standard pipeline is assembled from
#[derive(Clone)]
pub struct Collaborators {
    pub audit: Arc<dyn AuditLog>,
    pub redactor: Arc<dyn Redactor>,
    pub domain_reputation: Arc<dyn ReputationProvider>,
    pub url_reputation: Arc<dyn ReputationProvider>,
    pub ip_reputation: Arc<dyn ReputationProvider>,
    pub engine: Arc<dyn ResponseEngine>,
    /// RAG-enrich runs only when a context source is present
    pub context: Option<Arc<dyn ContextSource>>,
}

impl Collaborators {
    /// In-process collaborators: memory audit log, regex redaction, all
    /// indicators scored 0, echo engine, and the configured static context
    pub fn in_memory(config: &ModerationConfig) -> Result<Self> {
        let reputation: Arc<dyn ReputationProvider> = Arc::new(StaticReputation::default());
        Ok(Self {
            audit: Arc::new(MemoryAuditLog::default()),
            redactor: Arc::new(RegexRedactor::with_default_rules()?),
            domain_reputation: reputation.clone(),
            url_reputation: reputation.clone(),
            ip_reputation: reputation,
            engine: Arc::new(EchoEngine),
            context: static_context(config),
        })
    }

    /// Collaborators backed by the remote moderation service
    pub fn remote(services: &HttpServices, config: &ModerationConfig) -> Self {
        Self {
            audit: Arc::new(services.clone()),
            redactor: Arc::new(services.clone()),
            domain_reputation: Arc::new(services.reputation(IndicatorKind::Domain)),
            url_reputation: Arc::new(services.reputation(IndicatorKind::Url)),
            ip_reputation: Arc::new(services.reputation(IndicatorKind::Ip)),
            engine: Arc::new(services.clone()),
            context: static_context(config),
        }
    }

    pub fn reputation(&self, kind: IndicatorKind) -> Arc<dyn ReputationProvider> {
        match kind {
            IndicatorKind::Domain => self.domain_reputation.clone(),
            IndicatorKind::Url => self.url_reputation.clone(),
            IndicatorKind::Ip => self.ip_reputation.clone(),
        }
    }

    pub fn with_context(mut self, source: Arc<dyn ContextSource>) -> Self {
        self.context = Some(source);
        self
    }
}

fn static_context(config: &ModerationConfig) -> Option<Arc<dyn ContextSource>> {
    config
        .context
        .as_ref()
        .map(|text| Arc::new(StaticContext::new(text.clone())) as Arc<dyn ContextSource>)
}

/// Assemble the standard moderation pipeline
///
/// Prompt side: audit, redact, domain/URL/IP gates, optional RAG-enrich.
/// Then the response engine. Reply side: audit, redact, domain/URL/IP gates.
/// Output extraction terminates the sequence.
pub fn standard_pipeline(
    config: &ModerationConfig,
    collaborators: &Collaborators,
) -> Result<Pipeline> {
    config.validate()?;

    let audit: Arc<dyn Stage> = Arc::new(
        AuditStage::new(collaborators.audit.clone())
            .with_event_messages(
                config.audit.prompt_event_message.clone(),
                config.audit.response_event_message.clone(),
            )
            .with_failure_policy(config.audit.on_failure),
    );
    let redact: Arc<dyn Stage> = Arc::new(
        RedactStage::new(collaborators.redactor.clone())
            .with_failure_policy(config.redaction.on_failure),
    );
    let gates = IndicatorKind::ALL
        .iter()
        .map(|kind| -> Result<Arc<dyn Stage>> {
            let gate = ThreatIntelStage::for_kind(
                *kind,
                collaborators.reputation(*kind),
                collaborators.audit.clone(),
            )?
            .with_threshold(config.malice_threshold)?
            .with_failure_policy(config.reputation.on_failure);
            Ok(Arc::new(gate) as Arc<dyn Stage>)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut builder = PipelineBuilder::new()
        .labeled("audit_prompt", audit.clone(), PipelineConfig::default())
        .labeled("redact_prompt", redact.clone(), PipelineConfig::default());
    for gate in &gates {
        builder = builder.labeled(
            format!("{}_prompt", gate.name()),
            gate.clone(),
            PipelineConfig::default(),
        );
    }

    if let Some(source) = &collaborators.context {
        builder = builder.stage(Arc::new(RagEnrichStage::new(source.clone())));
    }

    builder = builder
        .stage(Arc::new(ResponseStage::new(collaborators.engine.clone())))
        .labeled("audit_response", audit, PipelineConfig::default())
        .labeled("redact_response", redact, PipelineConfig::default());
    for gate in &gates {
        builder = builder.labeled(
            format!("{}_response", gate.name()),
            gate.clone(),
            PipelineConfig::default(),
        );
    }

    builder.build()
}

/// Run `raw` through `pipeline` and render the outcome as a string
///
/// Success yields the reply text; a disqualifying abort yields
/// `MaliciousContentError: <reason>`; any other failure yields
/// `PipelineError: <message>`.
pub async fn run_pipeline(pipeline: &Pipeline, raw: &str) -> String {
    match pipeline.run(raw).await {
        Ok(text) => text,
        Err(e) => e.diagnostic(),
    }
}
