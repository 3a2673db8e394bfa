//! # a3s-moderation
//!
//! Content-moderation pipeline for conversational AI in the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-moderation` wraps a generative response engine in a fixed sequence
//! of safety stages. Each user prompt is audited, scrubbed of sensitive data,
//! and checked against threat-intelligence reputation for the domains, URLs
//! and IP addresses it mentions, before the engine sees it. The engine's reply
//! passes through the same checks on the way out. Any indicator scoring at or
//! above the malice threshold aborts the run immediately.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_moderation::{run_pipeline, standard_pipeline, Collaborators, ModerationConfig};
//!
//! # async fn example() -> a3s_moderation::Result<()> {
//! let config = ModerationConfig::default();
//! let collaborators = Collaborators::in_memory(&config)?;
//! let pipeline = standard_pipeline(&config, &collaborators)?;
//!
//! // "Echo: <EMAIL_ADDRESS> wants the report"
//! let answer = run_pipeline(&pipeline, "jane@example.com wants the report").await;
//! println!("{}", answer);
//! # Ok(())
//! # }
//! ```
//!
//! ## Collaborators
//!
//! - **memory** - in-process audit log, regex redaction, fixed reputation table
//! - **http** - JSON-over-HTTP client for a remote moderation service
//!
//! ## Architecture
//!
//! - **Stage** trait - one unit of work mapping a value to a value, or failing
//! - **Pipeline** - validated, labeled stage sequence with short-circuit abort
//! - **ThreatIntelStage** - one gate type serving domains, URLs and IPs
//! - **ModerationError** - `DisqualifyingContent` is the abort signal

pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod provider;
pub mod stage;
pub mod types;

// Re-export core types
pub use config::{FailurePolicy, ModerationConfig, DEFAULT_MALICE_THRESHOLD};
pub use error::{ModerationError, Result};
pub use extract::{IndicatorExtractor, PatternExtractor};
pub use pipeline::{
    run_pipeline, standard_pipeline, Collaborators, Pipeline, PipelineBuilder, RunOverrides, Step,
};
pub use provider::{
    AuditLog, ContextSource, Redaction, Redactor, ReputationProvider, ResponseEngine,
};
pub use stage::{
    Accepts, AuditStage, OutputExtract, RagEnrichStage, RedactStage, ResponseStage, Stage,
    ThreatIntelStage,
};
pub use types::{
    AuditRecord, Conversation, IndicatorKind, InputKind, Message, PipelineConfig, Role,
    StageInput, ThreatFinding,
};

// Re-export collaborators for convenience
pub use provider::http::{HttpConfig, HttpServices};
pub use provider::memory::{
    EchoEngine, MemoryAuditLog, RegexRedactor, StaticContext, StaticReputation,
};
