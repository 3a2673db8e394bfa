//! Pipeline integration tests
//!
//! End-to-end runs of the standard pipeline with in-memory collaborators
//! and recording fakes. Covers pass-through, prompt- and reply-side aborts,
//! redaction of the prompt the engine sees, overrides, failure policies,
//! and concurrent invocations.

use a3s_moderation::{
    run_pipeline, standard_pipeline, AuditLog, Collaborators, Conversation, EchoEngine,
    FailurePolicy, HttpConfig, HttpServices, IndicatorKind, MemoryAuditLog, Message,
    ModerationConfig, PipelineConfig, RegexRedactor, ResponseEngine, Result, Role, RunOverrides,
    StaticContext, StaticReputation,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

const IP_ABORT: &str = "MaliciousContentError: One or more IP addresses in your query have a malice score that exceeds the acceptable threshold.";

/// Engine that records every conversation it is asked to answer
struct RecordingEngine {
    reply: String,
    seen: Mutex<Vec<Conversation>>,
}

impl RecordingEngine {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    async fn calls(&self) -> usize {
        self.seen.lock().await.len()
    }

    async fn last(&self) -> Option<Conversation> {
        self.seen.lock().await.last().cloned()
    }
}

#[async_trait]
impl ResponseEngine for RecordingEngine {
    async fn generate(&self, conversation: &Conversation) -> Result<String> {
        self.seen.lock().await.push(conversation.clone());
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct Harness {
    audit: Arc<MemoryAuditLog>,
    engine: Arc<RecordingEngine>,
    domain: Arc<StaticReputation>,
    url: Arc<StaticReputation>,
    ip: Arc<StaticReputation>,
    collaborators: Collaborators,
}

impl Harness {
    fn new(reply: &str) -> Self {
        Self::with_reputation(
            reply,
            StaticReputation::default(),
            StaticReputation::default(),
            StaticReputation::default(),
        )
    }

    fn with_reputation(
        reply: &str,
        domain: StaticReputation,
        url: StaticReputation,
        ip: StaticReputation,
    ) -> Self {
        let audit = Arc::new(MemoryAuditLog::default());
        let engine = Arc::new(RecordingEngine::new(reply));
        let domain = Arc::new(domain);
        let url = Arc::new(url);
        let ip = Arc::new(ip);
        let collaborators = Collaborators {
            audit: audit.clone(),
            redactor: Arc::new(RegexRedactor::with_default_rules().unwrap()),
            domain_reputation: domain.clone(),
            url_reputation: url.clone(),
            ip_reputation: ip.clone(),
            engine: engine.clone(),
            context: None,
        };
        Self {
            audit,
            engine,
            domain,
            url,
            ip,
            collaborators,
        }
    }

    fn total_lookups(&self) -> usize {
        self.domain.lookups() + self.url.lookups() + self.ip.lookups()
    }
}

// ─── End-to-end scenarios ────────────────────────────────────────

#[tokio::test]
async fn test_clean_prompt_reaches_engine_unchanged() {
    let harness = Harness::new("Here are the emails you asked for.");
    let pipeline = standard_pipeline(&ModerationConfig::default(), &harness.collaborators).unwrap();

    let output = run_pipeline(&pipeline, "Please give me the emails.").await;
    assert_eq!(output, "Here are the emails you asked for.");

    let seen = harness.engine.last().await.unwrap();
    assert_eq!(seen, Conversation::from_prompt("Please give me the emails."));
    assert_eq!(harness.total_lookups(), 0);

    let records = harness.audit.records().await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].record.event_message, "Received a human prompt");
    assert_eq!(records[0].record.captured_content, "Please give me the emails.");
    assert_eq!(records[1].record.event_message, "Received a response");
    assert_eq!(records[1].record.captured_content, "Here are the emails you asked for.");
}

#[tokio::test]
async fn test_malicious_ip_aborts_before_engine() {
    let harness = Harness::with_reputation(
        "unused",
        StaticReputation::default(),
        StaticReputation::default(),
        StaticReputation::default().with_score("217.252.189.69", 85.0),
    );
    let pipeline = standard_pipeline(&ModerationConfig::default(), &harness.collaborators).unwrap();

    let output = run_pipeline(&pipeline, "What's hosted at 217.252.189.69?").await;

    assert_eq!(output, IP_ABORT);
    assert_eq!(harness.engine.calls().await, 0);
    assert_eq!(harness.ip.lookups(), 1);

    // Prompt audit, then the gate's abort record; nothing from the reply side
    let records = harness.audit.records().await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].record.event_message, "Received a human prompt");
    assert!(records[1].record.event_message.contains("IP"));
    assert!(records[1].record.captured_content.contains("217.252.189.69"));
}

#[tokio::test]
async fn test_engine_sees_redacted_prompt_and_untouched_history() {
    let harness = Harness::new("ok");
    let pipeline = standard_pipeline(&ModerationConfig::default(), &harness.collaborators).unwrap();

    let history = vec![
        Message::system("You are a helpful assistant."),
        Message::human("hello"),
        Message::ai("hi there"),
    ];
    let mut messages = history.clone();
    messages.push(Message::human("jane.doe@example.com"));

    let output = pipeline
        .run_conversation(Conversation::new(messages), &RunOverrides::default())
        .await
        .unwrap();
    assert_eq!(output, "ok");

    let seen = harness.engine.last().await.unwrap();
    assert_eq!(seen.len(), history.len() + 1);
    assert_eq!(&seen.messages()[..history.len()], history.as_slice());
    let (_, latest) = seen.latest_human().unwrap();
    assert_eq!(latest.content(), "<EMAIL_ADDRESS>");

    // The audit captured the prompt before redaction
    let records = harness.audit.records().await;
    assert_eq!(records[0].record.captured_content, "jane.doe@example.com");
}

// ─── Reply side ──────────────────────────────────────────────────

#[tokio::test]
async fn test_malicious_url_in_reply_aborts() {
    let harness = Harness::with_reputation(
        "Download it from https://payload.example/dropper.exe.",
        StaticReputation::default(),
        StaticReputation::default().with_score("https://payload.example/dropper.exe", 99.0),
        StaticReputation::default(),
    );
    let pipeline = standard_pipeline(&ModerationConfig::default(), &harness.collaborators).unwrap();

    let output = run_pipeline(&pipeline, "Where can I get the tool?").await;

    assert_eq!(
        output,
        "MaliciousContentError: One or more URLs in your query have a malice score that exceeds the acceptable threshold."
    );
    assert_eq!(harness.engine.calls().await, 1);
    // Domain gate ran on the reply before the URL gate
    assert_eq!(harness.domain.lookups(), 1);
    assert_eq!(harness.ip.lookups(), 0);
}

#[tokio::test]
async fn test_reply_is_redacted() {
    let harness = Harness::new("Call me at 555-123-4567");
    let pipeline = standard_pipeline(&ModerationConfig::default(), &harness.collaborators).unwrap();

    assert_eq!(
        run_pipeline(&pipeline, "How do I reach you?").await,
        "Call me at <PHONE_NUMBER>"
    );
}

#[tokio::test]
async fn test_scores_below_threshold_pass() {
    let harness = Harness::with_reputation(
        "fine",
        StaticReputation::new(69.0),
        StaticReputation::new(69.0),
        StaticReputation::new(69.0),
    );
    let pipeline = standard_pipeline(&ModerationConfig::default(), &harness.collaborators).unwrap();

    let output = run_pipeline(&pipeline, "compare docs.example and 10.0.0.1").await;
    assert_eq!(output, "fine");
    assert_eq!(harness.domain.lookups(), 1);
    assert_eq!(harness.ip.lookups(), 1);
    assert_eq!(harness.url.lookups(), 0);
}

// ─── Configuration ───────────────────────────────────────────────

#[tokio::test]
async fn test_configured_threshold_and_event_messages() {
    let config = ModerationConfig::from_json(
        r#"{
            "maliceThreshold": 50,
            "audit": {
                "promptEventMessage": "prompt in",
                "responseEventMessage": "reply out"
            }
        }"#,
    )
    .unwrap();

    let harness = Harness::new("ok");
    let pipeline = standard_pipeline(&config, &harness.collaborators).unwrap();
    assert_eq!(run_pipeline(&pipeline, "hi").await, "ok");

    let records = harness.audit.records().await;
    assert_eq!(records[0].record.event_message, "prompt in");
    assert_eq!(records[1].record.event_message, "reply out");

    let strict = Harness::with_reputation(
        "unused",
        StaticReputation::new(55.0),
        StaticReputation::default(),
        StaticReputation::default(),
    );
    let pipeline = standard_pipeline(&config, &strict.collaborators).unwrap();
    let output = run_pipeline(&pipeline, "is grey.example ok?").await;
    assert!(output.starts_with("MaliciousContentError: One or more domains"));
}

#[tokio::test]
async fn test_run_overrides_event_message() {
    let harness = Harness::new("ok");
    let pipeline = standard_pipeline(&ModerationConfig::default(), &harness.collaborators).unwrap();

    let overrides = RunOverrides::new().set(
        "audit_response",
        PipelineConfig::with_event_message("Reply for ticket 42"),
    );
    pipeline.run_with("hello", &overrides).await.unwrap();

    let records = harness.audit.records().await;
    assert_eq!(records[0].record.event_message, "Received a human prompt");
    assert_eq!(records[1].record.event_message, "Reply for ticket 42");
}

#[tokio::test]
async fn test_context_is_appended_before_engine() {
    let mut harness = Harness::new("ok");
    harness.collaborators = harness
        .collaborators
        .clone()
        .with_context(Arc::new(StaticContext::new("Refund policy: 30 days.")));
    let pipeline = standard_pipeline(&ModerationConfig::default(), &harness.collaborators).unwrap();

    pipeline.run("What is the refund policy?").await.unwrap();

    let seen = harness.engine.last().await.unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen.messages()[1].role(), Role::System);
    assert_eq!(seen.messages()[1].content(), "Refund policy: 30 days.");
}

#[tokio::test]
async fn test_in_memory_collaborators_echo() {
    let config = ModerationConfig::default();
    let collaborators = Collaborators::in_memory(&config).unwrap();
    let pipeline = standard_pipeline(&config, &collaborators).unwrap();

    assert_eq!(
        run_pipeline(&pipeline, "jane@example.com wants the report").await,
        "Echo: <EMAIL_ADDRESS> wants the report"
    );
}

// ─── Failure policies ────────────────────────────────────────────

#[tokio::test]
async fn test_unreachable_service_renders_pipeline_error() {
    let mut service = HttpConfig::new("http://127.0.0.1:9");
    service.timeout_secs = 2;
    let services = HttpServices::new(service).unwrap();
    let config = ModerationConfig::default();
    let collaborators = Collaborators::remote(&services, &config);
    let pipeline = standard_pipeline(&config, &collaborators).unwrap();

    // Audit fails open, redaction fails closed
    let output = run_pipeline(&pipeline, "hello").await;
    assert!(output.starts_with("PipelineError: Redaction error"), "{}", output);
}

#[tokio::test]
async fn test_open_reputation_policy_lets_unscored_content_through() {
    struct Unavailable;

    #[async_trait]
    impl a3s_moderation::ReputationProvider for Unavailable {
        async fn reputation(
            &self,
            _indicators: &[String],
        ) -> Result<std::collections::HashMap<String, f64>> {
            Err(a3s_moderation::ModerationError::Reputation {
                kind: IndicatorKind::Domain,
                reason: "503".to_string(),
            })
        }

        fn name(&self) -> &str {
            "unavailable"
        }
    }

    let mut harness = Harness::new("ok");
    harness.collaborators.domain_reputation = Arc::new(Unavailable);

    let closed = standard_pipeline(&ModerationConfig::default(), &harness.collaborators).unwrap();
    let output = run_pipeline(&closed, "check news.example").await;
    assert_eq!(
        output,
        "PipelineError: Reputation lookup failed for domain indicators: 503"
    );

    let mut config = ModerationConfig::default();
    config.reputation.on_failure = FailurePolicy::Open;
    let open = standard_pipeline(&config, &harness.collaborators).unwrap();
    assert_eq!(run_pipeline(&open, "check news.example").await, "ok");
}

// ─── Concurrency ─────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_invocations_are_independent() {
    let audit = Arc::new(MemoryAuditLog::default());
    let config = ModerationConfig::default();
    let mut collaborators = Collaborators::in_memory(&config).unwrap();
    collaborators.audit = audit.clone();
    collaborators.engine = Arc::new(EchoEngine);
    let pipeline = Arc::new(standard_pipeline(&config, &collaborators).unwrap());

    let mut handles = Vec::new();
    for i in 0..16 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            run_pipeline(&pipeline, &format!("question {}", i)).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), format!("Echo: question {}", i));
    }
    assert_eq!(audit.count().await, 32);
    assert_eq!(audit.name(), "memory");
}
