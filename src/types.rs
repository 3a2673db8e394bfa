//! Core value types flowing through a moderation pipeline
//!
//! All serializable types use camelCase JSON for wire compatibility.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a single message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    System,
    Ai,
}

/// One utterance in a conversation
///
/// Immutable once constructed; rewriting content produces a replacement
/// message via [`Message::with_content`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Build a replacement message with the same role and new content
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self::new(self.role, content)
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

/// Ordered, chronological sequence of messages (later messages are newer)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Wrap raw user text as a single-message conversation
    pub fn from_prompt(text: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::human(text)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Position and content of the last message authored by the human
    pub fn latest_human(&self) -> Option<(usize, &Message)> {
        self.messages
            .iter()
            .enumerate()
            .rev()
            .find(|(_, m)| m.role == Role::Human)
    }

    /// Replace the message at `index`, leaving every other message untouched.
    ///
    /// Out-of-range indexes leave the conversation unchanged.
    pub fn with_replaced(mut self, index: usize, message: Message) -> Self {
        if let Some(slot) = self.messages.get_mut(index) {
            *slot = message;
        }
        self
    }

    /// Append a message as the newest entry
    pub fn with_appended(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }
}

/// Which variant of [`StageInput`] a value is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Conversation,
    Reply,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversation => write!(f, "conversation"),
            Self::Reply => write!(f, "reply"),
        }
    }
}

/// Value handed from one stage to the next
///
/// Stages before the response engine see a conversation; stages after it
/// see the engine's single AI-authored reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageInput {
    Conversation(Conversation),
    Reply(Message),
}

impl StageInput {
    pub fn kind(&self) -> InputKind {
        match self {
            Self::Conversation(_) => InputKind::Conversation,
            Self::Reply(_) => InputKind::Reply,
        }
    }

    /// Text a stage should inspect: the latest human message of a
    /// conversation, or the reply's content.
    pub fn inspected_text(&self) -> Option<&str> {
        match self {
            Self::Conversation(conversation) => {
                conversation.latest_human().map(|(_, m)| m.content())
            }
            Self::Reply(reply) => Some(reply.content()),
        }
    }

    /// Substitute the inspected text, producing a new value of the same variant.
    ///
    /// A conversation without a human message is returned unchanged.
    pub fn with_inspected_text(self, text: impl Into<String>) -> Self {
        match self {
            Self::Conversation(conversation) => match conversation.latest_human() {
                Some((index, message)) => {
                    let replacement = message.with_content(text);
                    Self::Conversation(conversation.with_replaced(index, replacement))
                }
                None => Self::Conversation(conversation),
            },
            Self::Reply(reply) => Self::Reply(reply.with_content(text)),
        }
    }

    pub fn as_conversation(&self) -> Option<&Conversation> {
        match self {
            Self::Conversation(conversation) => Some(conversation),
            Self::Reply(_) => None,
        }
    }

    pub fn as_reply(&self) -> Option<&Message> {
        match self {
            Self::Reply(reply) => Some(reply),
            Self::Conversation(_) => None,
        }
    }
}

impl From<Conversation> for StageInput {
    fn from(conversation: Conversation) -> Self {
        Self::Conversation(conversation)
    }
}

/// Kind of network indicator scored by a threat-intelligence gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Domain,
    Url,
    Ip,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 3] = [Self::Domain, Self::Url, Self::Ip];

    /// Lowercase identifier used in stage names and service paths
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Url => "url",
            Self::Ip => "ip",
        }
    }

    /// Plural noun used in user-facing messages
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Domain => "domains",
            Self::Url => "URLs",
            Self::Ip => "IP addresses",
        }
    }

    /// Reason carried by the disqualifying-content error for this kind
    pub fn disqualifying_reason(&self) -> String {
        format!(
            "One or more {} in your query have a malice score that exceeds the acceptable threshold.",
            self.plural()
        )
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain => write!(f, "domain"),
            Self::Url => write!(f, "URL"),
            Self::Ip => write!(f, "IP"),
        }
    }
}

/// Reputation verdict for a single indicator
#[derive(Debug, Clone, PartialEq)]
pub struct ThreatFinding {
    pub indicator: String,
    pub score: f64,
    pub kind: IndicatorKind,
}

impl ThreatFinding {
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}

/// Record submitted to the audit-log collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub event_message: String,
    pub captured_content: String,
}

impl AuditRecord {
    pub fn new(event_message: impl Into<String>, captured_content: impl Into<String>) -> Self {
        Self {
            event_message: event_message.into(),
            captured_content: captured_content.into(),
        }
    }
}

/// Per-invocation override set handed to a stage alongside its input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Replaces the audit stage's default event message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_message: Option<String>,
}

impl PipelineConfig {
    pub fn with_event_message(event_message: impl Into<String>) -> Self {
        Self {
            event_message: Some(event_message.into()),
        }
    }

    /// Overlay `other` on top of `self`; fields set in `other` win
    pub fn merged(&self, other: &PipelineConfig) -> PipelineConfig {
        PipelineConfig {
            event_message: other
                .event_message
                .clone()
                .or_else(|| self.event_message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Conversation {
        Conversation::new(vec![
            Message::system("You are a helpful assistant."),
            Message::human("first question"),
            Message::ai("first answer"),
            Message::human("second question"),
            Message::system("retrieved context"),
        ])
    }

    #[test]
    fn test_latest_human_is_last_human_message() {
        let conversation = history();
        let (index, message) = conversation.latest_human().unwrap();
        assert_eq!(index, 3);
        assert_eq!(message.content(), "second question");
    }

    #[test]
    fn test_latest_human_absent() {
        let conversation = Conversation::new(vec![Message::system("only context")]);
        assert!(conversation.latest_human().is_none());
    }

    #[test]
    fn test_with_inspected_text_replaces_only_latest_human() {
        let original = history();
        let rewritten = StageInput::Conversation(original.clone()).with_inspected_text("rewritten");
        let rewritten = rewritten.as_conversation().unwrap();

        assert_eq!(rewritten.len(), original.len());
        let pairs = original.messages().iter().zip(rewritten.messages());
        for (i, (before, after)) in pairs.enumerate() {
            if i == 3 {
                assert_eq!(after.content(), "rewritten");
                assert_eq!(after.role(), Role::Human);
            } else {
                assert_eq!(before, after);
            }
        }
    }

    #[test]
    fn test_with_inspected_text_on_reply() {
        let reply = StageInput::Reply(Message::ai("hello"));
        let rewritten = reply.with_inspected_text("bye");
        assert_eq!(rewritten.as_reply().unwrap().content(), "bye");
        assert_eq!(rewritten.as_reply().unwrap().role(), Role::Ai);
    }

    #[test]
    fn test_with_appended_preserves_prefix() {
        let original = history();
        let extended = original.clone().with_appended(Message::system("extra"));
        assert_eq!(extended.len(), original.len() + 1);
        assert_eq!(&extended.messages()[..original.len()], original.messages());
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&Message::ai("hi")).unwrap();
        assert_eq!(json, r#"{"role":"ai","content":"hi"}"#);
    }

    #[test]
    fn test_audit_record_serialization() {
        let record = AuditRecord::new("Received a human prompt", "hello");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"eventMessage\":\"Received a human prompt\""));
        assert!(json.contains("\"capturedContent\":\"hello\""));
    }

    #[test]
    fn test_pipeline_config_merge() {
        let base = PipelineConfig::with_event_message("base");
        let empty = PipelineConfig::default();
        assert_eq!(base.merged(&empty).event_message.as_deref(), Some("base"));

        let overridden = base.merged(&PipelineConfig::with_event_message("override"));
        assert_eq!(overridden.event_message.as_deref(), Some("override"));
    }

    #[test]
    fn test_indicator_kind_labels() {
        assert_eq!(IndicatorKind::Domain.as_str(), "domain");
        assert_eq!(IndicatorKind::Url.to_string(), "URL");
        assert_eq!(
            IndicatorKind::Domain.disqualifying_reason(),
            "One or more domains in your query have a malice score that exceeds the acceptable threshold."
        );
        assert_eq!(serde_json::to_string(&IndicatorKind::Ip).unwrap(), "\"ip\"");
    }

    #[test]
    fn test_finding_threshold_is_inclusive() {
        let finding = ThreatFinding {
            indicator: "1.2.3.4".to_string(),
            score: 70.0,
            kind: IndicatorKind::Ip,
        };
        assert!(finding.exceeds(70.0));
        assert!(!finding.exceeds(70.5));
    }
}
