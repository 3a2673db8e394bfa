//! Remote JSON service collaborators
//!
//! One `HttpServices` handle shares a `reqwest::Client` across every
//! collaborator role. Endpoints, relative to `baseUrl`:
//!
//! - `POST /v1/audit/log` - `{"events": [AuditRecord]}`
//! - `POST /v1/redact` - `{"text"}` → `{"redactedText"?}`
//! - `POST /v1/reputation/{domain|url|ip}` - `{"indicators"}` → `{"scores"}`
//! - `POST /v1/generate` - `{"messages"}` → `{"content"}`

use super::{AuditLog, Redaction, Redactor, ReputationProvider, ResponseEngine};
use crate::error::{ModerationError, Result};
use crate::types::{AuditRecord, Conversation, IndicatorKind, Message};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// Service base URL (e.g., `https://moderation.internal`)
    pub base_url: String,

    /// Bearer token; `env:NAME` reads it from the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ModerationError::Config(format!(
                "service.baseUrl must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ModerationError::Config(
                "service.timeoutSecs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the bearer token, reading `env:NAME` references
    pub fn resolve_token(&self) -> Result<Option<String>> {
        match self.api_token.as_deref() {
            None => Ok(None),
            Some(token) => match token.strip_prefix("env:") {
                Some(var) => std::env::var(var).map(Some).map_err(|_| {
                    ModerationError::Config(format!(
                        "Environment variable '{}' for service.apiToken is not set",
                        var
                    ))
                }),
                None => Ok(Some(token.to_string())),
            },
        }
    }

    /// Join an endpoint path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

struct Inner {
    client: reqwest::Client,
    config: HttpConfig,
    token: Option<String>,
}

/// Shared handle to the remote moderation service
#[derive(Clone)]
pub struct HttpServices {
    inner: Arc<Inner>,
}

impl HttpServices {
    pub fn new(config: HttpConfig) -> Result<Self> {
        config.validate()?;
        let token = config.resolve_token()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        tracing::info!(base_url = %config.base_url, "Remote moderation service configured");

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                config,
                token,
            }),
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.inner.config
    }

    /// Reputation collaborator for one indicator kind
    pub fn reputation(&self, kind: IndicatorKind) -> HttpReputation {
        HttpReputation {
            services: self.clone(),
            kind,
        }
    }

    async fn send<B>(&self, path: &str, body: &B) -> std::result::Result<reqwest::Response, String>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.inner.config.endpoint(path);
        let mut request = self.inner.client.post(&url).json(body);
        if let Some(token) = &self.inner.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| format!("{}: {}", url, e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("{} returned {}: {}", url, status, text));
        }
        Ok(response)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> std::result::Result<R, String>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned + Send,
    {
        let response = self.send(path, body).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| format!("{}: invalid response body: {}", path, e))
    }
}

#[derive(Serialize)]
struct AuditLogRequest<'a> {
    events: &'a [AuditRecord],
}

#[derive(Serialize)]
struct RedactRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedactResponse {
    #[serde(default)]
    redacted_text: Option<String>,
}

#[derive(Serialize)]
struct ReputationRequest<'a> {
    indicators: &'a [String],
}

#[derive(Deserialize)]
struct ReputationResponse {
    #[serde(default)]
    scores: HashMap<String, f64>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct GenerateResponse {
    content: String,
}

#[async_trait]
impl AuditLog for HttpServices {
    async fn append(&self, records: Vec<AuditRecord>) -> Result<()> {
        self.send("v1/audit/log", &AuditLogRequest { events: &records })
            .await
            .map(|_| ())
            .map_err(ModerationError::AuditLog)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[async_trait]
impl Redactor for HttpServices {
    async fn redact(&self, text: &str) -> Result<Redaction> {
        let response: RedactResponse = self
            .post("v1/redact", &RedactRequest { text })
            .await
            .map_err(ModerationError::Redaction)?;
        Ok(Redaction {
            redacted_text: response.redacted_text,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[async_trait]
impl ResponseEngine for HttpServices {
    async fn generate(&self, conversation: &Conversation) -> Result<String> {
        let response: GenerateResponse = self
            .post(
                "v1/generate",
                &GenerateRequest {
                    messages: conversation.messages(),
                },
            )
            .await
            .map_err(ModerationError::Engine)?;
        Ok(response.content)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Reputation lookups for one indicator kind against the remote service
pub struct HttpReputation {
    services: HttpServices,
    kind: IndicatorKind,
}

#[async_trait]
impl ReputationProvider for HttpReputation {
    async fn reputation(&self, indicators: &[String]) -> Result<HashMap<String, f64>> {
        let path = format!("v1/reputation/{}", self.kind.as_str());
        let response: ReputationResponse = self
            .services
            .post(&path, &ReputationRequest { indicators })
            .await
            .map_err(|reason| ModerationError::Reputation {
                kind: self.kind,
                reason,
            })?;
        Ok(response.scores)
    }

    fn name(&self) -> &str {
        "http"
    }
}
