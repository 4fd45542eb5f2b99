use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::models::InboundMessage;

/// AgentError
///
/// Everything that can go wrong while asking the agent service for a reply. None of
/// these ever reach Twilio; the webhook boundary turns them into the apology reply.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent service unreachable: {0}")]
    Transport(String),
    #[error("agent service answered with status {0}")]
    Status(u16),
    #[error("agent reply could not be decoded: {0}")]
    Decode(String),
    #[error("simulated agent failure")]
    Simulated,
}

// 1. AgentService Contract
/// AgentService
///
/// The opaque downstream that understands a citizen's message and writes the reply.
/// Handlers only see this trait, so the HTTP client (`HttpAgentService`) can be
/// swapped for the in-process mock (`MockAgentService`) in tests.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Produces the reply text for one inbound message.
    async fn generate_reply(&self, message: &InboundMessage) -> Result<String, AgentError>;
}

#[derive(Deserialize)]
struct AgentReply {
    reply: String,
}

// 2. The Real Implementation (HTTP)
/// HttpAgentService
///
/// Posts the inbound record as JSON to `{base_url}/process` and expects
/// `{"reply": "..."}` back.
#[derive(Clone)]
pub struct HttpAgentService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAgentService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/process", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AgentService for HttpAgentService {
    async fn generate_reply(&self, message: &InboundMessage) -> Result<String, AgentError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(message)
            .send()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Status(status.as_u16()));
        }

        let body = response
            .json::<AgentReply>()
            .await
            .map_err(|e| AgentError::Decode(e.to_string()))?;

        Ok(body.reply)
    }
}

// 3. The Mock Implementation (For Tests and Local Runs)
/// MockAgentService
///
/// Echoes the message back, or fails on every call when built with `new_failing`.
#[derive(Clone, Default)]
pub struct MockAgentService {
    /// When true, all calls return `AgentError::Simulated`.
    pub should_fail: bool,
}

impl MockAgentService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl AgentService for MockAgentService {
    async fn generate_reply(&self, message: &InboundMessage) -> Result<String, AgentError> {
        if self.should_fail {
            return Err(AgentError::Simulated);
        }

        let greeting = message.profile_name().unwrap_or("there");
        Ok(format!("Hi {}, you said: {}", greeting, message.body()))
    }
}

/// AgentState
///
/// The shared handle to whichever agent implementation the app was started with.
pub type AgentState = Arc<dyn AgentService>;
