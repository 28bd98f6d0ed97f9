//! Reasoning-service boundary.
//!
//! The engine drives each agent turn through the [`ReasoningService`] trait
//! and never assumes more than "the call eventually settles or is
//! interrupted". Cancellation is advisory: the call is *asked* to stop via
//! the token, and the caller remains responsible for discarding stale
//! results regardless of whether the provider actually stopped.
//!
//! [`HttpReasoner`] is one concrete implementation (a non-streaming JSON
//! client for an Anthropic-style messages endpoint); tests substitute their
//! own scripted implementations.

mod http;

pub use http::{HttpReasoner, HttpReasonerConfig};

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use hive_types::{AgentId, ChatEntry, ToolCall, ToolDefinition};

/// One request to the reasoning service: the conversation so far plus the
/// tools the agent may invoke.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub entries: Vec<ChatEntry>,
    pub tools: Vec<ToolDefinition>,
}

impl ChatRequest {
    #[must_use]
    pub fn new(entries: Vec<ChatEntry>, tools: Vec<ToolDefinition>) -> Self {
        Self { entries, tools }
    }
}

/// Token consumption metrics, when the provider reports them.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct ApiUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A settled reasoning response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<ApiUsage>,
}

impl ChatResponse {
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            usage: None,
        }
    }

    #[must_use]
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            usage: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    /// The call observed its cancellation token and stopped early.
    #[error("reasoning call cancelled")]
    Cancelled,
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Reasoning call future type alias.
pub type ChatFut<'a> = Pin<Box<dyn Future<Output = Result<ChatResponse, ReasoningError>> + Send + 'a>>;

/// External reasoning/completion service.
pub trait ReasoningService: Send + Sync {
    /// Run one completion over the given context.
    ///
    /// Implementations should observe `cancel` and return
    /// [`ReasoningError::Cancelled`] promptly when it fires, but callers
    /// must not rely on that: stale-result discard happens at the call
    /// site either way.
    fn chat(&self, request: ChatRequest, cancel: CancellationToken) -> ChatFut<'_>;

    /// Best-effort out-of-band abort of an agent's in-flight call.
    ///
    /// Returns whether the implementation had anything to abort.
    fn abort(&self, agent: &AgentId) -> bool {
        let _ = agent;
        false
    }
}
