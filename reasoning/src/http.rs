//! Non-streaming HTTP client for an Anthropic-style messages endpoint.
//!
//! The concurrency core only ever consumes settled responses (stale ones
//! are discarded by the caller), so this adapter deliberately skips
//! streaming and delivers one JSON response per call.

use std::time::Duration;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use hive_types::{ChatEntry, ToolCall};

use crate::{ApiUsage, ChatFut, ChatRequest, ChatResponse, ReasoningError, ReasoningService};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 300;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

#[derive(Debug, Clone)]
pub struct HttpReasonerConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

/// HTTP-backed [`ReasoningService`].
pub struct HttpReasoner {
    client: reqwest::Client,
    config: HttpReasonerConfig,
}

impl HttpReasoner {
    pub fn new(config: HttpReasonerConfig) -> Result<Self, ReasoningError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .https_only(true)
            .build()
            .map_err(|e| ReasoningError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut system = String::new();
        // (role, content blocks); consecutive blocks of the same role merge
        // into one message.
        let mut messages: Vec<(&'static str, Vec<Value>)> = Vec::new();

        let mut push_block = |role: &'static str, block: Value| {
            match messages.last_mut() {
                Some((last_role, blocks)) if *last_role == role => blocks.push(block),
                _ => messages.push((role, vec![block])),
            }
        };

        for entry in &request.entries {
            match entry {
                ChatEntry::System(e) => {
                    if !system.is_empty() {
                        system.push_str("\n\n");
                    }
                    system.push_str(e.content());
                }
                ChatEntry::User(e) => {
                    push_block("user", json!({"type": "text", "text": e.content()}));
                }
                ChatEntry::Interjection(e) => {
                    push_block("user", json!({"type": "text", "text": e.content()}));
                }
                ChatEntry::Assistant(e) => {
                    push_block("assistant", json!({"type": "text", "text": e.content()}));
                }
                ChatEntry::ToolUse(call) => {
                    push_block(
                        "assistant",
                        json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments,
                        }),
                    );
                }
                ChatEntry::ToolResult(result) => {
                    push_block(
                        "user",
                        json!({
                            "type": "tool_result",
                            "tool_use_id": result.tool_call_id,
                            "content": result.content,
                            "is_error": result.is_error,
                        }),
                    );
                }
            }
        }

        let messages: Vec<Value> = messages
            .into_iter()
            .map(|(role, blocks)| json!({"role": role, "content": blocks}))
            .collect();

        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|def| {
                json!({
                    "name": def.name,
                    "description": def.description,
                    "input_schema": def.schema,
                })
            })
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = Value::String(system);
        }
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }
        body
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatResponse, ReasoningError> {
        let body = self.build_body(&request);
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| ReasoningError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            if message.len() > MAX_ERROR_BODY_BYTES {
                let mut end = MAX_ERROR_BODY_BYTES;
                while !message.is_char_boundary(end) {
                    end -= 1;
                }
                message.truncate(end);
            }
            return Err(ReasoningError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ReasoningError::Malformed(e.to_string()))?;
        parse_response(&payload)
    }
}

fn parse_response(payload: &Value) -> Result<ChatResponse, ReasoningError> {
    let blocks = payload
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ReasoningError::Malformed("missing content array".to_string()))?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    content.push_str(text);
                }
            }
            Some("tool_use") => {
                let id = block
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ReasoningError::Malformed("tool_use without id".to_string()))?;
                let name = block.get("name").and_then(Value::as_str).ok_or_else(|| {
                    ReasoningError::Malformed("tool_use without name".to_string())
                })?;
                let input = block.get("input").cloned().unwrap_or(Value::Null);
                tool_calls.push(ToolCall::new(id, name, input));
            }
            _ => {}
        }
    }

    let usage = payload.get("usage").map(|u| ApiUsage {
        input_tokens: u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
        output_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
    });

    Ok(ChatResponse {
        content,
        tool_calls,
        usage,
    })
}

impl ReasoningService for HttpReasoner {
    fn chat(&self, request: ChatRequest, cancel: CancellationToken) -> ChatFut<'_> {
        Box::pin(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("reasoning call cancelled before settling");
                    Err(ReasoningError::Cancelled)
                }
                result = self.send(request) => result,
            }
        })
    }
}
