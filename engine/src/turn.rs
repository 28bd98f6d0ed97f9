//! Turn execution.
//!
//! A turn is one complete reaction to incoming messages: context build,
//! reasoning call, tool loop, repeat until the model settles on a text-only
//! response or a limit fires. The turn runs under a single
//! [`Scope`](crate::cancel::Scope) taken
//! at the start; every suspension point revalidates it, and any failure
//! discards the in-flight work without touching the conversation.
//!
//! `send_message` never reaches the tool executor: the engine intercepts
//! it here, gates the send through the contact registry, and feeds the
//! verdict back as an ordinary tool result.

use std::sync::Arc;
use std::time::SystemTime;

use serde::Deserialize;
use serde_json::json;

use hive_reasoning::{ChatRequest, ReasoningError};
use hive_tools::{SEND_MESSAGE_TOOL, truncate_output};
use hive_types::{AgentId, ChatEntry, Envelope, NonEmptyString, ToolCall, ToolResult};

use crate::compact;
use crate::runtime::Runtime;

/// How one turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model settled on a text-only response.
    Completed,
    /// The scope was invalidated mid-turn; nothing was applied past the
    /// invalidation point and the buffered input drives a retry.
    Discarded,
    /// The context exceeded the hard limit before any reasoning call.
    ContextRejected,
    /// The model was still requesting tools after the final allowed round.
    RoundLimitExceeded,
    /// The reasoning service failed for a reason other than cancellation.
    Failed,
}

/// The messages a turn reacts to, split by how they arrived.
pub(crate) struct TurnInput {
    /// Taken straight from the bus while the agent was idle.
    pub(crate) fresh: Vec<Envelope>,
    /// Buffered while a previous attempt of this turn was in flight.
    pub(crate) interjected: Vec<Envelope>,
}

impl TurnInput {
    pub(crate) fn is_empty(&self) -> bool {
        self.fresh.is_empty() && self.interjected.is_empty()
    }
}

fn merge_payloads(envelopes: &[Envelope]) -> Option<NonEmptyString> {
    let merged = envelopes
        .iter()
        .map(|e| format!("[from {}] {}", e.from(), e.payload()))
        .collect::<Vec<_>>()
        .join("\n");
    NonEmptyString::new(merged).ok()
}

/// Execute one turn for `agent`. The caller (the scheduler) has already
/// marked the agent active and calls `finish_turn` when this returns.
pub(crate) async fn run_turn(rt: Arc<Runtime>, agent: AgentId, input: TurnInput) -> TurnOutcome {
    let scope = rt.cancel().new_scope(&agent);
    tracing::debug!(%agent, epoch = scope.epoch(), "turn started");

    let mut entries = Vec::new();
    if let Some(content) = merge_payloads(&input.interjected) {
        entries.push(ChatEntry::interjection(content, SystemTime::now()));
    }
    if let Some(content) = merge_payloads(&input.fresh) {
        entries.push(ChatEntry::user(content, SystemTime::now()));
    }
    if rt.append_history(&scope, entries).is_err() {
        return TurnOutcome::Discarded;
    }

    compact::maybe_compact(&rt, &scope).await;
    if scope.assert_active().is_err() {
        return TurnOutcome::Discarded;
    }

    let Some(history) = rt.history_snapshot(&agent) else {
        return TurnOutcome::Discarded;
    };
    let estimate = compact::estimated_tokens(&history);
    if estimate > rt.config().hard_context_limit {
        tracing::warn!(%agent, estimate, "context over hard limit, turn rejected");
        notify_parent(
            &rt,
            &agent,
            "context_limit_exceeded",
            format!(
                "estimated context of {estimate} tokens exceeds the hard limit of {}",
                rt.config().hard_context_limit
            ),
        );
        rt.persist_history(&agent);
        return TurnOutcome::ContextRejected;
    }

    let max_rounds = rt.config().max_tool_rounds;
    for round in 1..=max_rounds {
        let Some(snapshot) = rt.history_snapshot(&agent) else {
            return TurnOutcome::Discarded;
        };
        let request = ChatRequest::new(snapshot, rt.tools().definitions());
        let response = match rt.reasoner().chat(request, scope.signal()).await {
            Ok(response) => response,
            Err(ReasoningError::Cancelled) => return TurnOutcome::Discarded,
            Err(error) => {
                if scope.assert_active().is_err() {
                    return TurnOutcome::Discarded;
                }
                tracing::warn!(%agent, %error, "reasoning call failed");
                notify_parent(&rt, &agent, "reasoning_failed", error.to_string());
                return TurnOutcome::Failed;
            }
        };
        if scope.assert_active().is_err() {
            return TurnOutcome::Discarded;
        }

        let mut entries = Vec::new();
        if let Ok(content) = NonEmptyString::new(response.content.clone()) {
            entries.push(ChatEntry::assistant(content, SystemTime::now()));
        }
        for call in &response.tool_calls {
            entries.push(ChatEntry::tool_use(call.clone()));
        }
        if rt.append_history(&scope, entries).is_err() {
            return TurnOutcome::Discarded;
        }

        if response.tool_calls.is_empty() {
            rt.persist_history(&agent);
            tracing::debug!(%agent, round, "turn completed");
            return TurnOutcome::Completed;
        }

        for call in &response.tool_calls {
            if scope.assert_active().is_err() {
                return TurnOutcome::Discarded;
            }
            let result = execute_tool(&rt, &agent, call).await;
            // append_history re-checks the scope, so a result that raced an
            // abort is dropped here rather than applied.
            if rt
                .append_history(&scope, vec![ChatEntry::tool_result(result)])
                .is_err()
            {
                return TurnOutcome::Discarded;
            }
        }

        if round == max_rounds {
            tracing::warn!(%agent, max_rounds, "tool round limit reached");
            notify_parent(
                &rt,
                &agent,
                "max_tool_rounds_exceeded",
                format!("still requesting tools after {max_rounds} reasoning rounds"),
            );
            rt.persist_history(&agent);
            return TurnOutcome::RoundLimitExceeded;
        }
    }

    // Only reachable with a zero round budget.
    notify_parent(
        &rt,
        &agent,
        "max_tool_rounds_exceeded",
        "no reasoning rounds permitted".to_string(),
    );
    TurnOutcome::RoundLimitExceeded
}

#[derive(Deserialize)]
struct SendMessageArgs {
    to: String,
    content: String,
}

async fn execute_tool(rt: &Runtime, agent: &AgentId, call: &ToolCall) -> ToolResult {
    if call.name == SEND_MESSAGE_TOOL {
        return intercept_send_message(rt, agent, call);
    }
    match rt.tools().execute(call, rt.tool_ctx()).await {
        Ok(output) => ToolResult::ok(
            &call.id,
            &call.name,
            truncate_output(output, rt.config().max_tool_output_bytes),
        ),
        Err(error) => {
            tracing::debug!(%agent, tool = %call.name, code = error.code(), "tool call failed");
            ToolResult::error(&call.id, &call.name, format!("{}: {error}", error.code()))
        }
    }
}

fn intercept_send_message(rt: &Runtime, agent: &AgentId, call: &ToolCall) -> ToolResult {
    let args: SendMessageArgs = match serde_json::from_value(call.arguments.clone()) {
        Ok(args) => args,
        Err(error) => {
            return ToolResult::error(&call.id, &call.name, format!("bad_args: {error}"));
        }
    };
    let Ok(payload) = NonEmptyString::new(args.content) else {
        return ToolResult::error(&call.id, &call.name, "bad_args: content must not be empty");
    };
    let recipient = AgentId::new(args.to);

    if let Err(denied) = rt.contacts().can_send_message(agent, &recipient) {
        tracing::debug!(%agent, %recipient, code = denied.code(), "send denied");
        return ToolResult::error(&call.id, &call.name, format!("{}: {denied}", denied.code()));
    }

    let id = rt
        .bus()
        .send(agent.clone(), recipient.clone(), payload, rt.task_id_of(agent));
    ToolResult::ok(
        &call.id,
        &call.name,
        format!("message {id} delivered to {recipient}"),
    )
}

fn notify_parent(rt: &Runtime, agent: &AgentId, kind: &str, detail: String) {
    let Some(parent) = rt.parent_of(agent) else {
        tracing::warn!(%agent, kind, detail, "notification for parentless agent");
        return;
    };
    let payload = json!({
        "type": kind,
        "agent": agent,
        "detail": detail,
    })
    .to_string();
    match NonEmptyString::new(payload) {
        Ok(payload) => {
            rt.bus()
                .send(agent.clone(), parent, payload, rt.task_id_of(agent));
        }
        Err(_) => tracing::error!(%agent, kind, "empty notification payload"),
    }
}
