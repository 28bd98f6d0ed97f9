//! Context budgeting and best-effort history compaction.
//!
//! Token counts are estimated from byte length; the limits in
//! [`crate::config::EngineConfig`] are calibrated for that estimate, not
//! for provider-exact tokenization.

use std::time::SystemTime;

use hive_reasoning::ChatRequest;
use hive_types::{ChatEntry, NonEmptyString};

use crate::cancel::Scope;
use crate::runtime::Runtime;

/// Per-entry overhead covering role framing and structural tokens.
const ENTRY_OVERHEAD: usize = 8;

const SUMMARY_INSTRUCTION: &str = "Summarize the conversation above into a compact brief that \
     preserves goals, decisions, open work and important facts. Reply with the summary only.";

/// Rough token estimate for a history: ~4 bytes per token plus a fixed
/// per-entry overhead.
#[must_use]
pub(crate) fn estimated_tokens(entries: &[ChatEntry]) -> usize {
    entries
        .iter()
        .map(|e| e.content().len() / 4 + ENTRY_OVERHEAD)
        .sum()
}

/// Compact the agent's history when it exceeds the soft limit: everything
/// except the most recent entries is replaced by a single summary entry.
///
/// Best-effort only. A summarization failure (or a scope invalidated while
/// summarizing) leaves the history untouched; the hard-limit gate in the
/// turn engine is the backstop.
pub(crate) async fn maybe_compact(rt: &Runtime, scope: &Scope) {
    let config = rt.config();
    let Some(history) = rt.history_snapshot(scope.agent()) else {
        return;
    };
    if estimated_tokens(&history) <= config.soft_context_limit {
        return;
    }
    if history.len() <= config.compaction_keep_recent {
        return;
    }

    let split = history.len() - config.compaction_keep_recent;
    let (older, recent) = history.split_at(split);

    let Ok(instruction) = NonEmptyString::new(SUMMARY_INSTRUCTION) else {
        return;
    };
    let mut entries = older.to_vec();
    entries.push(ChatEntry::user(instruction, SystemTime::now()));
    let request = ChatRequest::new(entries, Vec::new());

    let response = match rt.reasoner().chat(request, scope.signal()).await {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(agent = %scope.agent(), %error, "compaction summarization failed");
            return;
        }
    };
    let Ok(summary) = NonEmptyString::new(format!("[conversation summary] {}", response.content))
    else {
        return;
    };

    let mut compacted = vec![ChatEntry::system(summary, SystemTime::now())];
    compacted.extend_from_slice(recent);
    let replaced = compacted.len();
    if rt.replace_history(scope, compacted).is_ok() {
        tracing::info!(
            agent = %scope.agent(),
            before = history.len(),
            after = replaced,
            "history compacted"
        );
    }
}
