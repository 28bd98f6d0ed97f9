//! Engine configuration.

use std::time::Duration;

use hive_types::AgentId;

/// Limits and thresholds for the scheduler and turn engine.
///
/// Context limits are in estimated tokens (see [`crate::compact`]); the
/// soft limit triggers best-effort compaction, the hard limit rejects the
/// turn before any reasoning call is made.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum reasoning rounds per turn once tool calls start.
    pub max_tool_rounds: u32,
    /// Compaction is attempted above this estimated token count.
    pub soft_context_limit: usize,
    /// The turn is rejected above this estimated token count.
    pub hard_context_limit: usize,
    /// Entries kept verbatim at the tail during compaction.
    pub compaction_keep_recent: usize,
    /// Hard cap for one command execution.
    pub command_timeout: Duration,
    /// Byte budget for a single tool result fed back into the context.
    pub max_tool_output_bytes: usize,
    /// Upper bound on how long the scheduler blocks waiting for bus
    /// activity before re-running its bookkeeping step.
    pub scheduler_tick: Duration,
    /// Identifier of the external user channel. The root agent and this
    /// channel are seeded as each other's only initial contact.
    pub user_channel: AgentId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 8,
            soft_context_limit: 60_000,
            hard_context_limit: 100_000,
            compaction_keep_recent: 20,
            command_timeout: Duration::from_secs(60),
            max_tool_output_bytes: 48 * 1024,
            scheduler_tick: Duration::from_millis(250),
            user_channel: AgentId::new("user"),
        }
    }
}
