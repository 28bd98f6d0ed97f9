//! Per-agent cancellation epochs.
//!
//! The manager is the single source of truth for "is this computation still
//! valid?". Every suspending external call captures a [`Scope`] first and
//! calls [`Scope::assert_active`] immediately after resuming; a failed
//! check means the result must be discarded with no conversation mutation
//! and no tool side effects.
//!
//! Cancellation is advisory towards the in-flight call (the token *asks* it
//! to stop) but authoritative for result application: the epoch comparison
//! decides, regardless of whether the call actually stopped.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use hive_types::AgentId;

/// Why an agent's computation was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// A new message arrived while a turn was in flight.
    MessageInterruption,
    /// The agent is being terminated.
    Termination,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::MessageInterruption => f.write_str("message_interruption"),
            AbortReason::Termination => f.write_str("termination"),
        }
    }
}

/// Receipt for one abort: the new live epoch and the reason.
#[derive(Debug, Clone)]
pub struct Aborted {
    pub epoch: u64,
    pub reason: AbortReason,
}

/// Why a scope is no longer current.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScopeInvalidated {
    #[error("epoch advanced (held {held}, live {live})")]
    EpochAdvanced { held: u64, live: u64 },
    #[error("cancellation signal triggered")]
    Cancelled,
    #[error("agent cancellation state cleared")]
    Cleared,
}

#[derive(Default)]
struct AgentCancel {
    epoch: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Shared {
    agents: Mutex<HashMap<AgentId, AgentCancel>>,
}

/// Per-agent epoch and signal bookkeeping. Cheap to clone; all clones share
/// state.
#[derive(Clone, Default)]
pub struct CancelManager {
    shared: Arc<Shared>,
}

impl CancelManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch for an agent, lazily initialized to 0.
    pub fn epoch(&self, agent: &AgentId) -> u64 {
        let mut agents = self.shared.agents.lock().expect("cancel lock poisoned");
        agents.entry(agent.clone()).or_default().epoch
    }

    /// The agent's current cancellation signal.
    pub fn signal(&self, agent: &AgentId) -> CancellationToken {
        let mut agents = self.shared.agents.lock().expect("cancel lock poisoned");
        agents.entry(agent.clone()).or_default().token.clone()
    }

    /// Capture the current epoch/signal pair for one computation attempt.
    pub fn new_scope(&self, agent: &AgentId) -> Scope {
        let mut agents = self.shared.agents.lock().expect("cancel lock poisoned");
        let state = agents.entry(agent.clone()).or_default();
        Scope {
            agent: agent.clone(),
            epoch: state.epoch,
            token: state.token.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Invalidate the agent's current computation: bump the epoch, trigger
    /// the live signal (best-effort notification to whatever is listening)
    /// and install a fresh signal for the next scope.
    pub fn abort(&self, agent: &AgentId, reason: AbortReason) -> Aborted {
        let epoch = {
            let mut agents = self.shared.agents.lock().expect("cancel lock poisoned");
            let state = agents.entry(agent.clone()).or_default();
            state.epoch += 1;
            let stale = std::mem::replace(&mut state.token, CancellationToken::new());
            stale.cancel();
            state.epoch
        };
        tracing::debug!(%agent, epoch, %reason, "computation aborted");
        Aborted { epoch, reason }
    }

    /// Drop all cancellation state for an agent (on termination).
    pub fn clear(&self, agent: &AgentId) {
        let mut agents = self.shared.agents.lock().expect("cancel lock poisoned");
        agents.remove(agent);
    }
}

/// An epoch/signal snapshot taken at the start of an operation; never
/// persisted, lifetime bounded to one computation attempt.
#[derive(Clone)]
pub struct Scope {
    agent: AgentId,
    epoch: u64,
    token: CancellationToken,
    shared: Arc<Shared>,
}

impl Scope {
    #[must_use]
    pub fn agent(&self) -> &AgentId {
        &self.agent
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The captured signal, for handing to a suspending call.
    #[must_use]
    pub fn signal(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fails iff the agent's live epoch no longer equals the captured one,
    /// or the captured signal has since been triggered.
    pub fn assert_active(&self) -> Result<(), ScopeInvalidated> {
        if self.token.is_cancelled() {
            return Err(ScopeInvalidated::Cancelled);
        }
        let agents = self.shared.agents.lock().expect("cancel lock poisoned");
        match agents.get(&self.agent) {
            None => Err(ScopeInvalidated::Cleared),
            Some(state) if state.epoch != self.epoch => Err(ScopeInvalidated::EpochAdvanced {
                held: self.epoch,
                live: state.epoch,
            }),
            Some(_) => Ok(()),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("agent", &self.agent)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
