//! Agent arena and shared runtime state.
//!
//! One [`Runtime`] instance owns everything the scheduler and turn engine
//! share: the bus, the cancellation manager, the contact registries, the
//! tool surface and the id-keyed agent arena. There are no globals; tests
//! construct as many independent runtimes as they like.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tokio::sync::Notify;

use hive_reasoning::ReasoningService;
use hive_tools::{ToolCtx, ToolRegistry};
use hive_types::{AgentId, ChatEntry, Contact, ContactSource, Envelope, NonEmptyString, TaskId};

use crate::bus::MessageBus;
use crate::cancel::{AbortReason, CancelManager, Scope, ScopeInvalidated};
use crate::config::EngineConfig;
use crate::contacts::ContactRegistry;
use crate::store::ConversationStore;

/// Whether an agent currently has a turn in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeStatus {
    Idle,
    Active,
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("agent '{0}' already exists")]
    DuplicateAgent(AgentId),
    #[error("parent '{parent}' of '{agent}' does not exist")]
    UnknownParent { agent: AgentId, parent: AgentId },
    #[error("failed to load stored history for '{agent}': {source}")]
    Store {
        agent: AgentId,
        source: crate::store::StoreError,
    },
}

struct AgentState {
    parent: Option<AgentId>,
    status: ComputeStatus,
    history: Vec<ChatEntry>,
    /// Messages that arrived while a turn was in flight; merged into the
    /// retry as interjections.
    interruptions: Vec<Envelope>,
    task_id: TaskId,
}

/// Shared state for one runtime instance.
pub struct Runtime {
    bus: MessageBus,
    cancel: CancelManager,
    contacts: ContactRegistry,
    agents: Mutex<HashMap<AgentId, AgentState>>,
    /// Signalled whenever a turn finishes, so the scheduler re-runs its
    /// bookkeeping without waiting out its tick.
    turn_wake: Notify,
    reasoner: Arc<dyn ReasoningService>,
    tools: ToolRegistry,
    tool_ctx: ToolCtx,
    store: Arc<dyn ConversationStore>,
    config: EngineConfig,
}

impl Runtime {
    #[must_use]
    pub fn new(
        reasoner: Arc<dyn ReasoningService>,
        store: Arc<dyn ConversationStore>,
        tools: ToolRegistry,
        tool_ctx: ToolCtx,
        config: EngineConfig,
    ) -> Self {
        Self {
            bus: MessageBus::new(),
            cancel: CancelManager::new(),
            contacts: ContactRegistry::new(),
            agents: Mutex::new(HashMap::new()),
            turn_wake: Notify::new(),
            reasoner,
            tools,
            tool_ctx,
            store,
            config,
        }
    }

    #[must_use]
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    #[must_use]
    pub fn cancel(&self) -> &CancelManager {
        &self.cancel
    }

    #[must_use]
    pub fn contacts(&self) -> &ContactRegistry {
        &self.contacts
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn reasoner(&self) -> &Arc<dyn ReasoningService> {
        &self.reasoner
    }

    pub(crate) fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub(crate) fn tool_ctx(&self) -> &ToolCtx {
        &self.tool_ctx
    }

    pub(crate) fn turn_wake(&self) -> &Notify {
        &self.turn_wake
    }

    /// Register a new agent: arena entry, contact registry seeded with the
    /// parent and presets, and history restored from the store (or seeded
    /// from the system prompt when nothing is stored).
    pub fn spawn_agent(
        &self,
        id: AgentId,
        parent: Option<AgentId>,
        presets: Vec<Contact>,
        system_prompt: Option<NonEmptyString>,
    ) -> Result<(), SpawnError> {
        let mut agents = self.agents.lock().expect("agents lock poisoned");
        if agents.contains_key(&id) {
            return Err(SpawnError::DuplicateAgent(id));
        }
        if let Some(parent) = &parent {
            if !agents.contains_key(parent) {
                return Err(SpawnError::UnknownParent {
                    agent: id,
                    parent: parent.clone(),
                });
            }
        }

        let stored = self.store.load(&id).map_err(|source| SpawnError::Store {
            agent: id.clone(),
            source,
        })?;
        let history = match stored {
            Some(history) => history,
            None => system_prompt
                .map(|prompt| vec![ChatEntry::system(prompt, SystemTime::now())])
                .unwrap_or_default(),
        };

        self.contacts.init_registry(&id, parent.as_ref(), presets);
        if parent.is_none() {
            // The root agent and the user channel start as each other's
            // only contact.
            let user = self.config.user_channel.clone();
            let now = SystemTime::now();
            self.contacts.add_contact(
                &id,
                Contact::new(user.clone(), "user", ContactSource::System, now),
            );
            self.contacts.init_registry(
                &user,
                None,
                vec![Contact::new(id.clone(), "root", ContactSource::System, now)],
            );
        }
        agents.insert(
            id.clone(),
            AgentState {
                parent,
                status: ComputeStatus::Idle,
                history,
                interruptions: Vec::new(),
                task_id: TaskId::generate(),
            },
        );
        tracing::info!(agent = %id, "agent spawned");
        Ok(())
    }

    /// Remove an agent entirely: abort any in-flight computation, drop its
    /// cancellation state and contact registry, and discard queued mail.
    /// Returns whether the agent existed.
    pub fn terminate_agent(&self, agent: &AgentId) -> bool {
        let existed = {
            let mut agents = self.agents.lock().expect("agents lock poisoned");
            agents.remove(agent).is_some()
        };
        if !existed {
            return false;
        }
        self.cancel.abort(agent, AbortReason::Termination);
        self.reasoner.abort(agent);
        self.cancel.clear(agent);
        self.contacts.remove_registry(agent);
        let dropped = self.bus.drain_queue(agent).len();
        tracing::info!(%agent, dropped, "agent terminated");
        self.turn_wake.notify_waiters();
        true
    }

    pub(crate) fn agent_ids(&self) -> Vec<AgentId> {
        let agents = self.agents.lock().expect("agents lock poisoned");
        agents.keys().cloned().collect()
    }

    #[must_use]
    pub fn agent_exists(&self, agent: &AgentId) -> bool {
        let agents = self.agents.lock().expect("agents lock poisoned");
        agents.contains_key(agent)
    }

    #[must_use]
    pub fn agent_status(&self, agent: &AgentId) -> Option<ComputeStatus> {
        let agents = self.agents.lock().expect("agents lock poisoned");
        agents.get(agent).map(|s| s.status)
    }

    #[must_use]
    pub fn history_snapshot(&self, agent: &AgentId) -> Option<Vec<ChatEntry>> {
        let agents = self.agents.lock().expect("agents lock poisoned");
        agents.get(agent).map(|s| s.history.clone())
    }

    pub(crate) fn parent_of(&self, agent: &AgentId) -> Option<AgentId> {
        let agents = self.agents.lock().expect("agents lock poisoned");
        agents.get(agent).and_then(|s| s.parent.clone())
    }

    pub(crate) fn task_id_of(&self, agent: &AgentId) -> Option<TaskId> {
        let agents = self.agents.lock().expect("agents lock poisoned");
        agents.get(agent).map(|s| s.task_id)
    }

    /// Flip an idle agent to active. Returns `false` (and changes nothing)
    /// if the agent is missing or already active.
    pub(crate) fn mark_active(&self, agent: &AgentId) -> bool {
        let mut agents = self.agents.lock().expect("agents lock poisoned");
        match agents.get_mut(agent) {
            Some(state) if state.status == ComputeStatus::Idle => {
                state.status = ComputeStatus::Active;
                true
            }
            _ => false,
        }
    }

    /// Mark the agent idle again and wake the scheduler.
    pub(crate) fn finish_turn(&self, agent: &AgentId) {
        {
            let mut agents = self.agents.lock().expect("agents lock poisoned");
            if let Some(state) = agents.get_mut(agent) {
                state.status = ComputeStatus::Idle;
            }
        }
        self.turn_wake.notify_waiters();
    }

    /// Buffer messages that arrived while the agent's turn was in flight.
    pub(crate) fn buffer_interruptions(&self, agent: &AgentId, envelopes: Vec<Envelope>) {
        let mut agents = self.agents.lock().expect("agents lock poisoned");
        if let Some(state) = agents.get_mut(agent) {
            state.interruptions.extend(envelopes);
        }
    }

    pub(crate) fn take_interruptions(&self, agent: &AgentId) -> Vec<Envelope> {
        let mut agents = self.agents.lock().expect("agents lock poisoned");
        agents
            .get_mut(agent)
            .map(|s| std::mem::take(&mut s.interruptions))
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn has_buffered_interruptions(&self, agent: &AgentId) -> bool {
        let agents = self.agents.lock().expect("agents lock poisoned");
        agents.get(agent).is_some_and(|s| !s.interruptions.is_empty())
    }

    /// Append entries to the agent's history, but only if the scope is
    /// still current. The check and the append happen under the arena lock
    /// so a result produced under a superseded epoch can never land.
    pub(crate) fn append_history(
        &self,
        scope: &Scope,
        entries: Vec<ChatEntry>,
    ) -> Result<(), ScopeInvalidated> {
        let mut agents = self.agents.lock().expect("agents lock poisoned");
        scope.assert_active()?;
        if let Some(state) = agents.get_mut(scope.agent()) {
            state.history.extend(entries);
            Ok(())
        } else {
            Err(ScopeInvalidated::Cleared)
        }
    }

    /// Replace the agent's history wholesale (compaction), gated on the
    /// scope like [`Self::append_history`].
    pub(crate) fn replace_history(
        &self,
        scope: &Scope,
        history: Vec<ChatEntry>,
    ) -> Result<(), ScopeInvalidated> {
        let mut agents = self.agents.lock().expect("agents lock poisoned");
        scope.assert_active()?;
        if let Some(state) = agents.get_mut(scope.agent()) {
            state.history = history;
            Ok(())
        } else {
            Err(ScopeInvalidated::Cleared)
        }
    }

    /// Persist the agent's current history snapshot. Failures are logged,
    /// not fatal: the in-memory history stays authoritative.
    pub(crate) fn persist_history(&self, agent: &AgentId) {
        let Some(history) = self.history_snapshot(agent) else {
            return;
        };
        if let Err(error) = self.store.persist(agent, &history) {
            tracing::warn!(%agent, %error, "failed to persist conversation");
        }
    }
}
