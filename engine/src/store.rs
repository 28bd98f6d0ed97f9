//! Conversation persistence.
//!
//! Histories are persisted at turn boundaries only; a turn discarded by an
//! interruption leaves the stored history exactly as it was.

use std::collections::HashMap;
use std::sync::Mutex;

use hive_types::{AgentId, ChatEntry};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend failed: {0}")]
    Backend(String),
}

/// Storage backend for agent conversation histories.
pub trait ConversationStore: Send + Sync {
    /// Persist a full snapshot of the agent's history.
    fn persist(&self, agent: &AgentId, history: &[ChatEntry]) -> Result<(), StoreError>;

    /// Load the last persisted snapshot, if any.
    fn load(&self, agent: &AgentId) -> Result<Option<Vec<ChatEntry>>, StoreError>;
}

/// Process-local store, the default backend.
#[derive(Default)]
pub struct InMemoryStore {
    histories: Mutex<HashMap<AgentId, Vec<ChatEntry>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for InMemoryStore {
    fn persist(&self, agent: &AgentId, history: &[ChatEntry]) -> Result<(), StoreError> {
        let mut histories = self.histories.lock().expect("store lock poisoned");
        histories.insert(agent.clone(), history.to_vec());
        Ok(())
    }

    fn load(&self, agent: &AgentId) -> Result<Option<Vec<ChatEntry>>, StoreError> {
        let histories = self.histories.lock().expect("store lock poisoned");
        Ok(histories.get(agent).cloned())
    }
}
