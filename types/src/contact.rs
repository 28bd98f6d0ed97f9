//! Per-agent contact entries.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// How a contact entered an agent's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactSource {
    /// Seeded at spawn time: the agent's parent.
    Parent,
    /// Seeded by the runtime itself (e.g. the user channel for the root).
    System,
    /// Seeded at spawn time from the spawn request's collaborator list.
    Preset,
    /// Added later by another agent's introduction.
    Introduction,
}

/// One peer an agent is permitted to address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: AgentId,
    pub role: String,
    pub source: ContactSource,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub introduced_by: Option<AgentId>,
    pub added_at: SystemTime,
}

impl Contact {
    #[must_use]
    pub fn new(
        id: AgentId,
        role: impl Into<String>,
        source: ContactSource,
        added_at: SystemTime,
    ) -> Self {
        Self {
            id,
            role: role.into(),
            source,
            introduced_by: None,
            added_at,
        }
    }

    #[must_use]
    pub fn introduced_by(mut self, introducer: AgentId) -> Self {
        self.introduced_by = Some(introducer);
        self
    }
}
