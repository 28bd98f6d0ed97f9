//! Bus message envelope.
//!
//! Envelopes are immutable once enqueued: the bus assigns the id and
//! timestamp, and consumers only ever read. Constructors take `SystemTime`
//! explicitly; callers own the clock.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, MessageId, TaskId};
use crate::proofs::NonEmptyString;

/// One message in flight between two agents (or an agent and an external
/// channel). The payload is opaque to the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    id: MessageId,
    from: AgentId,
    to: AgentId,
    payload: NonEmptyString,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    task_id: Option<TaskId>,
    created_at: SystemTime,
}

impl Envelope {
    #[must_use]
    pub fn new(
        id: MessageId,
        from: AgentId,
        to: AgentId,
        payload: NonEmptyString,
        task_id: Option<TaskId>,
        created_at: SystemTime,
    ) -> Self {
        Self {
            id,
            from,
            to,
            payload,
            task_id,
            created_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    #[must_use]
    pub fn from(&self) -> &AgentId {
        &self.from
    }

    #[must_use]
    pub fn to(&self) -> &AgentId {
        &self.to
    }

    #[must_use]
    pub fn payload(&self) -> &str {
        self.payload.as_str()
    }

    #[must_use]
    pub fn task_id(&self) -> Option<TaskId> {
        self.task_id
    }

    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}
