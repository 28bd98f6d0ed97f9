//! Per-agent contact registries.
//!
//! A registry is the allow-list of peers an agent may address. It is read
//! concurrently by any turn and mutated only through appends; entries are
//! never removed during normal operation.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::SystemTime;

use hive_types::{AgentId, Contact, ContactSource};

/// Outbound send rejection.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SendDenied {
    #[error("sender '{0}' has no contact registry")]
    SenderNotFound(AgentId),
    #[error("'{recipient}' is not a contact of '{sender}'")]
    UnknownContact { sender: AgentId, recipient: AgentId },
}

impl SendDenied {
    /// Stable machine-readable code for this rejection.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SendDenied::SenderNotFound(_) => "sender_not_found",
            SendDenied::UnknownContact { .. } => "unknown_contact",
        }
    }
}

#[derive(Default)]
pub struct ContactRegistry {
    inner: RwLock<HashMap<AgentId, Vec<Contact>>>,
}

impl ContactRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an agent's registry: its parent (when present) plus preset
    /// collaborators, deduplicated by id. Replaces any existing registry
    /// for the agent.
    pub fn init_registry(
        &self,
        agent: &AgentId,
        parent: Option<&AgentId>,
        presets: Vec<Contact>,
    ) {
        let mut contacts: Vec<Contact> = Vec::new();
        if let Some(parent) = parent {
            contacts.push(Contact::new(
                parent.clone(),
                "parent",
                ContactSource::Parent,
                SystemTime::now(),
            ));
        }
        for preset in presets {
            if !contacts.iter().any(|c| c.id == preset.id) {
                contacts.push(preset);
            }
        }
        let mut inner = self.inner.write().expect("contacts lock poisoned");
        inner.insert(agent.clone(), contacts);
    }

    /// Append a contact, ignoring duplicates by id. Creates the registry if
    /// the agent has none yet.
    pub fn add_contact(&self, agent: &AgentId, contact: Contact) {
        let mut inner = self.inner.write().expect("contacts lock poisoned");
        let contacts = inner.entry(agent.clone()).or_default();
        if !contacts.iter().any(|c| c.id == contact.id) {
            contacts.push(contact);
        }
    }

    /// The agent's contacts in insertion order (empty if no registry).
    pub fn list_contacts(&self, agent: &AgentId) -> Vec<Contact> {
        let inner = self.inner.read().expect("contacts lock poisoned");
        inner.get(agent).cloned().unwrap_or_default()
    }

    /// Gate an outbound send. Invoked on every send performed through a
    /// tool call, never bypassed.
    pub fn can_send_message(&self, sender: &AgentId, recipient: &AgentId) -> Result<(), SendDenied> {
        let inner = self.inner.read().expect("contacts lock poisoned");
        let contacts = inner
            .get(sender)
            .ok_or_else(|| SendDenied::SenderNotFound(sender.clone()))?;
        if contacts.iter().any(|c| c.id == *recipient) {
            Ok(())
        } else {
            Err(SendDenied::UnknownContact {
                sender: sender.clone(),
                recipient: recipient.clone(),
            })
        }
    }

    /// Drop an agent's registry entirely (on termination).
    pub fn remove_registry(&self, agent: &AgentId) {
        let mut inner = self.inner.write().expect("contacts lock poisoned");
        inner.remove(agent);
    }
}
