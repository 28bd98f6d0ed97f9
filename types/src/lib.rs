//! Core domain types for Hive.
//!
//! This crate contains pure domain types with no IO and no async. Everything
//! here can be used from any layer of the runtime.

mod chat;
mod contact;
mod envelope;
mod ids;
mod proofs;
mod tool;

pub use chat::{AssistantEntry, ChatEntry, InterjectionEntry, SystemEntry, UserEntry};
pub use contact::{Contact, ContactSource};
pub use envelope::Envelope;
pub use ids::{AgentId, MessageId, TaskId};
pub use proofs::{EmptyStringError, NonEmptyString};
pub use tool::{ToolCall, ToolDefinition, ToolResult};
