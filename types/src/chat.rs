//! Conversation history entries.
//!
//! A conversation is an append-only list of `ChatEntry` values, mutated only
//! by the owning agent's active turn. This is a real sum type (not a `Role`
//! tag + "sometimes-meaningful" fields).

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::proofs::NonEmptyString;
use crate::tool::{ToolCall, ToolResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEntry {
    content: NonEmptyString,
    timestamp: SystemTime,
}

impl SystemEntry {
    #[must_use]
    pub fn new(content: NonEmptyString, timestamp: SystemTime) -> Self {
        Self { content, timestamp }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        self.content.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    content: NonEmptyString,
    timestamp: SystemTime,
}

impl UserEntry {
    #[must_use]
    pub fn new(content: NonEmptyString, timestamp: SystemTime) -> Self {
        Self { content, timestamp }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        self.content.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantEntry {
    content: NonEmptyString,
    timestamp: SystemTime,
}

impl AssistantEntry {
    #[must_use]
    pub fn new(content: NonEmptyString, timestamp: SystemTime) -> Self {
        Self { content, timestamp }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        self.content.as_str()
    }
}

/// Input that arrived while a previous attempt of this turn was in flight.
///
/// This is separate from `UserEntry` so the model (and anything replaying
/// the history) can tell that the preceding computation was interrupted and
/// superseded by this content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterjectionEntry {
    content: NonEmptyString,
    timestamp: SystemTime,
}

impl InterjectionEntry {
    #[must_use]
    pub fn new(content: NonEmptyString, timestamp: SystemTime) -> Self {
        Self { content, timestamp }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        self.content.as_str()
    }
}

/// A complete conversation entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChatEntry {
    System(SystemEntry),
    User(UserEntry),
    Assistant(AssistantEntry),
    Interjection(InterjectionEntry),
    ToolUse(ToolCall),
    ToolResult(ToolResult),
}

impl ChatEntry {
    #[must_use]
    pub fn system(content: NonEmptyString, timestamp: SystemTime) -> Self {
        Self::System(SystemEntry::new(content, timestamp))
    }

    #[must_use]
    pub fn user(content: NonEmptyString, timestamp: SystemTime) -> Self {
        Self::User(UserEntry::new(content, timestamp))
    }

    #[must_use]
    pub fn assistant(content: NonEmptyString, timestamp: SystemTime) -> Self {
        Self::Assistant(AssistantEntry::new(content, timestamp))
    }

    #[must_use]
    pub fn interjection(content: NonEmptyString, timestamp: SystemTime) -> Self {
        Self::Interjection(InterjectionEntry::new(content, timestamp))
    }

    #[must_use]
    pub fn tool_use(call: ToolCall) -> Self {
        Self::ToolUse(call)
    }

    #[must_use]
    pub fn tool_result(result: ToolResult) -> Self {
        Self::ToolResult(result)
    }

    #[must_use]
    pub fn role_str(&self) -> &'static str {
        match self {
            ChatEntry::System(_) => "system",
            ChatEntry::User(_) | ChatEntry::Interjection(_) | ChatEntry::ToolResult(_) => "user",
            ChatEntry::Assistant(_) | ChatEntry::ToolUse(_) => "assistant",
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            ChatEntry::System(e) => e.content(),
            ChatEntry::User(e) => e.content(),
            ChatEntry::Assistant(e) => e.content(),
            ChatEntry::Interjection(e) => e.content(),
            ChatEntry::ToolUse(call) => &call.name,
            ChatEntry::ToolResult(result) => &result.content,
        }
    }

    #[must_use]
    pub fn is_interjection(&self) -> bool {
        matches!(self, ChatEntry::Interjection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> NonEmptyString {
        NonEmptyString::new(s).unwrap()
    }

    #[test]
    fn role_mapping() {
        let now = SystemTime::UNIX_EPOCH;
        assert_eq!(ChatEntry::system(text("s"), now).role_str(), "system");
        assert_eq!(ChatEntry::user(text("u"), now).role_str(), "user");
        assert_eq!(ChatEntry::assistant(text("a"), now).role_str(), "assistant");
        assert_eq!(ChatEntry::interjection(text("i"), now).role_str(), "user");
    }

    #[test]
    fn interjection_is_distinguishable() {
        let now = SystemTime::UNIX_EPOCH;
        assert!(ChatEntry::interjection(text("new input"), now).is_interjection());
        assert!(!ChatEntry::user(text("plain input"), now).is_interjection());
    }
}
