//! Tool collaborators - core types, helpers, and built-in tool implementations.
//!
//! Every tool returns a structured result or a typed [`ToolError`]; raw
//! errors never cross into the turn engine. Policy rejections carry a
//! stable machine-readable code (`path_traversal_blocked`,
//! `command_blocked`, ...) so the engine can surface them to the requesting
//! tool call without string matching.

pub mod command_blacklist;
pub mod process;
pub mod registry;
pub mod shell;
pub mod workspace;

pub use command_blacklist::CommandBlacklist;
pub use registry::{SEND_MESSAGE_TOOL, ToolHandler, ToolRegistry};
pub use shell::ExecOutcome;
pub use workspace::Workspace;

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;

/// Error types for tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("bad tool args: {message}")]
    BadArgs { message: String },
    #[error("tool timed out after {elapsed:?}: {tool}")]
    Timeout { tool: String, elapsed: Duration },
    #[error("policy violation: {0}")]
    PolicyViolation(DenialReason),
    #[error("tool execution failed: {tool}: {message}")]
    ExecutionFailed { tool: String, message: String },
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("duplicate tool registered: {name}")]
    DuplicateTool { name: String },
}

impl ToolError {
    /// Stable machine-readable code for this error class.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::BadArgs { .. } => "bad_args",
            ToolError::Timeout { .. } => "command_timeout",
            ToolError::PolicyViolation(DenialReason::PathOutsideWorkspace { .. })
            | ToolError::PolicyViolation(DenialReason::DeniedPatternMatched { .. }) => {
                "path_traversal_blocked"
            }
            ToolError::PolicyViolation(DenialReason::CommandBlacklisted { .. }) => {
                "command_blocked"
            }
            ToolError::ExecutionFailed { .. } => "execution_failed",
            ToolError::UnknownTool { .. } => "unknown_tool",
            ToolError::DuplicateTool { .. } => "duplicate_tool",
        }
    }
}

/// Denial reason for workspace or command policy.
#[derive(Debug, Clone)]
pub enum DenialReason {
    PathOutsideWorkspace {
        attempted: PathBuf,
        resolved: PathBuf,
    },
    DeniedPatternMatched {
        attempted: PathBuf,
        pattern: String,
    },
    CommandBlacklisted {
        command: String,
        reason: String,
    },
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenialReason::PathOutsideWorkspace {
                attempted,
                resolved,
            } => write!(
                f,
                "path outside workspace (attempted: {}, resolved: {})",
                attempted.display(),
                resolved.display()
            ),
            DenialReason::DeniedPatternMatched { attempted, pattern } => write!(
                f,
                "path '{}' matched denied pattern '{}'",
                attempted.display(),
                pattern
            ),
            DenialReason::CommandBlacklisted { command, reason } => {
                write!(f, "command blocked: {reason} (command: {command})")
            }
        }
    }
}

/// Per-call tool context: the bound workspace plus execution limits.
#[derive(Debug, Clone)]
pub struct ToolCtx {
    pub workspace: Workspace,
    pub command_timeout: Duration,
    pub max_output_bytes: usize,
    pub command_blacklist: CommandBlacklist,
}

pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::BadArgs {
        message: e.to_string(),
    })
}

/// Validate arguments against a JSON schema.
pub fn validate_args(schema: &Value, args: &Value) -> Result<(), ToolError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ToolError::BadArgs {
        message: format!("invalid tool schema: {e}"),
    })?;
    if let Err(err) = validator.validate(args) {
        return Err(ToolError::BadArgs {
            message: err.to_string(),
        });
    }
    Ok(())
}

/// Truncate tool output to the effective maximum length.
#[must_use]
pub fn truncate_output(output: String, effective_max: usize) -> String {
    if output.len() <= effective_max {
        return output;
    }
    let marker = "\n\n... [output truncated]";
    if effective_max <= marker.len() {
        return marker[..effective_max].to_string();
    }
    let max_body = effective_max - marker.len();
    let mut end = max_body;
    while end > 0 && !output.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = output;
    truncated.truncate(end);
    truncated.push_str(marker);
    truncated
}
