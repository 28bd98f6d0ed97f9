//! Command blacklist for blocking known-dangerous commands.
//!
//! This is a regex-based list that **always denies** commands with no
//! legitimate use case for an autonomous agent: privilege escalation,
//! destructive filesystem operations, and machine shutdown/reboot.

use regex::RegexSet;

use super::{DenialReason, ToolError};

/// Default command blacklist patterns.
///
/// Each tuple: `(regex_pattern, human_readable_reason)`.
pub const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    // Privilege escalation
    (r"(?i)(?:^|[;&|]\s*)sudo\b", "privilege escalation via sudo"),
    (r"(?i)(?:^|[;&|]\s*)doas\b", "privilege escalation via doas"),
    (r"(?i)(?:^|[;&|]\s*)su\b(?:\s|$)", "privilege escalation via su"),
    // Root / home filesystem wipe. Weird casing (RM -RF /) suggests
    // prompt injection, so matching is case-insensitive.
    (
        r"(?i)\brm\s+-[a-z]*[rf][a-z]*[rf][a-z]*\s+(?:--\s+)?(?:/+\*?|~/?|\$HOME|\$\{HOME\})(?:\s|$|[&|;])",
        "attempting to delete root or home directory",
    ),
    // Fork bomb (bash)
    (r":\(\)\s*\{\s*:\|:&\s*\}\s*;:", "fork bomb detected"),
    // dd overwriting disk devices
    (
        r"(?i)\bdd\s+.*\bof=/dev/(?:sd|hd|nvme|vd|xvd|loop)\w*",
        "attempting to overwrite disk device",
    ),
    // mkfs on disk devices (formatting)
    (
        r"(?i)\bmkfs(?:\.\w+)?\s+/dev/\w+",
        "attempting to format disk device",
    ),
    // Recursive permission change on the root filesystem
    (
        r"(?i)\bchmod\s+-R\s+\S+\s+/(?:\s|$|[&|;])",
        "recursive permission change on root filesystem",
    ),
    // Machine shutdown / reboot
    (
        r"(?i)(?:^|[;&|]\s*)(?:shutdown|reboot|poweroff|halt)\b",
        "attempting to shut down or reboot the machine",
    ),
    (
        r"(?i)\bsystemctl\s+(?:poweroff|reboot|halt|suspend)\b",
        "attempting to shut down or reboot the machine",
    ),
    (r"(?i)(?:^|[;&|]\s*)init\s+0\b", "attempting to shut down the machine"),
];

/// Command blacklist validator.
///
/// Uses a `RegexSet` for multi-pattern matching in a single pass.
#[derive(Debug, Clone)]
pub struct CommandBlacklist {
    regex_set: RegexSet,
    /// Human-readable reasons, parallel to `regex_set` patterns.
    reasons: Vec<String>,
}

impl CommandBlacklist {
    pub fn new(patterns: &[(&str, &str)]) -> Result<Self, ToolError> {
        let mut reasons = Vec::with_capacity(patterns.len());
        let mut pattern_strs = Vec::with_capacity(patterns.len());
        for (pattern, reason) in patterns {
            pattern_strs.push(*pattern);
            reasons.push((*reason).to_string());
        }
        let regex_set = RegexSet::new(&pattern_strs).map_err(|e| ToolError::BadArgs {
            message: format!("failed to compile blacklist patterns: {e}"),
        })?;
        Ok(Self { regex_set, reasons })
    }

    pub fn with_defaults() -> Result<Self, ToolError> {
        Self::new(DEFAULT_PATTERNS)
    }

    /// Validate a command against the blacklist.
    pub fn validate(&self, command: &str) -> Result<(), ToolError> {
        if let Some(idx) = self.regex_set.matches(command).iter().next() {
            return Err(ToolError::PolicyViolation(
                DenialReason::CommandBlacklisted {
                    command: truncate_command(command, 100),
                    reason: self.reasons[idx].clone(),
                },
            ));
        }
        Ok(())
    }
}

/// Truncate command for error messages (avoid giant output).
fn truncate_command(cmd: &str, max_len: usize) -> String {
    if cmd.len() <= max_len {
        cmd.to_string()
    } else {
        let mut end = max_len;
        while end > 0 && !cmd.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &cmd[..end])
    }
}
