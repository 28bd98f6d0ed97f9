//! Workspace filesystem sandbox.
//!
//! Every file operation resolves its path against the bound workspace root
//! and rejects anything that would escape it, before touching the
//! filesystem. Deny patterns additionally block key material and secrets
//! even inside the root.

use std::path::{Component, Path, PathBuf};

use super::{DenialReason, ToolError};

/// Default deny patterns for sensitive files inside the workspace.
pub const DEFAULT_DENY_PATTERNS: &[&str] = &[
    "**/.ssh/**",
    "**/.gnupg/**",
    "**/.aws/**",
    "**/.git-credentials",
    "**/.netrc",
    "**/.env",
    "**/.env.*",
    "**/id_rsa*",
    "**/id_ed25519*",
    "**/*.pem",
    "**/*.key",
];

#[must_use]
pub fn default_deny_patterns() -> Vec<String> {
    DEFAULT_DENY_PATTERNS
        .iter()
        .map(std::string::ToString::to_string)
        .collect()
}

#[derive(Debug, Clone)]
struct DenyPattern {
    pattern: String,
    matcher: globset::GlobMatcher,
}

/// A filesystem root an agent's file tools are confined to.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    deny_patterns: Vec<DenyPattern>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, denied_patterns: Vec<String>) -> Result<Self, ToolError> {
        let root = root.into();
        let canonical = std::fs::canonicalize(&root).map_err(|_| {
            ToolError::PolicyViolation(DenialReason::PathOutsideWorkspace {
                attempted: root.clone(),
                resolved: root,
            })
        })?;

        let mut deny_patterns = Vec::new();
        for pat in denied_patterns {
            let mut builder = globset::GlobBuilder::new(&pat);
            // Case-insensitive so "Secret.PEM" cannot bypass "*.pem".
            builder.case_insensitive(true);
            let glob = builder.build().map_err(|e| ToolError::BadArgs {
                message: format!("invalid denied pattern '{pat}': {e}"),
            })?;
            deny_patterns.push(DenyPattern {
                pattern: pat,
                matcher: glob.compile_matcher(),
            });
        }

        Ok(Self {
            root: canonical,
            deny_patterns,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an existing file within the workspace.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let joined = self.validate_and_join(relative)?;
        let canonical = std::fs::canonicalize(&joined).map_err(|e| ToolError::ExecutionFailed {
            tool: "workspace".to_string(),
            message: format!("cannot resolve '{relative}': {e}"),
        })?;
        self.check_allowed(relative, &canonical)
    }

    /// Resolve a relative path for file creation; the file (and intermediate
    /// directories) need not exist yet, as long as the nearest existing
    /// ancestor stays within the workspace.
    pub fn resolve_for_create(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let joined = self.validate_and_join(relative)?;
        let canonical = canonicalize_for_create(&joined).map_err(|_| {
            ToolError::PolicyViolation(DenialReason::PathOutsideWorkspace {
                attempted: PathBuf::from(relative),
                resolved: joined.clone(),
            })
        })?;
        self.check_allowed(relative, &canonical)?;
        Ok(joined)
    }

    fn validate_and_join(&self, relative: &str) -> Result<PathBuf, ToolError> {
        if relative.chars().any(char::is_control) {
            return Err(ToolError::BadArgs {
                message: "path contains control characters".to_string(),
            });
        }
        let input = Path::new(relative);
        if input.is_absolute() {
            return Err(ToolError::PolicyViolation(
                DenialReason::PathOutsideWorkspace {
                    attempted: input.to_path_buf(),
                    resolved: input.to_path_buf(),
                },
            ));
        }
        // `..` is rejected up front; symlink escapes are caught by the
        // canonicalize + prefix check afterwards.
        if input
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(ToolError::PolicyViolation(
                DenialReason::PathOutsideWorkspace {
                    attempted: input.to_path_buf(),
                    resolved: self.root.join(input),
                },
            ));
        }
        Ok(self.root.join(input))
    }

    fn check_allowed(&self, attempted: &str, canonical: &Path) -> Result<PathBuf, ToolError> {
        if !canonical.starts_with(&self.root) {
            return Err(ToolError::PolicyViolation(
                DenialReason::PathOutsideWorkspace {
                    attempted: PathBuf::from(attempted),
                    resolved: canonical.to_path_buf(),
                },
            ));
        }
        for deny in &self.deny_patterns {
            if deny.matcher.is_match(canonical) {
                return Err(ToolError::PolicyViolation(
                    DenialReason::DeniedPatternMatched {
                        attempted: PathBuf::from(attempted),
                        pattern: deny.pattern.clone(),
                    },
                ));
            }
        }
        Ok(canonical.to_path_buf())
    }

    pub async fn read_file(&self, relative: &str) -> Result<String, ToolError> {
        let path = self.resolve(relative)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "read_file".to_string(),
                message: format!("{}: {e}", path.display()),
            })
    }

    pub async fn write_file(&self, relative: &str, content: &str) -> Result<(), ToolError> {
        let path = self.resolve_for_create(relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool: "write_file".to_string(),
                    message: format!("{}: {e}", parent.display()),
                })?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "write_file".to_string(),
                message: format!("{}: {e}", path.display()),
            })
    }

    /// List directory entries, sorted, directories marked with a trailing `/`.
    pub async fn list_files(&self, relative: &str) -> Result<Vec<String>, ToolError> {
        let path = if relative.is_empty() || relative == "." {
            self.root.clone()
        } else {
            self.resolve(relative)?
        };
        let mut reader =
            tokio::fs::read_dir(&path)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool: "list_files".to_string(),
                    message: format!("{}: {e}", path.display()),
                })?;
        let mut names = Vec::new();
        while let Some(entry) =
            reader
                .next_entry()
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool: "list_files".to_string(),
                    message: e.to_string(),
                })?
        {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

/// Canonicalize the nearest existing ancestor and re-append the rest.
fn canonicalize_for_create(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut tail = Vec::new();
    loop {
        if existing.exists() {
            let canonical = std::fs::canonicalize(&existing)?;
            let mut result = canonical;
            for part in tail.iter().rev() {
                result.push(part);
            }
            return Ok(result);
        }
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                tail.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no existing ancestor",
                ));
            }
        }
    }
}
