//! Name-to-handler tool registry.
//!
//! Dispatch is a tagged union resolved once at registry construction, not
//! reflection over tool names at call time. `send_message` is registered
//! schema-only: it appears in the manifest sent to the reasoning service,
//! but the turn engine intercepts it (contact-registry check, then bus
//! send) before executor dispatch, so the registry never runs it.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Value, json};

use hive_types::{ToolCall, ToolDefinition};

use super::{ToolCtx, ToolError, parse_args, shell, validate_args};

/// Name of the engine-intercepted message-send tool.
pub const SEND_MESSAGE_TOOL: &str = "send_message";

/// Built-in tool kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolHandler {
    ReadFile,
    WriteFile,
    ListFiles,
    RunCommand,
}

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
}

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

#[derive(Deserialize)]
struct ListFilesArgs {
    #[serde(default)]
    path: String,
}

#[derive(Deserialize)]
struct RunCommandArgs {
    command: String,
    timeout_ms: Option<u64>,
}

impl ToolHandler {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ToolHandler::ReadFile => "read_file",
            ToolHandler::WriteFile => "write_file",
            ToolHandler::ListFiles => "list_files",
            ToolHandler::RunCommand => "run_command",
        }
    }

    #[must_use]
    pub fn definition(self) -> ToolDefinition {
        match self {
            ToolHandler::ReadFile => ToolDefinition::new(
                self.name(),
                "Read a file from the workspace. The path is relative to the workspace root.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Workspace-relative path"},
                    },
                    "required": ["path"],
                }),
            ),
            ToolHandler::WriteFile => ToolDefinition::new(
                self.name(),
                "Write a file in the workspace, creating parent directories as needed.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Workspace-relative path"},
                        "content": {"type": "string"},
                    },
                    "required": ["path", "content"],
                }),
            ),
            ToolHandler::ListFiles => ToolDefinition::new(
                self.name(),
                "List entries of a workspace directory. Directories end with '/'.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Workspace-relative path; empty for the root"},
                    },
                }),
            ),
            ToolHandler::RunCommand => ToolDefinition::new(
                self.name(),
                "Run a shell command in the workspace. Dangerous commands are rejected; long commands are killed at the timeout.",
                json!({
                    "type": "object",
                    "properties": {
                        "command": {"type": "string"},
                        "timeout_ms": {"type": "integer", "minimum": 1},
                    },
                    "required": ["command"],
                }),
            ),
        }
    }

    async fn execute(self, args: &Value, ctx: &ToolCtx) -> Result<String, ToolError> {
        match self {
            ToolHandler::ReadFile => {
                let args: ReadFileArgs = parse_args(args)?;
                ctx.workspace.read_file(&args.path).await
            }
            ToolHandler::WriteFile => {
                let args: WriteFileArgs = parse_args(args)?;
                ctx.workspace.write_file(&args.path, &args.content).await?;
                Ok(format!("wrote {} bytes to {}", args.content.len(), args.path))
            }
            ToolHandler::ListFiles => {
                let args: ListFilesArgs = parse_args(args)?;
                let names = ctx.workspace.list_files(&args.path).await?;
                Ok(names.join("\n"))
            }
            ToolHandler::RunCommand => {
                let args: RunCommandArgs = parse_args(args)?;
                let timeout = args
                    .timeout_ms
                    .map_or(ctx.command_timeout, std::time::Duration::from_millis)
                    .min(ctx.command_timeout);
                let outcome = shell::execute(
                    ctx.workspace.root(),
                    &args.command,
                    timeout,
                    &ctx.command_blacklist,
                )
                .await?;
                let mut output = String::new();
                output.push_str(&outcome.stdout);
                if !outcome.stderr.is_empty() {
                    if !output.is_empty() {
                        output.push('\n');
                    }
                    output.push_str("[stderr]\n");
                    output.push_str(&outcome.stderr);
                }
                if outcome.exit_code != 0 {
                    if !output.is_empty() {
                        output.push('\n');
                    }
                    output.push_str(&format!("[exit code {}]", outcome.exit_code));
                }
                if output.is_empty() {
                    output.push_str("(no output)");
                }
                Ok(output)
            }
        }
    }
}

/// Registry of executable handlers plus schema-only definitions.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    handlers: HashMap<String, ToolHandler>,
    schemas: HashMap<String, ToolDefinition>,
    schema_only: Vec<ToolDefinition>,
}

impl ToolRegistry {
    /// Registry with the built-in handlers and the schema-only
    /// `send_message` definition.
    pub fn builtin() -> Result<Self, ToolError> {
        let mut registry = Self::default();
        for handler in [
            ToolHandler::ReadFile,
            ToolHandler::WriteFile,
            ToolHandler::ListFiles,
            ToolHandler::RunCommand,
        ] {
            registry.register(handler)?;
        }
        registry.register_schema(ToolDefinition::new(
            SEND_MESSAGE_TOOL,
            "Send a message to one of your contacts. The recipient must be in your contact registry.",
            json!({
                "type": "object",
                "properties": {
                    "to": {"type": "string", "description": "Recipient agent id"},
                    "content": {"type": "string", "minLength": 1},
                },
                "required": ["to", "content"],
            }),
        ))?;
        Ok(registry)
    }

    pub fn register(&mut self, handler: ToolHandler) -> Result<(), ToolError> {
        let name = handler.name().to_string();
        if self.handlers.contains_key(&name) || self.schema_only.iter().any(|d| d.name == name) {
            return Err(ToolError::DuplicateTool { name });
        }
        self.schemas.insert(name.clone(), handler.definition());
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Register a schema-only tool definition (no handler).
    ///
    /// The tool appears in the reasoning service's tool manifest but the
    /// engine must intercept calls before they reach handler dispatch.
    pub fn register_schema(&mut self, def: ToolDefinition) -> Result<(), ToolError> {
        let name = &def.name;
        if self.handlers.contains_key(name) || self.schema_only.iter().any(|d| d.name == *name) {
            return Err(ToolError::DuplicateTool { name: name.clone() });
        }
        self.schema_only.push(def);
        Ok(())
    }

    /// Whether the given tool is schema-only (engine-intercepted).
    #[must_use]
    pub fn is_schema_only(&self, name: &str) -> bool {
        self.schema_only.iter().any(|d| d.name == name)
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .schemas
            .values()
            .cloned()
            .chain(self.schema_only.iter().cloned())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute one tool call: schema validation, then handler dispatch.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolCtx) -> Result<String, ToolError> {
        let handler = self
            .handlers
            .get(&call.name)
            .copied()
            .ok_or_else(|| ToolError::UnknownTool {
                name: call.name.clone(),
            })?;
        if let Some(def) = self.schemas.get(&call.name) {
            validate_args(&def.schema, &call.arguments)?;
        }
        handler.execute(&call.arguments, ctx).await
    }
}
