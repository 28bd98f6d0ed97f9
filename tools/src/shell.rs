//! Command execution with a hard timeout.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use super::process::{ChildGuard, set_new_session};
use super::{CommandBlacklist, ToolError};

/// Result of a completed command.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Run a shell command inside `workspace_dir` with a hard timeout.
///
/// The command is checked against the blacklist before anything is spawned.
/// On timeout the child's whole process group is killed (via the guard) and
/// `ToolError::Timeout` is returned; a timeout is an ordinary tool-result
/// error, not scheduler-level cancellation.
pub async fn execute(
    workspace_dir: &Path,
    command: &str,
    timeout: Duration,
    blacklist: &CommandBlacklist,
) -> Result<ExecOutcome, ToolError> {
    blacklist.validate(command)?;

    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(workspace_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    set_new_session(&mut cmd);

    let mut child = cmd.spawn().map_err(|e| ToolError::ExecutionFailed {
        tool: "run_command".to_string(),
        message: format!("spawn failed: {e}"),
    })?;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let mut guard = ChildGuard::new(child);

    let run = async {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        // Drain both pipes concurrently so a full pipe buffer cannot wedge
        // the child before it exits.
        tokio::join!(
            async {
                if let Some(pipe) = stdout_pipe.as_mut() {
                    let _ = pipe.read_to_end(&mut stdout).await;
                }
            },
            async {
                if let Some(pipe) = stderr_pipe.as_mut() {
                    let _ = pipe.read_to_end(&mut stderr).await;
                }
            },
        );
        let status = guard.child_mut().wait().await;
        (stdout, stderr, status)
    };

    let (stdout, stderr, status) = match tokio::time::timeout(timeout, run).await {
        Ok(done) => done,
        Err(_) => {
            tracing::debug!(command, ?timeout, "command timed out, killing process group");
            return Err(ToolError::Timeout {
                tool: "run_command".to_string(),
                elapsed: timeout,
            });
        }
    };
    guard.disarm();

    let status = status.map_err(|e| ToolError::ExecutionFailed {
        tool: "run_command".to_string(),
        message: format!("wait failed: {e}"),
    })?;

    Ok(ExecOutcome {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code: status.code().unwrap_or(-1),
    })
}
