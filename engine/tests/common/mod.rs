//! Shared fixtures: a scripted reasoning service and runtime builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use hive_engine::{EngineConfig, InMemoryStore, Runtime};
use hive_reasoning::{ChatFut, ChatRequest, ChatResponse, ReasoningError, ReasoningService};
use hive_tools::workspace::{Workspace, default_deny_patterns};
use hive_tools::{CommandBlacklist, ToolCtx, ToolRegistry};
use hive_types::{AgentId, NonEmptyString};

/// One scripted reaction of the mock reasoning service.
pub enum ChatStep {
    /// Settle immediately with this response.
    Reply(ChatResponse),
    /// Park until the cancellation token fires, then report cancellation.
    WaitForCancel,
    /// Park until [`ScriptedReasoner::release`] is called, then settle with
    /// this response regardless of cancellation. Exercises the caller's
    /// stale-result discard for calls that never observed their token.
    ReplyAfterRelease(ChatResponse),
}

/// Deterministic [`ReasoningService`]: consumes a queue of [`ChatStep`]s,
/// recording every request. Once the script is exhausted it settles every
/// call with a plain "done".
#[derive(Default)]
pub struct ScriptedReasoner {
    steps: Mutex<VecDeque<ChatStep>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
    release: Notify,
}

impl ScriptedReasoner {
    pub fn new(steps: Vec<ChatStep>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            ..Self::default()
        })
    }

    /// Number of chat calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of every request received so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Unpark one parked `ReplyAfterRelease` call.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

impl ReasoningService for ScriptedReasoner {
    fn chat(&self, request: ChatRequest, cancel: CancellationToken) -> ChatFut<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let step = self.steps.lock().unwrap().pop_front();
        Box::pin(async move {
            match step {
                None => Ok(ChatResponse::text("done")),
                Some(ChatStep::Reply(response)) => Ok(response),
                Some(ChatStep::WaitForCancel) => {
                    cancel.cancelled().await;
                    Err(ReasoningError::Cancelled)
                }
                Some(ChatStep::ReplyAfterRelease(response)) => {
                    self.release.notified().await;
                    Ok(response)
                }
            }
        })
    }
}

/// Route engine tracing to the test writer. Idempotent; enable output with
/// `RUST_LOG=hive_engine=debug`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn agent(s: &str) -> AgentId {
    AgentId::new(s)
}

pub fn text(s: &str) -> NonEmptyString {
    NonEmptyString::new(s).unwrap()
}

pub fn tool_ctx(dir: &tempfile::TempDir) -> ToolCtx {
    ToolCtx {
        workspace: Workspace::new(dir.path(), default_deny_patterns()).unwrap(),
        command_timeout: Duration::from_secs(5),
        max_output_bytes: 16 * 1024,
        command_blacklist: CommandBlacklist::with_defaults().unwrap(),
    }
}

pub fn runtime(reasoner: Arc<ScriptedReasoner>, dir: &tempfile::TempDir) -> Arc<Runtime> {
    runtime_with(reasoner, EngineConfig::default(), dir)
}

pub fn runtime_with(
    reasoner: Arc<ScriptedReasoner>,
    config: EngineConfig,
    dir: &tempfile::TempDir,
) -> Arc<Runtime> {
    init_tracing();
    Arc::new(Runtime::new(
        reasoner,
        Arc::new(InMemoryStore::new()),
        ToolRegistry::builtin().unwrap(),
        tool_ctx(dir),
        config,
    ))
}

/// Poll `condition` until it holds, panicking after ~2 seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
