//! The interruption-retry protocol and stale-result discard.

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use hive_engine::{AbortReason, ComputeStatus, Scheduler};
use hive_reasoning::ChatResponse;
use hive_types::ToolCall;

use crate::common::{ChatStep, ScriptedReasoner, agent, runtime, text, wait_until};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn message_during_turn_aborts_and_retries_with_interjection() {
    let reasoner = ScriptedReasoner::new(vec![
        ChatStep::WaitForCancel,
        ChatStep::Reply(ChatResponse::text("merged reply")),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(Arc::clone(&reasoner), &dir);
    rt.spawn_agent(agent("root"), None, Vec::new(), None).unwrap();

    let scheduler = Scheduler::new(Arc::clone(&rt));
    let shutdown = CancellationToken::new();
    let driver = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    rt.bus().send(agent("user"), agent("root"), text("m1"), None);
    {
        let reasoner = Arc::clone(&reasoner);
        wait_until(move || reasoner.calls() == 1).await;
    }

    // Second message lands while the first call is in flight.
    rt.bus().send(agent("user"), agent("root"), text("m2"), None);
    {
        let probe = Arc::clone(&rt);
        let reasoner = Arc::clone(&reasoner);
        wait_until(move || {
            reasoner.calls() == 2 && probe.agent_status(&agent("root")) == Some(ComputeStatus::Idle)
        })
        .await;
    }
    shutdown.cancel();
    driver.await.unwrap();

    // Exactly one aborted call and one retry; the retry context carries the
    // late message as a distinguishable interjection.
    assert_eq!(reasoner.calls(), 2);
    let retry = &reasoner.requests()[1];
    let interjection = retry.entries.iter().find(|e| e.is_interjection()).unwrap();
    assert_eq!(interjection.content(), "[from user] m2");

    let history = rt.history_snapshot(&agent("root")).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].content(), "[from user] m1");
    assert!(history[1].is_interjection());
    assert_eq!(history[2].content(), "merged reply");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn result_settled_after_abort_is_discarded() {
    // The scripted call ignores its cancellation token and settles with a
    // write_file request only after we allow it to.
    let write = ToolCall::new(
        "c1",
        "write_file",
        json!({"path": "out.txt", "content": "stale"}),
    );
    let reasoner = ScriptedReasoner::new(vec![ChatStep::ReplyAfterRelease(
        ChatResponse::with_tool_calls("about to write", vec![write]),
    )]);
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(Arc::clone(&reasoner), &dir);
    rt.spawn_agent(agent("root"), None, Vec::new(), None).unwrap();
    rt.bus().send(agent("user"), agent("root"), text("m1"), None);

    Scheduler::new(Arc::clone(&rt)).step();
    {
        let reasoner = Arc::clone(&reasoner);
        wait_until(move || reasoner.calls() == 1).await;
    }

    rt.cancel().abort(&agent("root"), AbortReason::MessageInterruption);
    reasoner.release();

    let probe = Arc::clone(&rt);
    wait_until(move || probe.agent_status(&agent("root")) == Some(ComputeStatus::Idle)).await;

    // Nothing past the input landed: no assistant entry, no tool use, no
    // side effect on disk.
    assert_eq!(reasoner.calls(), 1);
    let history = rt.history_snapshot(&agent("root")).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content(), "[from user] m1");
    assert!(!dir.path().join("out.txt").exists());
}
