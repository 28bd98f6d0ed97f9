//! End-to-end message delivery through the scheduler and turn engine.

use std::sync::Arc;

use serde_json::json;

use hive_engine::{ComputeStatus, Scheduler};
use hive_reasoning::ChatResponse;
use hive_tools::SEND_MESSAGE_TOOL;
use hive_types::{ChatEntry, ToolCall};

use crate::common::{ChatStep, ScriptedReasoner, agent, runtime, text, wait_until};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queued_messages_reach_the_agent_in_order() {
    let reasoner = ScriptedReasoner::new(vec![ChatStep::Reply(ChatResponse::text("hello back"))]);
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(Arc::clone(&reasoner), &dir);
    rt.spawn_agent(agent("root"), None, Vec::new(), None).unwrap();

    rt.bus().send(agent("user"), agent("root"), text("hi"), None);
    rt.bus().send(agent("user"), agent("root"), text("bye"), None);

    Scheduler::new(Arc::clone(&rt)).step();
    let probe = Arc::clone(&rt);
    wait_until(move || {
        probe.agent_status(&agent("root")) == Some(ComputeStatus::Idle) && reasoner.calls() == 1
    })
    .await;

    let history = rt.history_snapshot(&agent("root")).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content(), "[from user] hi\n[from user] bye");
    assert_eq!(history[1].content(), "hello back");
    assert!(!rt.bus().has_pending_for(&agent("root")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_most_one_turn_is_active_per_agent() {
    let reasoner = ScriptedReasoner::new(vec![ChatStep::ReplyAfterRelease(ChatResponse::text(
        "finally",
    ))]);
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(Arc::clone(&reasoner), &dir);
    rt.spawn_agent(agent("root"), None, Vec::new(), None).unwrap();
    rt.bus().send(agent("user"), agent("root"), text("work"), None);

    let scheduler = Scheduler::new(Arc::clone(&rt));
    scheduler.step();
    {
        let reasoner = Arc::clone(&reasoner);
        wait_until(move || reasoner.calls() == 1).await;
    }

    // Extra passes while the call is parked must not start another turn.
    scheduler.step();
    scheduler.step();
    assert_eq!(reasoner.calls(), 1);
    assert_eq!(rt.agent_status(&agent("root")), Some(ComputeStatus::Active));

    reasoner.release();
    let probe = Arc::clone(&rt);
    wait_until(move || probe.agent_status(&agent("root")) == Some(ComputeStatus::Idle)).await;
    assert_eq!(reasoner.calls(), 1);
    let history = rt.history_snapshot(&agent("root")).unwrap();
    assert_eq!(history.last().unwrap().content(), "finally");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn send_message_tool_delivers_through_the_bus() {
    let send = ToolCall::new(
        "c1",
        SEND_MESSAGE_TOOL,
        json!({"to": "root", "content": "done"}),
    );
    let reasoner = ScriptedReasoner::new(vec![
        ChatStep::Reply(ChatResponse::with_tool_calls("", vec![send])),
        ChatStep::Reply(ChatResponse::text("finished")),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(Arc::clone(&reasoner), &dir);
    rt.spawn_agent(agent("root"), None, Vec::new(), None).unwrap();
    rt.spawn_agent(agent("a1"), Some(agent("root")), Vec::new(), None)
        .unwrap();

    rt.bus()
        .send(agent("root"), agent("a1"), text("please report"), None);
    Scheduler::new(Arc::clone(&rt)).step();

    let probe = Arc::clone(&rt);
    {
        let reasoner = Arc::clone(&reasoner);
        wait_until(move || {
            reasoner.calls() == 2 && probe.agent_status(&agent("a1")) == Some(ComputeStatus::Idle)
        })
        .await;
    }

    // The intercepted tool call landed on the bus, not in an executor.
    let delivered = rt.bus().receive_next(&agent("root")).unwrap();
    assert_eq!(delivered.payload(), "done");
    assert_eq!(delivered.from().as_str(), "a1");

    let history = rt.history_snapshot(&agent("a1")).unwrap();
    assert!(history.iter().any(|e| matches!(e, ChatEntry::ToolUse(_))));
    let result = history
        .iter()
        .find_map(|e| match e {
            ChatEntry::ToolResult(r) => Some(r),
            _ => None,
        })
        .unwrap();
    assert!(!result.is_error);
    assert!(result.content.contains("delivered to root"));
}
