//! Round and context limits, and the parent notifications they produce.

use std::sync::Arc;

use serde_json::{Value, json};

use hive_engine::{ComputeStatus, EngineConfig, Scheduler};
use hive_reasoning::ChatResponse;
use hive_types::{ChatEntry, ToolCall};

use crate::common::{ChatStep, ScriptedReasoner, agent, runtime_with, text, wait_until};

fn parent_notification(rt: &hive_engine::Runtime) -> Value {
    let envelope = rt.bus().receive_next(&agent("root")).unwrap();
    assert_eq!(envelope.from().as_str(), "a1");
    serde_json::from_str(envelope.payload()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exhausted_tool_rounds_notify_the_parent() {
    let list = ToolCall::new("c1", "list_files", json!({}));
    let reasoner = ScriptedReasoner::new(vec![ChatStep::Reply(ChatResponse::with_tool_calls(
        "",
        vec![list],
    ))]);
    let config = EngineConfig {
        max_tool_rounds: 1,
        ..EngineConfig::default()
    };
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime_with(Arc::clone(&reasoner), config, &dir);
    rt.spawn_agent(agent("root"), None, Vec::new(), None).unwrap();
    rt.spawn_agent(agent("a1"), Some(agent("root")), Vec::new(), None)
        .unwrap();

    rt.bus().send(agent("root"), agent("a1"), text("dig in"), None);
    Scheduler::new(Arc::clone(&rt)).step();
    {
        let probe = Arc::clone(&rt);
        wait_until(move || {
            probe.agent_status(&agent("a1")) == Some(ComputeStatus::Idle)
                && probe.bus().has_pending_for(&agent("root"))
        })
        .await;
    }

    // The round's tool call still ran before the limit fired.
    assert_eq!(reasoner.calls(), 1);
    let history = rt.history_snapshot(&agent("a1")).unwrap();
    assert!(history.iter().any(|e| matches!(e, ChatEntry::ToolResult(r) if !r.is_error)));

    let notification = parent_notification(&rt);
    assert_eq!(notification["type"], "max_tool_rounds_exceeded");
    assert_eq!(notification["agent"], "a1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_context_is_rejected_before_any_reasoning_call() {
    let reasoner = ScriptedReasoner::new(Vec::new());
    // keep_recent larger than any history here, so no summarization call
    // can fire either; the hard limit is the only gate exercised.
    let config = EngineConfig {
        soft_context_limit: 1,
        hard_context_limit: 10,
        compaction_keep_recent: 1000,
        ..EngineConfig::default()
    };
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime_with(Arc::clone(&reasoner), config, &dir);
    rt.spawn_agent(agent("root"), None, Vec::new(), None).unwrap();
    rt.spawn_agent(agent("a1"), Some(agent("root")), Vec::new(), None)
        .unwrap();

    let long = "x".repeat(400);
    rt.bus().send(agent("root"), agent("a1"), text(&long), None);
    Scheduler::new(Arc::clone(&rt)).step();
    {
        let probe = Arc::clone(&rt);
        wait_until(move || {
            probe.agent_status(&agent("a1")) == Some(ComputeStatus::Idle)
                && probe.bus().has_pending_for(&agent("root"))
        })
        .await;
    }

    assert_eq!(reasoner.calls(), 0);
    let notification = parent_notification(&rt);
    assert_eq!(notification["type"], "context_limit_exceeded");
    assert_eq!(notification["agent"], "a1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn notification_from_a_spawned_turn_waits_for_the_next_pass() {
    // A pass sweeps every queue before any turn it starts can produce
    // mail, so the notification below must still be on the bus once the
    // pass's turn settles. Repeated because the hazard depends on task
    // timing.
    for _ in 0..25 {
        let reasoner = ScriptedReasoner::new(Vec::new());
        let config = EngineConfig {
            soft_context_limit: 1,
            hard_context_limit: 10,
            compaction_keep_recent: 1000,
            ..EngineConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let rt = runtime_with(Arc::clone(&reasoner), config, &dir);
        rt.spawn_agent(agent("root"), None, Vec::new(), None).unwrap();
        rt.spawn_agent(agent("a1"), Some(agent("root")), Vec::new(), None)
            .unwrap();

        let long = "x".repeat(400);
        rt.bus().send(agent("root"), agent("a1"), text(&long), None);
        Scheduler::new(Arc::clone(&rt)).step();

        let probe = Arc::clone(&rt);
        wait_until(move || probe.agent_status(&agent("a1")) == Some(ComputeStatus::Idle)).await;

        assert!(rt.bus().has_pending_for(&agent("root")));
        assert!(rt.history_snapshot(&agent("root")).unwrap().is_empty());
        assert_eq!(rt.agent_status(&agent("root")), Some(ComputeStatus::Idle));
    }
}
