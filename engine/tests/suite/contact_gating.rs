//! Contact-registry gating of `send_message`, end to end.

use std::sync::Arc;
use std::time::SystemTime;

use serde_json::json;

use hive_engine::{ComputeStatus, Scheduler};
use hive_reasoning::ChatResponse;
use hive_tools::SEND_MESSAGE_TOOL;
use hive_types::{ChatEntry, Contact, ContactSource, ToolCall};

use crate::common::{ChatStep, ScriptedReasoner, agent, runtime, text, wait_until};

fn send_to_stranger(id: &str) -> ToolCall {
    ToolCall::new(
        id,
        SEND_MESSAGE_TOOL,
        json!({"to": "stranger", "content": "psst"}),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn introduction_flips_a_denied_send_to_allowed() {
    let reasoner = ScriptedReasoner::new(vec![
        ChatStep::Reply(ChatResponse::with_tool_calls("", vec![send_to_stranger("c1")])),
        ChatStep::Reply(ChatResponse::text("gave up")),
        ChatStep::Reply(ChatResponse::with_tool_calls("", vec![send_to_stranger("c2")])),
        ChatStep::Reply(ChatResponse::text("sent")),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(Arc::clone(&reasoner), &dir);
    rt.spawn_agent(agent("root"), None, Vec::new(), None).unwrap();
    rt.spawn_agent(agent("a1"), Some(agent("root")), Vec::new(), None)
        .unwrap();
    rt.spawn_agent(agent("stranger"), Some(agent("root")), Vec::new(), None)
        .unwrap();

    let scheduler = Scheduler::new(Arc::clone(&rt));

    // First attempt: stranger is not a contact of a1.
    rt.bus()
        .send(agent("root"), agent("a1"), text("reach out"), None);
    scheduler.step();
    {
        let probe = Arc::clone(&rt);
        let reasoner = Arc::clone(&reasoner);
        wait_until(move || {
            reasoner.calls() == 2 && probe.agent_status(&agent("a1")) == Some(ComputeStatus::Idle)
        })
        .await;
    }

    assert!(!rt.bus().has_pending_for(&agent("stranger")));
    let history = rt.history_snapshot(&agent("a1")).unwrap();
    let denied = history
        .iter()
        .find_map(|e| match e {
            ChatEntry::ToolResult(r) => Some(r),
            _ => None,
        })
        .unwrap();
    assert!(denied.is_error);
    assert!(denied.content.starts_with("unknown_contact"));

    // An introduction later makes the same send succeed.
    rt.contacts().add_contact(
        &agent("a1"),
        Contact::new(
            agent("stranger"),
            "tester",
            ContactSource::Introduction,
            SystemTime::now(),
        )
        .introduced_by(agent("root")),
    );

    rt.bus()
        .send(agent("root"), agent("a1"), text("try again"), None);
    scheduler.step();
    {
        let probe = Arc::clone(&rt);
        let reasoner = Arc::clone(&reasoner);
        wait_until(move || {
            reasoner.calls() == 4 && probe.agent_status(&agent("a1")) == Some(ComputeStatus::Idle)
        })
        .await;
    }

    let delivered = rt.bus().receive_next(&agent("stranger")).unwrap();
    assert_eq!(delivered.payload(), "psst");
    assert_eq!(delivered.from().as_str(), "a1");
}
