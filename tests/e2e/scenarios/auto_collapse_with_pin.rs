use crate::harness::TestSession;
use ctxmgr_core::{HarnessMessage, HarnessRole, ToolCallSpec, ToolStatus};

fn tool_result(turn_text: &str, idx: usize, timestamp: i64) -> Vec<HarnessMessage> {
    vec![
        HarnessMessage {
            role: HarnessRole::User,
            text: turn_text.to_string(),
            timestamp,
            tool_call: None,
        },
        HarnessMessage {
            role: HarnessRole::ToolResult,
            text: format!("result {idx}"),
            timestamp: timestamp + 1,
            tool_call: Some(ToolCallSpec {
                tool: "bash".to_string(),
                args: serde_json::json!({}),
                args_display: None,
                status: ToolStatus::Ok,
                output: format!("output {idx}"),
                file_refs: None,
            }),
        },
    ]
}

/// Scenario 5 (spec.md §8): 20 tool results across 5 turns, defaults N=5
/// W=3. Tool calls older than the last 3 turns drop out of the active set
/// unless pinned.
#[tokio::test]
async fn old_toolcalls_collapse_unless_pinned() {
    let session = TestSession::new("scenario-5");
    let mut facade = session.open().await.unwrap();

    let mut all_messages = Vec::new();
    let mut ts = 0i64;
    for turn in 0..5 {
        for call in 0..4 {
            all_messages.extend(tool_result(&format!("turn {turn}"), turn * 4 + call, ts));
            ts += 2;
        }
    }

    facade.transform_context(1, &all_messages).await.unwrap();

    let core = facade.session();
    let active_toolcalls: Vec<String> = core.active_toolcall_ids().cloned().collect();
    // Last W=3 turns is turns 2,3,4: 12 tool calls, but N=5 also bounds
    // the window, so at most 5 remain active absent pins.
    assert!(active_toolcalls.len() <= 5);

    let oldest_toolcall_id = core
        .metadata_pool_ids()
        .into_iter()
        .find(|id| matches!(core.cache_entry(id), Some(ctxmgr_core::CacheEntry::ToolCall { .. })))
        .unwrap();
    assert!(!core.active_set_ids().contains(&oldest_toolcall_id));
    drop(core);

    let pin_status = facade.pin(&oldest_toolcall_id).await;
    assert!(pin_status.ok);
    let activate_status = facade.activate(&oldest_toolcall_id).await;
    assert!(activate_status.ok);

    // One more turn of tool results should not collapse a pinned entry.
    let extra = tool_result("turn 5", 100, ts);
    facade.transform_context(1, &extra).await.unwrap();

    let core = facade.session();
    assert!(core.active_set_ids().contains(&oldest_toolcall_id));

    facade.close().await;
}
