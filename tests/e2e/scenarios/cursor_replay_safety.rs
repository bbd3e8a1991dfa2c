use crate::harness::TestSession;
use ctxmgr_core::{HarnessMessage, HarnessRole, ToolCallSpec, ToolStatus};

fn message(role: HarnessRole, text: &str, timestamp: i64, tool_call: Option<ToolCallSpec>) -> HarnessMessage {
    HarnessMessage {
        role,
        text: text.to_string(),
        timestamp,
        tool_call,
    }
}

/// Scenario 6 (spec.md §8): re-calling `transformContext` with the same
/// prefix plus one new message processes exactly the new message, with no
/// duplicated `toolcall_ref` lines.
#[tokio::test]
async fn replaying_prefix_plus_one_processes_only_the_new_message() {
    let session = TestSession::new("scenario-6");
    let mut facade = session.open().await.unwrap();

    let msgs: Vec<HarnessMessage> = (0..6)
        .map(|i| {
            if i % 2 == 0 {
                message(HarnessRole::User, &format!("turn {i}"), i as i64, None)
            } else {
                message(
                    HarnessRole::ToolResult,
                    "result",
                    i as i64,
                    Some(ToolCallSpec {
                        tool: "bash".to_string(),
                        args: serde_json::json!({}),
                        args_display: None,
                        status: ToolStatus::Ok,
                        output: format!("out {i}"),
                        file_refs: None,
                    }),
                )
            }
        })
        .collect();

    let first = facade.transform_context(1, &msgs).await.unwrap();
    let toolcall_refs_first: Vec<&str> = first
        .iter()
        .filter(|m| m.content.starts_with("toolcall_ref"))
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(toolcall_refs_first.len(), 3);

    let mut extended = msgs.clone();
    extended.push(message(
        HarnessRole::ToolResult,
        "result",
        7,
        Some(ToolCallSpec {
            tool: "grep".to_string(),
            args: serde_json::json!({}),
            args_display: None,
            status: ToolStatus::Ok,
            output: "out 7".to_string(),
            file_refs: None,
        }),
    ));

    let second = facade.transform_context(1, &extended).await.unwrap();
    let toolcall_refs_second: Vec<String> = second
        .iter()
        .filter(|m| m.content.starts_with("toolcall_ref"))
        .map(|m| m.content.clone())
        .collect();

    assert_eq!(toolcall_refs_second.len(), 4);
    // No duplication: each of the first three refs appears exactly once.
    for ref_line in &toolcall_refs_first {
        let count = toolcall_refs_second.iter().filter(|l| l.as_str() == *ref_line).count();
        assert_eq!(count, 1, "duplicated ref: {ref_line}");
    }

    facade.close().await;
}
