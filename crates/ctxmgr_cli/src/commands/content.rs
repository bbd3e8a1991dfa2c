//! Set-mutation commands: read, activate, deactivate, pin, unpin, tool
//! result injection.

use super::open_facade;
use anyhow::Result;
use ctxmgr_core::{HarnessMessage, HarnessRole, ToolCallSpec, ToolStatus};

fn report(label: &str, status: &ctxmgr_core::ToolStatusReport) {
    if status.ok {
        println!("{label}: ok ({})", status.message);
        if let Some(id) = &status.id {
            println!("  id: {id}");
        }
    } else {
        println!("{label}: failed ({})", status.message);
    }
}

pub async fn read(store_url: &str, session_id: &str, path: &str, content: &str) -> Result<()> {
    let mut facade = open_facade(store_url, session_id, None).await?;
    let status = facade.read(path, content).await;
    report("read", &status);
    facade.close().await;
    Ok(())
}

pub async fn activate(store_url: &str, session_id: &str, id: &str) -> Result<()> {
    let mut facade = open_facade(store_url, session_id, None).await?;
    let status = facade.activate(id).await;
    report("activate", &status);
    facade.close().await;
    Ok(())
}

pub async fn deactivate(store_url: &str, session_id: &str, id: &str) -> Result<()> {
    let mut facade = open_facade(store_url, session_id, None).await?;
    let status = facade.deactivate(id).await;
    report("deactivate", &status);
    facade.close().await;
    Ok(())
}

pub async fn pin(store_url: &str, session_id: &str, id: &str) -> Result<()> {
    let mut facade = open_facade(store_url, session_id, None).await?;
    let status = facade.pin(id).await;
    report("pin", &status);
    facade.close().await;
    Ok(())
}

pub async fn unpin(store_url: &str, session_id: &str, id: &str) -> Result<()> {
    let mut facade = open_facade(store_url, session_id, None).await?;
    let status = facade.unpin(id).await;
    report("unpin", &status);
    facade.close().await;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn tool_result(
    store_url: &str,
    session_id: &str,
    tool: &str,
    status_ok: bool,
    output: &str,
    stream_epoch: u64,
    timestamp: i64,
) -> Result<()> {
    let mut facade = open_facade(store_url, session_id, None).await?;
    let message = HarnessMessage {
        role: HarnessRole::ToolResult,
        text: output.to_string(),
        timestamp,
        tool_call: Some(ToolCallSpec {
            tool: tool.to_string(),
            args: serde_json::json!({}),
            args_display: None,
            status: if status_ok { ToolStatus::Ok } else { ToolStatus::Fail },
            output: output.to_string(),
            file_refs: None,
        }),
    };
    let rendered = facade.transform_context(stream_epoch, &[message]).await?;
    println!("processed 1 tool result, {} rendered messages", rendered.len());
    facade.close().await;
    Ok(())
}
