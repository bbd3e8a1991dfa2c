//! Deterministic four-section context render (spec.md §4.6, §6).
//!
//! Wire templates are byte-exact per spec.md §6: the core never invents text
//! outside them. Grounded on the sibling crate's snapshot renderer in shape
//! (pure function over already-materialized state, no I/O of its own except
//! fetching active content) but the template strings themselves come
//! straight from the specification, not from any example repo.

use crate::error::Result;
use crate::session_core::{CacheEntry, ChatLogEntry, SessionCore};
use crate::store::StoreClient;
use crate::types::ToolStatus;

/// Role of an assembled message, in the sense the harness understands (not
/// to be confused with [`crate::session_core::HarnessRole`], which is the
/// role of an *input* message).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One message in the rendered sequence handed back to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledMessage {
    pub role: MessageRole,
    pub content: String,
}

fn status_str(status: ToolStatus) -> &'static str {
    status.as_str()
}

/// Renders the full four-section sequence (spec.md §4.6): system prompt,
/// metadata pool summary, chat history, active content. Section 2's ordering
/// follows `metadataPool`'s insertion order; section 4 follows `activeSet`'s.
///
/// Active content is fetched fresh from the store rather than served out of
/// the in-memory cache: the cache only ever holds rendering summaries (spec
/// note under §4.4), never full payloads, so this is the one place the
/// assembler itself performs I/O.
pub async fn render_context(
    session: &SessionCore,
    store: &dyn StoreClient,
    system_prompt_content: &str,
) -> Result<Vec<AssembledMessage>> {
    let mut messages = Vec::new();

    messages.push(AssembledMessage {
        role: MessageRole::System,
        content: system_prompt_content.to_string(),
    });

    messages.push(AssembledMessage {
        role: MessageRole::User,
        content: render_metadata_pool(session),
    });

    for entry in session.chat_log() {
        match entry {
            ChatLogEntry::Turn(turn) => {
                let role = match turn.role.as_str() {
                    "assistant" => MessageRole::Assistant,
                    _ => MessageRole::User,
                };
                messages.push(AssembledMessage {
                    role,
                    content: turn.text.clone(),
                });
            }
            ChatLogEntry::ToolCall { id, tool, status } => {
                messages.push(AssembledMessage {
                    role: MessageRole::User,
                    content: format!(
                        "toolcall_ref id={id} tool={tool} status={status}",
                        id = id,
                        tool = tool,
                        status = status_str(*status),
                    ),
                });
            }
        }
    }

    for id in session.active_set_ids() {
        let stored = store.get(&id).await?;
        let content = stored
            .and_then(|s| s.doc.content)
            .unwrap_or_default();
        messages.push(AssembledMessage {
            role: MessageRole::User,
            content: format!("ACTIVE_CONTENT id={id}\n{content}", id = id, content = content),
        });
    }

    Ok(messages)
}

fn render_metadata_pool(session: &SessionCore) -> String {
    let mut body = String::from("METADATA_POOL\n");
    let mut lines = Vec::new();
    for id in session.metadata_pool_ids() {
        let line = match session.cache_entry(&id) {
            Some(CacheEntry::File {
                display_path,
                file_type,
                is_stub,
                ..
            }) if *is_stub => format!(
                "id={id} type=file path={path} file_type={ft} [unread]",
                id = id,
                path = display_path,
                ft = file_type,
            ),
            Some(CacheEntry::File {
                display_path,
                file_type,
                char_count,
                ..
            }) => format!(
                "id={id} type=file path={path} file_type={ft} char_count={n}",
                id = id,
                path = display_path,
                ft = file_type,
                n = char_count,
            ),
            Some(CacheEntry::ToolCall { tool, status }) => format!(
                "id={id} type=toolcall tool={tool} status={status}",
                id = id,
                tool = tool,
                status = status_str(*status),
            ),
            None => format!("id={id} type=unknown"),
        };
        lines.push(line);
    }
    body.push_str(&lines.join("\n"));
    body
}
