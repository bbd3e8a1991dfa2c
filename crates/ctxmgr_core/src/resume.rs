//! The resume protocol (spec.md §4.7): rehydrate a session from the store,
//! or initialize one fresh, and reconcile sourced objects against the live
//! filesystem.

use crate::config::FacadeConfig;
use crate::error::Result;
use crate::hash::{identity_hash_unsourced, metadata_hash, object_hash};
use crate::indexer::Indexer;
use crate::resolver::FilesystemResolver;
use crate::session_core::{write_chat_version, write_session_version, SessionCore};
use crate::store::StoreClient;
use crate::types::{
    ChatFields, Envelope, ObjectType, ObjectVersion, SessionFields, TypedFields,
};
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What `resume` produced: the rehydrated/initialized session, plus the
/// agent-visible paths of every watchable sourced object, for the caller to
/// hand to the tracker (step 7 of spec.md §4.7).
pub struct ResumeOutcome {
    pub session: SessionCore,
    pub watchable_agent_paths: Vec<String>,
}

fn session_object_id(session_id: &str) -> String {
    identity_hash_unsourced(ObjectType::Session.as_str(), session_id)
}

fn chat_object_id(session_id: &str) -> String {
    identity_hash_unsourced(ObjectType::Chat.as_str(), session_id)
}

fn system_prompt_object_id(session_id: &str) -> String {
    identity_hash_unsourced(ObjectType::SystemPrompt.as_str(), session_id)
}

/// Runs the full resume protocol and returns an initialized [`SessionCore`].
pub async fn resume(
    store: Arc<dyn StoreClient>,
    indexer: Arc<Indexer>,
    resolver: Arc<FilesystemResolver>,
    config: &FacadeConfig,
) -> Result<ResumeOutcome> {
    let session_id = config.session_id.clone();
    let session_obj_id = session_object_id(&session_id);
    let chat_obj_id = chat_object_id(&session_id);
    let sysprompt_obj_id = system_prompt_object_id(&session_id);

    let existing = store.get(&session_obj_id).await?;

    let mut session = SessionCore::new(
        Arc::clone(&store),
        Arc::clone(&indexer),
        Arc::clone(&resolver),
        config.collapse,
        session_id.clone(),
        session_obj_id.clone(),
        chat_obj_id.clone(),
        sysprompt_obj_id.clone(),
    );

    match existing {
        Some(stored) => {
            debug!(session_id = %session_id, "resuming existing session");
            if let Some(fields) = stored.doc.fields.as_session() {
                session.rehydrate(fields);
            }
        }
        None => {
            info!(session_id = %session_id, "initializing fresh session");
            write_system_prompt(&store, &sysprompt_obj_id, config.system_prompt.as_deref())
                .await?;
            write_chat_version(
                &store,
                &chat_obj_id,
                ChatFields {
                    turns: Vec::new(),
                    session_ref: session_obj_id.clone(),
                    turn_count: 0,
                    toolcall_refs: Vec::new(),
                },
            )
            .await?;
            write_session_version(
                &store,
                &session_obj_id,
                SessionFields {
                    session_id: session_id.clone(),
                    chat_ref: chat_obj_id.clone(),
                    system_prompt_ref: sysprompt_obj_id.clone(),
                    session_index: Vec::new(),
                    metadata_pool: Vec::new(),
                    active_set: Vec::new(),
                    pinned_set: Vec::new(),
                },
            )
            .await?;
        }
    }

    let index_ids = session.session_index_ids();
    let versions = store.query_ids(&index_ids).await?;
    let mut watchable_agent_paths = Vec::new();

    for stored in &versions {
        session.update_cache(&stored.doc);

        if !stored.doc.envelope.object_type.is_sourced() {
            continue;
        }
        let Some(source) = &stored.doc.envelope.source else {
            continue;
        };
        let canonical_path = source.canonical_path();
        let agent_path = resolver.reverse_resolve(canonical_path, source.filesystem_id());

        reconcile_sourced_object(&indexer, &resolver, &agent_path, canonical_path).await;

        if resolver.is_watchable(&agent_path) {
            watchable_agent_paths.push(agent_path);
        }
    }

    Ok(ResumeOutcome {
        session,
        watchable_agent_paths,
    })
}

/// Reconciles one sourced object against the live filesystem (spec.md §4.7
/// step 5). Errors reading the source are swallowed into a log line per
/// spec.md §7's "never panic on bad external input" — reconciliation best-
/// effort by nature, since the filesystem may simply be gone for this
/// machine.
async fn reconcile_sourced_object(
    indexer: &Indexer,
    resolver: &FilesystemResolver,
    agent_path: &str,
    canonical_path: &str,
) {
    match tokio::fs::read_to_string(canonical_path).await {
        Ok(content) => {
            if let Err(e) = indexer.full_index(resolver, agent_path, &content).await {
                warn!(agent_path, error = %e, "resume: full-index failed during reconcile");
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            if let Err(e) = indexer.delete(resolver, agent_path).await {
                warn!(agent_path, error = %e, "resume: tombstone write failed during reconcile");
            }
        }
        Err(e) => {
            debug!(agent_path, error = %e, "resume: source inaccessible, leaving orphaned");
        }
    }
}

async fn write_system_prompt(
    store: &Arc<dyn StoreClient>,
    id: &str,
    content: Option<&str>,
) -> Result<()> {
    let fields = TypedFields::SystemPrompt;
    let content_hash_value = content.map(crate::hash::sha256_hex);
    let metadata_hash_value = metadata_hash(&fields.metadata_hash_input());
    let object_hash_value =
        object_hash(None, content_hash_value.as_deref(), &metadata_hash_value);
    let identity_hash = identity_hash_unsourced(ObjectType::SystemPrompt.as_str(), id);

    let version = ObjectVersion {
        envelope: Envelope {
            id: id.to_string(),
            object_type: ObjectType::SystemPrompt,
            source: None,
            identity_hash,
        },
        content: content.map(str::to_string),
        file_hash: None,
        content_hash: content_hash_value,
        metadata_hash: metadata_hash_value,
        object_hash: object_hash_value,
        fields,
    };
    store.put(version, None).await?;
    Ok(())
}
