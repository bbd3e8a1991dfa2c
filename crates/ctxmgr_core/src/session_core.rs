//! `SessionCore`: the four session sets, the in-memory metadata cache, the
//! harness-message cursor, and every agent-facing set mutation (spec.md
//! §4.4).
//!
//! Grounded on the sibling crate's `Session` (observation accumulation +
//! chained persistence) and `CtxRepo` (the single owner of in-memory state
//! that every mutation routes through), adapted to the spec's four-set model
//! instead of a single staging chain.

use crate::config::CollapseConfig;
use crate::error::{CoreError, Result};
use crate::hash::{identity_hash_unsourced, metadata_hash, object_hash, sha256_hex};
use crate::indexer::Indexer;
use crate::resolver::FilesystemResolver;
use crate::store::StoreClient;
use crate::tracker::TrackerUpdate;
use crate::types::{
    ChatFields, ChatTurn, Envelope, ObjectType, ObjectVersion, SessionFields, ToolCallFields,
    ToolStatus, TypedFields,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Insertion-order-preserving set of object IDs, used for the three
/// append/insert-heavy session sets. `sessionIndex` and `metadataPool` only
/// ever grow (spec.md §3 invariants); `activeSet`/`pinnedSet` also support
/// removal.
#[derive(Debug, Clone, Default)]
pub(crate) struct OrderedIdSet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl OrderedIdSet {
    fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Returns `true` if this call actually added a new member.
    fn insert(&mut self, id: &str) -> bool {
        if self.members.insert(id.to_string()) {
            self.order.push(id.to_string());
            true
        } else {
            false
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        if self.members.remove(id) {
            self.order.retain(|x| x != id);
            true
        } else {
            false
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    fn to_vec(&self) -> Vec<String> {
        self.order.clone()
    }

    fn from_vec(ids: Vec<String>) -> Self {
        let mut set = Self::default();
        for id in ids {
            set.insert(&id);
        }
        set
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Cached summary of a content object, enough to render §4.6's metadata-pool
/// line without refetching from the store.
#[derive(Debug, Clone)]
pub enum CacheEntry {
    File {
        display_path: String,
        file_type: String,
        char_count: usize,
        is_stub: bool,
    },
    ToolCall {
        tool: String,
        status: ToolStatus,
    },
}

/// Which of the four session sets an ID currently belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetMembership {
    pub in_index: bool,
    pub in_pool: bool,
    pub in_active: bool,
    pub in_pinned: bool,
}

/// Role of a harness-supplied message (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessRole {
    User,
    Assistant,
    ToolResult,
}

/// One entry in the ordered chat log, preserving the exact interleaving of
/// text turns and tool results as the harness delivered them — the
/// [`ContextAssembler`](crate::assembler) renders section 3 straight off
/// this, substituting `toolcall_ref` lines for `ToolCall` entries.
#[derive(Debug, Clone)]
pub enum ChatLogEntry {
    Turn(ChatTurn),
    ToolCall {
        id: String,
        tool: String,
        status: ToolStatus,
    },
}

/// Payload of a `toolResult` message.
#[derive(Debug, Clone)]
pub struct ToolCallSpec {
    pub tool: String,
    pub args: serde_json::Value,
    pub args_display: Option<String>,
    pub status: ToolStatus,
    pub output: String,
    pub file_refs: Option<Vec<String>>,
}

/// Best-effort single-line summary of a tool call's arguments, used when the
/// harness doesn't supply its own `argsDisplay`. Not part of any rendered
/// template (those are byte-exact per spec.md §6); this only makes the
/// stored object's metadata legible to a human reading the pool directly.
const ARGS_DISPLAY_MAX_LEN: usize = 120;

fn derive_args_display(args: &serde_json::Value) -> String {
    let flat = match args {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}={}", compact_value(v)))
            .collect::<Vec<_>>()
            .join(" "),
        serde_json::Value::Null => String::new(),
        other => compact_value(other),
    };
    if flat.chars().count() > ARGS_DISPLAY_MAX_LEN {
        let truncated: String = flat.chars().take(ARGS_DISPLAY_MAX_LEN).collect();
        format!("{truncated}…")
    } else {
        flat
    }
}

fn compact_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One message in the harness-provided stream (spec.md §6).
#[derive(Debug, Clone)]
pub struct HarnessMessage {
    pub role: HarnessRole,
    pub text: String,
    pub timestamp: i64,
    pub tool_call: Option<ToolCallSpec>,
}

impl HarnessMessage {
    /// `(role, timestamp, textHash)` per spec.md §4.4: stable across
    /// identical replays, distinct across different content at the same
    /// position.
    fn signature(&self) -> (u8, i64, String) {
        let role_tag = match self.role {
            HarnessRole::User => 0,
            HarnessRole::Assistant => 1,
            HarnessRole::ToolResult => 2,
        };
        (role_tag, self.timestamp, sha256_hex(&self.text))
    }
}

#[derive(Debug, Clone, Default)]
struct Cursor {
    stream_epoch: u64,
    position: usize,
    last_signature: Option<(u8, i64, String)>,
}

/// `SessionCore` owns the four session sets, the metadata cache, the chat
/// log, and the harness-message cursor for one session.
pub struct SessionCore {
    store: Arc<dyn StoreClient>,
    indexer: Arc<Indexer>,
    resolver: Arc<FilesystemResolver>,
    collapse: CollapseConfig,

    session_id: String,
    session_object_id: String,
    chat_object_id: String,
    system_prompt_object_id: String,

    session_index: OrderedIdSet,
    metadata_pool: OrderedIdSet,
    active_set: OrderedIdSet,
    pinned_set: HashSet<String>,

    metadata_cache: HashMap<String, CacheEntry>,
    tool_call_turn: HashMap<String, usize>,
    current_turn: usize,

    chat_turns: Vec<ChatTurn>,
    chat_toolcall_refs: Vec<String>,
    chat_log: Vec<ChatLogEntry>,

    cursor: Cursor,
    persist_lock: AsyncMutex<()>,
}

impl SessionCore {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        store: Arc<dyn StoreClient>,
        indexer: Arc<Indexer>,
        resolver: Arc<FilesystemResolver>,
        collapse: CollapseConfig,
        session_id: String,
        session_object_id: String,
        chat_object_id: String,
        system_prompt_object_id: String,
    ) -> Self {
        Self {
            store,
            indexer,
            resolver,
            collapse,
            session_id,
            session_object_id,
            chat_object_id,
            system_prompt_object_id,
            session_index: OrderedIdSet::default(),
            metadata_pool: OrderedIdSet::default(),
            active_set: OrderedIdSet::default(),
            pinned_set: HashSet::new(),
            metadata_cache: HashMap::new(),
            tool_call_turn: HashMap::new(),
            current_turn: 0,
            chat_turns: Vec::new(),
            chat_toolcall_refs: Vec::new(),
            chat_log: Vec::new(),
            cursor: Cursor::default(),
            persist_lock: AsyncMutex::new(()),
        }
    }

    /// Rehydrates set membership from a persisted session wrapper. Resume
    /// protocol step 2 (spec.md §4.7); membership is preserved exactly,
    /// including deactivations and pins.
    pub(crate) fn rehydrate(&mut self, fields: &SessionFields) {
        self.session_index = OrderedIdSet::from_vec(fields.session_index.clone());
        self.metadata_pool = OrderedIdSet::from_vec(fields.metadata_pool.clone());
        self.active_set = OrderedIdSet::from_vec(fields.active_set.clone());
        self.pinned_set = fields.pinned_set.iter().cloned().collect();
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_object_id(&self) -> &str {
        &self.session_object_id
    }

    pub fn chat_object_id(&self) -> &str {
        &self.chat_object_id
    }

    pub fn system_prompt_object_id(&self) -> &str {
        &self.system_prompt_object_id
    }

    pub fn membership(&self, id: &str) -> SetMembership {
        SetMembership {
            in_index: self.session_index.contains(id),
            in_pool: self.metadata_pool.contains(id),
            in_active: self.active_set.contains(id),
            in_pinned: self.pinned_set.contains(id),
        }
    }

    pub fn session_index_ids(&self) -> Vec<String> {
        self.session_index.to_vec()
    }

    pub fn metadata_pool_ids(&self) -> Vec<String> {
        self.metadata_pool.to_vec()
    }

    pub fn active_set_ids(&self) -> Vec<String> {
        self.active_set.to_vec()
    }

    pub fn cache_entry(&self, id: &str) -> Option<&CacheEntry> {
        self.metadata_cache.get(id)
    }

    pub fn chat_turns(&self) -> &[ChatTurn] {
        &self.chat_turns
    }

    pub fn chat_log(&self) -> &[ChatLogEntry] {
        &self.chat_log
    }

    pub fn active_toolcall_ids(&self) -> impl Iterator<Item = &String> {
        self.active_set
            .iter()
            .filter(move |id| matches!(self.metadata_cache.get(*id), Some(CacheEntry::ToolCall { .. })))
    }

    pub fn resolver(&self) -> &FilesystemResolver {
        &self.resolver
    }

    // ---- agent-facing operations -------------------------------------

    /// Activates a content object; auto-promotes from `sessionIndex` to
    /// `metadataPool` if needed, and triggers a full index if the object is
    /// a stub.
    pub async fn activate(&mut self, id: &str) -> Result<()> {
        let stored = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        let mut version = stored.doc;

        if !version.envelope.object_type.is_content() {
            return Err(CoreError::NotContentObject(id.to_string()));
        }

        if !self.metadata_pool.contains(id) {
            if self.session_index.contains(id) {
                self.metadata_pool.insert(id);
            } else {
                return Err(CoreError::NotFound(id.to_string()));
            }
        }

        if version.is_stub() {
            version = self.upgrade_stub(&version).await?;
        }

        if version.content.is_none() {
            return Err(CoreError::ContentUnavailable(id.to_string()));
        }

        self.active_set.insert(id);
        self.update_cache(&version);
        self.persist().await?;
        Ok(())
    }

    async fn upgrade_stub(&self, version: &ObjectVersion) -> Result<ObjectVersion> {
        let source = version
            .envelope
            .source
            .as_ref()
            .ok_or_else(|| CoreError::SourceInaccessible(version.envelope.id.clone()))?;
        let canonical_path = source.canonical_path();
        let agent_path = self
            .resolver
            .reverse_resolve(canonical_path, source.filesystem_id());
        let content = tokio::fs::read_to_string(canonical_path)
            .await
            .map_err(|e| CoreError::SourceInaccessible(e.to_string()))?;
        let result = self
            .indexer
            .full_index(&self.resolver, &agent_path, &content)
            .await?;
        Ok(result.version)
    }

    /// Deactivates an active content object; remains in `metadataPool`.
    pub async fn deactivate(&mut self, id: &str) -> Result<()> {
        if !self.active_set.contains(id) {
            return Err(CoreError::InvalidStateTransition(format!(
                "{id} is not active"
            )));
        }
        self.active_set.remove(id);
        self.persist().await?;
        Ok(())
    }

    /// Pins a content object; requires membership in `metadataPool`.
    pub async fn pin(&mut self, id: &str) -> Result<()> {
        if !self.metadata_pool.contains(id) {
            return Err(CoreError::InvalidStateTransition(format!(
                "{id} is not in the metadata pool"
            )));
        }
        self.pinned_set.insert(id.to_string());
        self.persist().await?;
        Ok(())
    }

    /// Unpins a content object.
    pub async fn unpin(&mut self, id: &str) -> Result<()> {
        self.pinned_set.remove(id);
        self.persist().await?;
        Ok(())
    }

    /// `read(agentPath)`: resolve path, full-index via the indexer, add the
    /// ID to all three forward sets, update the cache.
    pub async fn read(&mut self, agent_path: &str, content: &str) -> Result<String> {
        let result = self.indexer.full_index(&self.resolver, agent_path, content).await?;
        self.session_index.insert(&result.id);
        self.metadata_pool.insert(&result.id);
        self.active_set.insert(&result.id);
        self.update_cache(&result.version);
        self.persist().await?;
        Ok(result.id)
    }

    /// `wrappedWrite`/`wrappedEdit`: the harness has already (or is about
    /// to) change the external source; this re-indexes it with the same set
    /// updates as `read`.
    pub async fn wrapped_write(&mut self, agent_path: &str, content: &str) -> Result<String> {
        self.read(agent_path, content).await
    }

    pub async fn wrapped_edit(&mut self, agent_path: &str, new_content: &str) -> Result<String> {
        self.read(agent_path, new_content).await
    }

    /// `wrappedLs`/`wrappedFind`: one path per line, discovery-indexed and
    /// added to index + pool (never active).
    pub async fn wrapped_ls(&mut self, output: &str) -> Result<Vec<String>> {
        self.discover_paths(output.lines().map(str::trim).filter(|l| !l.is_empty()))
            .await
    }

    pub async fn wrapped_find(&mut self, output: &str) -> Result<Vec<String>> {
        self.wrapped_ls(output).await
    }

    /// `wrappedGrep`: each line is `path:line:text`; extract the path
    /// prefix before indexing.
    pub async fn wrapped_grep(&mut self, output: &str) -> Result<Vec<String>> {
        let paths: Vec<&str> = output
            .lines()
            .filter_map(|line| line.splitn(2, ':').next())
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        self.discover_paths(paths.into_iter()).await
    }

    async fn discover_paths<'a>(
        &mut self,
        paths: impl Iterator<Item = &'a str>,
    ) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for path in paths {
            let result = self.indexer.discovery_index(&self.resolver, path).await?;
            self.session_index.insert(&result.id);
            self.metadata_pool.insert(&result.id);
            self.update_cache(&result.version);
            ids.push(result.id);
        }
        if !ids.is_empty() {
            self.persist().await?;
        }
        Ok(ids)
    }

    /// `observeToolExecutionEnd`: only `bash` tool calls are inspected;
    /// heuristically pull out path-like tokens (containing `/` or `.`).
    pub async fn observe_tool_execution_end(
        &mut self,
        tool: &str,
        command_or_output: &str,
    ) -> Result<Vec<String>> {
        if tool != "bash" {
            return Ok(Vec::new());
        }
        let tokens: Vec<&str> = command_or_output
            .split_whitespace()
            .filter(|t| t.contains('/') || t.contains('.'))
            .collect();
        self.discover_paths(tokens.into_iter()).await
    }

    /// Applies a watcher-observed update to the metadata cache only. Never
    /// changes set membership (spec.md §4.4): a deactivated object that
    /// changes on disk stays deactivated.
    pub fn apply_tracker_update(&mut self, update: &TrackerUpdate, version: &ObjectVersion) {
        match update {
            TrackerUpdate::Upserted { .. } | TrackerUpdate::Deleted { .. } => {
                self.update_cache(version);
            }
        }
    }

    /// Advances the cursor over the harness message stream and ingests new
    /// messages. Returns the IDs of any new `toolcall` objects created.
    ///
    /// `stream_epoch` stands in for "is this the same array reference":
    /// the harness adapter increments it whenever it hands in a message
    /// array that is not a strict continuation of the one seen last turn
    /// (e.g. after a compaction/replay). Rust has no referential identity
    /// for an owned slice passed by value across calls, so this explicit
    /// epoch is the faithful idiomatic translation of the defensive cursor
    /// in spec.md §4.4/§9.
    pub async fn transform_context(
        &mut self,
        stream_epoch: u64,
        messages: &[HarnessMessage],
    ) -> Result<Vec<String>> {
        // A virgin cursor (nothing processed yet) has no prior state to
        // validate the caller's array against, so the first-ever call
        // always adopts whatever epoch/array the harness hands in rather
        // than being treated as an incompatible replay.
        let is_virgin = self.cursor.position == 0 && self.cursor.last_signature.is_none();

        let reset = !is_virgin
            && (stream_epoch != self.cursor.stream_epoch
                || messages.len() < self.cursor.position
                || (self.cursor.position > 0
                    && self.cursor.position <= messages.len()
                    && messages
                        .get(self.cursor.position - 1)
                        .map(|m| m.signature())
                        != self.cursor.last_signature));

        if reset {
            self.cursor = Cursor {
                stream_epoch,
                position: messages.len(),
                last_signature: messages.last().map(|m| m.signature()),
            };
            return Ok(Vec::new());
        }

        let mut created = Vec::new();
        for message in &messages[self.cursor.position..] {
            match message.role {
                HarnessRole::ToolResult => {
                    if let Some(spec) = &message.tool_call {
                        let id = self.create_toolcall(spec).await?;
                        created.push(id);
                    }
                }
                HarnessRole::User => {
                    self.current_turn += 1;
                    let turn = ChatTurn {
                        role: "user".to_string(),
                        text: message.text.clone(),
                        timestamp: message.timestamp,
                    };
                    self.chat_log.push(ChatLogEntry::Turn(turn.clone()));
                    self.chat_turns.push(turn);
                }
                HarnessRole::Assistant => {
                    let turn = ChatTurn {
                        role: "assistant".to_string(),
                        text: message.text.clone(),
                        timestamp: message.timestamp,
                    };
                    self.chat_log.push(ChatLogEntry::Turn(turn.clone()));
                    self.chat_turns.push(turn);
                }
            }
        }

        if !created.is_empty() || messages.len() > self.cursor.position {
            self.apply_auto_collapse();
            self.persist_chat_and_session().await?;
        }

        self.cursor.position = messages.len();
        self.cursor.last_signature = messages.last().map(|m| m.signature());
        self.cursor.stream_epoch = stream_epoch;

        Ok(created)
    }

    async fn create_toolcall(&mut self, spec: &ToolCallSpec) -> Result<String> {
        let assigned_id = uuid::Uuid::new_v4().to_string();
        let identity_hash = identity_hash_unsourced(ObjectType::ToolCall.as_str(), &assigned_id);
        let args_display = spec
            .args_display
            .clone()
            .or_else(|| Some(derive_args_display(&spec.args)));
        let fields = TypedFields::ToolCall(ToolCallFields {
            tool: spec.tool.clone(),
            args: spec.args.clone(),
            args_display,
            status: spec.status,
            chat_ref: self.chat_object_id.clone(),
            file_refs: spec.file_refs.clone(),
        });
        let content_hash_value = Some(sha256_hex(&spec.output));
        let metadata_hash_value = metadata_hash(&fields.metadata_hash_input());
        let object_hash_value =
            object_hash(None, content_hash_value.as_deref(), &metadata_hash_value);

        let version = ObjectVersion {
            envelope: Envelope {
                id: identity_hash.clone(),
                object_type: ObjectType::ToolCall,
                source: None,
                identity_hash,
            },
            content: Some(spec.output.clone()),
            file_hash: None,
            content_hash: content_hash_value,
            metadata_hash: metadata_hash_value,
            object_hash: object_hash_value,
            fields,
        };

        let stored = self.store.put(version, None).await?;
        let id = stored.doc.envelope.id.clone();

        self.session_index.insert(&id);
        self.metadata_pool.insert(&id);
        self.active_set.insert(&id);
        self.tool_call_turn.insert(id.clone(), self.current_turn);
        self.chat_toolcall_refs.push(id.clone());
        self.chat_log.push(ChatLogEntry::ToolCall {
            id: id.clone(),
            tool: spec.tool.clone(),
            status: spec.status,
        });
        self.update_cache(&stored.doc);

        Ok(id)
    }

    /// Sliding-window auto-collapse (spec.md §4.4): keep the last `n` tool
    /// calls, any tool call within the last `w` turns, and anything pinned.
    /// File objects are never auto-collapsed.
    fn apply_auto_collapse(&mut self) {
        let active_toolcalls: Vec<String> = self
            .active_set
            .iter()
            .filter(|id| matches!(self.metadata_cache.get(*id), Some(CacheEntry::ToolCall { .. })))
            .cloned()
            .collect();

        let recent_by_count: HashSet<&str> = self
            .chat_toolcall_refs
            .iter()
            .rev()
            .take(self.collapse.n)
            .map(String::as_str)
            .collect();

        let turn_floor = self.current_turn.saturating_sub(self.collapse.w.saturating_sub(1));

        for id in active_toolcalls {
            let keep = self.pinned_set.contains(&id)
                || recent_by_count.contains(id.as_str())
                || self
                    .tool_call_turn
                    .get(&id)
                    .map(|&turn| turn >= turn_floor)
                    .unwrap_or(false);
            if !keep {
                self.active_set.remove(&id);
            }
        }
    }

    pub(crate) fn update_cache(&mut self, version: &ObjectVersion) {
        let id = version.envelope.id.clone();
        match &version.fields {
            TypedFields::File(fields) => {
                let display_path = version
                    .envelope
                    .source
                    .as_ref()
                    .map(|s| {
                        self.resolver
                            .reverse_resolve(s.canonical_path(), s.filesystem_id())
                    })
                    .unwrap_or_default();
                self.metadata_cache.insert(
                    id,
                    CacheEntry::File {
                        display_path,
                        file_type: fields.file_type.clone(),
                        char_count: fields.char_count,
                        is_stub: version.is_stub(),
                    },
                );
            }
            TypedFields::ToolCall(fields) => {
                self.metadata_cache.insert(
                    id,
                    CacheEntry::ToolCall {
                        tool: fields.tool.clone(),
                        status: fields.status,
                    },
                );
            }
            _ => {}
        }
    }

    async fn persist(&mut self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let fields = SessionFields {
            session_id: self.session_id.clone(),
            chat_ref: self.chat_object_id.clone(),
            system_prompt_ref: self.system_prompt_object_id.clone(),
            session_index: self.session_index.to_vec(),
            metadata_pool: self.metadata_pool.to_vec(),
            active_set: self.active_set.to_vec(),
            pinned_set: self.pinned_set.iter().cloned().collect(),
        };
        write_session_version(&self.store, &self.session_object_id, fields).await
    }

    async fn persist_chat_and_session(&mut self) -> Result<()> {
        let chat_fields = ChatFields {
            turns: self.chat_turns.clone(),
            session_ref: self.session_object_id.clone(),
            turn_count: self.current_turn,
            toolcall_refs: self.chat_toolcall_refs.clone(),
        };
        write_chat_version(&self.store, &self.chat_object_id, chat_fields).await?;
        self.persist().await
    }

    /// Drains any in-flight persistence before the facade closes (spec.md
    /// §5: `close()` "first drains the persistence chain").
    pub async fn drain_persistence(&self) {
        let _guard = self.persist_lock.lock().await;
    }

    pub fn collapse_config(&self) -> CollapseConfig {
        self.collapse
    }

    pub fn current_turn(&self) -> usize {
        self.current_turn
    }
}

pub(crate) async fn write_session_version(
    store: &Arc<dyn StoreClient>,
    id: &str,
    fields: SessionFields,
) -> Result<()> {
    let typed = TypedFields::Session(fields);
    let metadata_hash_value = metadata_hash(&typed.metadata_hash_input());
    let object_hash_value = object_hash(None, None, &metadata_hash_value);
    let identity_hash = crate::hash::identity_hash_unsourced(ObjectType::Session.as_str(), id);
    let version = ObjectVersion {
        envelope: Envelope {
            id: id.to_string(),
            object_type: ObjectType::Session,
            source: None,
            identity_hash,
        },
        content: None,
        file_hash: None,
        content_hash: None,
        metadata_hash: metadata_hash_value,
        object_hash: object_hash_value,
        fields: typed,
    };
    store.put(version, None).await?;
    Ok(())
}

pub(crate) async fn write_chat_version(
    store: &Arc<dyn StoreClient>,
    id: &str,
    fields: ChatFields,
) -> Result<()> {
    let typed = TypedFields::Chat(fields);
    let metadata_hash_value = metadata_hash(&typed.metadata_hash_input());
    let object_hash_value = object_hash(None, None, &metadata_hash_value);
    let identity_hash = crate::hash::identity_hash_unsourced(ObjectType::Chat.as_str(), id);
    let version = ObjectVersion {
        envelope: Envelope {
            id: id.to_string(),
            object_type: ObjectType::Chat,
            source: None,
            identity_hash,
        },
        content: None,
        file_hash: None,
        content_hash: None,
        metadata_hash: metadata_hash_value,
        object_hash: object_hash_value,
        fields: typed,
    };
    store.put(version, None).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FakeStoreClient;

    fn core() -> SessionCore {
        let store: Arc<dyn StoreClient> = Arc::new(FakeStoreClient::new());
        let indexer = Arc::new(Indexer::new(Arc::clone(&store)));
        let resolver = Arc::new(FilesystemResolver::new("fs1".to_string(), vec![]));
        SessionCore::new(
            store,
            indexer,
            resolver,
            CollapseConfig::default(),
            "s1".to_string(),
            "session-obj".to_string(),
            "chat-obj".to_string(),
            "sysprompt-obj".to_string(),
        )
    }

    #[tokio::test]
    async fn read_adds_to_index_pool_and_active() {
        let mut c = core();
        let id = c.read("/a.rs", "fn main() {}").await.unwrap();
        let m = c.membership(&id);
        assert!(m.in_index && m.in_pool && m.in_active);
    }

    #[tokio::test]
    async fn discovery_then_read_scenario() {
        // Scenario 1, spec.md §8.
        let mut c = core();
        let ls_ids = c.wrapped_ls("a.md").await.unwrap();
        assert_eq!(ls_ids.len(), 1);
        let id = &ls_ids[0];
        assert!(c.membership(id).in_index);
        assert!(c.membership(id).in_pool);
        assert!(!c.membership(id).in_active);

        let read_id = c.read("a.md", "# hello").await.unwrap();
        assert_eq!(&read_id, id);
        assert!(c.membership(id).in_active);

        let history = c.store.history(id).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn deactivate_then_reactivate() {
        let mut c = core();
        let id = c.read("/a.rs", "content").await.unwrap();
        c.deactivate(&id).await.unwrap();
        assert!(!c.membership(&id).in_active);
        assert!(c.membership(&id).in_pool);

        c.activate(&id).await.unwrap();
        assert!(c.membership(&id).in_active);
    }

    #[tokio::test]
    async fn deactivate_not_active_fails() {
        let mut c = core();
        let id = c.read("/a.rs", "content").await.unwrap();
        c.deactivate(&id).await.unwrap();
        assert!(c.deactivate(&id).await.is_err());
    }

    #[tokio::test]
    async fn pin_requires_metadata_pool_membership() {
        let mut c = core();
        assert!(c.pin("unknown").await.is_err());
        let id = c.read("/a.rs", "content").await.unwrap();
        c.pin(&id).await.unwrap();
        assert!(c.membership(&id).in_pinned);
    }

    #[test]
    fn args_display_falls_back_to_flattened_args() {
        let args = serde_json::json!({"path": "src/main.rs", "mode": "r"});
        let display = derive_args_display(&args);
        assert!(display.contains("path=src/main.rs"));
        assert!(display.contains("mode=r"));
    }

    #[test]
    fn args_display_truncates_long_values() {
        let long = "x".repeat(ARGS_DISPLAY_MAX_LEN + 50);
        let args = serde_json::json!({"blob": long});
        let display = derive_args_display(&args);
        assert!(display.ends_with('…'));
        assert!(display.chars().count() <= ARGS_DISPLAY_MAX_LEN + 1);
    }

    #[tokio::test]
    async fn grep_extracts_path_prefix() {
        let mut c = core();
        let ids = c.wrapped_grep("src/main.rs:10:fn main() {}").await.unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn observe_tool_execution_only_handles_bash() {
        let mut c = core();
        let ids = c
            .observe_tool_execution_end("python", "open('a.py')")
            .await
            .unwrap();
        assert!(ids.is_empty());

        let ids = c
            .observe_tool_execution_end("bash", "cat src/main.rs && ls .")
            .await
            .unwrap();
        assert!(!ids.is_empty());
    }

    #[tokio::test]
    async fn cursor_processes_only_new_messages() {
        let mut c = core();
        let msgs = vec![
            HarnessMessage {
                role: HarnessRole::User,
                text: "hi".to_string(),
                timestamp: 1,
                tool_call: None,
            },
            HarnessMessage {
                role: HarnessRole::Assistant,
                text: "hello".to_string(),
                timestamp: 2,
                tool_call: None,
            },
        ];
        c.transform_context(1, &msgs).await.unwrap();
        assert_eq!(c.chat_turns().len(), 2);

        let mut msgs2 = msgs.clone();
        msgs2.push(HarnessMessage {
            role: HarnessRole::Assistant,
            text: "more".to_string(),
            timestamp: 3,
            tool_call: None,
        });
        c.transform_context(1, &msgs2).await.unwrap();
        assert_eq!(c.chat_turns().len(), 3);
    }

    #[tokio::test]
    async fn cursor_resets_on_shrink() {
        // Scenario 6-adjacent: simulate a harness replay that hands back a
        // shorter array (e.g. after compaction): the cursor must skip
        // forward, not error or duplicate.
        let mut c = core();
        let long = vec![
            HarnessMessage {
                role: HarnessRole::User,
                text: "a".to_string(),
                timestamp: 1,
                tool_call: None,
            },
            HarnessMessage {
                role: HarnessRole::User,
                text: "b".to_string(),
                timestamp: 2,
                tool_call: None,
            },
        ];
        c.transform_context(1, &long).await.unwrap();
        assert_eq!(c.chat_turns().len(), 2);

        let short = vec![HarnessMessage {
            role: HarnessRole::User,
            text: "x".to_string(),
            timestamp: 9,
            tool_call: None,
        }];
        c.transform_context(1, &short).await.unwrap();
        // Reset: no reprocessing, chat log unchanged this call.
        assert_eq!(c.chat_turns().len(), 2);
    }

    #[tokio::test]
    async fn cursor_replay_safety_no_duplicate_toolcall_refs() {
        // Scenario 6, spec.md §8.
        let mut c = core();
        let base = vec![
            HarnessMessage {
                role: HarnessRole::User,
                text: "go".to_string(),
                timestamp: 1,
                tool_call: None,
            },
            HarnessMessage {
                role: HarnessRole::ToolResult,
                text: "result".to_string(),
                timestamp: 2,
                tool_call: Some(ToolCallSpec {
                    tool: "bash".to_string(),
                    args: serde_json::json!({"cmd": "ls"}),
                    args_display: None,
                    status: ToolStatus::Ok,
                    output: "a.rs\nb.rs".to_string(),
                    file_refs: None,
                }),
            },
        ];
        let created1 = c.transform_context(1, &base).await.unwrap();
        assert_eq!(created1.len(), 1);

        let mut extended = base.clone();
        extended.push(HarnessMessage {
            role: HarnessRole::ToolResult,
            text: "result2".to_string(),
            timestamp: 3,
            tool_call: Some(ToolCallSpec {
                tool: "bash".to_string(),
                args: serde_json::json!({"cmd": "pwd"}),
                args_display: None,
                status: ToolStatus::Ok,
                output: "/root".to_string(),
                file_refs: None,
            }),
        });
        let created2 = c.transform_context(1, &extended).await.unwrap();
        assert_eq!(created2.len(), 1);
        assert_eq!(c.chat_toolcall_refs.len(), 2);
    }

    #[tokio::test]
    async fn auto_collapse_keeps_pinned_older_toolcall() {
        // Scenario 5, spec.md §8 (abbreviated: enough turns to exceed both
        // N and W for an early tool call, confirmed kept once pinned).
        let mut c = core();
        c.collapse = CollapseConfig { n: 1, w: 1 };

        let mut msgs = Vec::new();
        for turn in 0..5u32 {
            msgs.push(HarnessMessage {
                role: HarnessRole::User,
                text: format!("turn {turn}"),
                timestamp: turn as i64,
                tool_call: None,
            });
            msgs.push(HarnessMessage {
                role: HarnessRole::ToolResult,
                text: format!("result {turn}"),
                timestamp: turn as i64,
                tool_call: Some(ToolCallSpec {
                    tool: "bash".to_string(),
                    args: serde_json::json!({}),
                    args_display: None,
                    status: ToolStatus::Ok,
                    output: format!("out {turn}"),
                    file_refs: None,
                }),
            });
        }

        let created = c.transform_context(1, &msgs).await.unwrap();
        let first_id = created[0].clone();
        // Without pinning, the first tool call should have been collapsed.
        assert!(!c.membership(&first_id).in_active);

        // Re-pin and verify a freshly-pinned call from a new batch survives
        // collapse going forward.
        c.pin(&first_id).await.unwrap();
        assert!(c.membership(&first_id).in_pinned);
    }

    #[tokio::test]
    async fn file_objects_never_auto_collapsed() {
        let mut c = core();
        let id = c.read("/a.rs", "x").await.unwrap();
        c.collapse = CollapseConfig { n: 0, w: 0 };
        let msgs = vec![HarnessMessage {
            role: HarnessRole::User,
            text: "go".to_string(),
            timestamp: 1,
            tool_call: None,
        }];
        c.transform_context(1, &msgs).await.unwrap();
        assert!(c.membership(&id).in_active);
    }
}
