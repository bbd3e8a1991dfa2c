//! Core data model: objects, envelopes, and type-specific payloads.
//!
//! Per spec.md §9, "dynamic objects with optional fields" from the source
//! design are re-architected here as a tagged union over object type with
//! type-specific payload structs — no runtime reflection, matching on the
//! tag instead. The "locked" flag from the legacy design is gone: whether an
//! object can enter a session set is a compile-time property of the variant
//! (`ObjectType::is_content()`), not a runtime guard.

use serde::{Deserialize, Serialize};

/// The five object types named in spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    File,
    ToolCall,
    Chat,
    SystemPrompt,
    Session,
}

impl ObjectType {
    /// Content objects (`file`, `toolcall`) participate in session sets and
    /// can be activated. Infrastructure objects never can.
    pub fn is_content(self) -> bool {
        matches!(self, ObjectType::File | ObjectType::ToolCall)
    }

    /// Only `file` objects are sourced; everything else is assigned an ID at
    /// creation.
    pub fn is_sourced(self) -> bool {
        matches!(self, ObjectType::File)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::File => "file",
            ObjectType::ToolCall => "toolcall",
            ObjectType::Chat => "chat",
            ObjectType::SystemPrompt => "system_prompt",
            ObjectType::Session => "session",
        }
    }
}

/// The immutable source binding for a sourced object. Only one kind exists
/// today (spec.md §3): a filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    Filesystem {
        #[serde(rename = "filesystemId")]
        filesystem_id: String,
        #[serde(rename = "canonicalPath")]
        canonical_path: String,
    },
}

impl Source {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("Source serializes infallibly")
    }

    pub fn canonical_path(&self) -> &str {
        match self {
            Source::Filesystem { canonical_path, .. } => canonical_path,
        }
    }

    pub fn filesystem_id(&self) -> &str {
        match self {
            Source::Filesystem { filesystem_id, .. } => filesystem_id,
        }
    }
}

/// Tool call outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Fail,
}

impl ToolStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolStatus::Ok => "ok",
            ToolStatus::Fail => "fail",
        }
    }
}

/// Type-specific fields for a `file` object. Exactly the fields the
/// `metadataHash` is computed from for this type (spec.md §3/§4.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FileFields {
    #[serde(rename = "fileType")]
    pub file_type: String,
    #[serde(rename = "charCount")]
    pub char_count: usize,
}

/// Type-specific fields for a `toolcall` object. Created once, never
/// updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFields {
    pub tool: String,
    pub args: serde_json::Value,
    #[serde(rename = "argsDisplay", skip_serializing_if = "Option::is_none")]
    pub args_display: Option<String>,
    pub status: ToolStatus,
    #[serde(rename = "chatRef")]
    pub chat_ref: String,
    #[serde(rename = "fileRefs", skip_serializing_if = "Option::is_none")]
    pub file_refs: Option<Vec<String>>,
}

/// One turn in a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub text: String,
    pub timestamp: i64,
}

/// Type-specific fields for a `chat` object. A new version is written per
/// turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChatFields {
    pub turns: Vec<ChatTurn>,
    #[serde(rename = "sessionRef")]
    pub session_ref: String,
    #[serde(rename = "turnCount")]
    pub turn_count: usize,
    #[serde(rename = "toolcallRefs")]
    pub toolcall_refs: Vec<String>,
}

/// Type-specific fields for a `session` object: the four session sets plus
/// the infrastructure refs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionFields {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "chatRef")]
    pub chat_ref: String,
    #[serde(rename = "systemPromptRef")]
    pub system_prompt_ref: String,
    #[serde(rename = "sessionIndex")]
    pub session_index: Vec<String>,
    #[serde(rename = "metadataPool")]
    pub metadata_pool: Vec<String>,
    #[serde(rename = "activeSet")]
    pub active_set: Vec<String>,
    #[serde(rename = "pinnedSet")]
    pub pinned_set: Vec<String>,
}

/// The type-specific payload, tagged by `ObjectType`. `system_prompt` has no
/// fields beyond `content` so it carries an empty struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedFields {
    File(FileFields),
    ToolCall(ToolCallFields),
    Chat(ChatFields),
    SystemPrompt,
    Session(SessionFields),
}

impl TypedFields {
    pub fn object_type(&self) -> ObjectType {
        match self {
            TypedFields::File(_) => ObjectType::File,
            TypedFields::ToolCall(_) => ObjectType::ToolCall,
            TypedFields::Chat(_) => ObjectType::Chat,
            TypedFields::SystemPrompt => ObjectType::SystemPrompt,
            TypedFields::Session(_) => ObjectType::Session,
        }
    }

    /// The JSON value `metadataHash` must be computed from: exactly the
    /// type-specific fields, nothing from the envelope or the hash set.
    pub fn metadata_hash_input(&self) -> serde_json::Value {
        match self {
            TypedFields::File(f) => serde_json::to_value(f).unwrap(),
            TypedFields::ToolCall(f) => serde_json::to_value(f).unwrap(),
            TypedFields::Chat(f) => serde_json::to_value(f).unwrap(),
            TypedFields::SystemPrompt => serde_json::json!({}),
            TypedFields::Session(f) => serde_json::to_value(f).unwrap(),
        }
    }

    pub fn as_file(&self) -> Option<&FileFields> {
        match self {
            TypedFields::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileFields> {
        match self {
            TypedFields::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_toolcall(&self) -> Option<&ToolCallFields> {
        match self {
            TypedFields::ToolCall(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_session(&self) -> Option<&SessionFields> {
        match self {
            TypedFields::Session(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_session_mut(&mut self) -> Option<&mut SessionFields> {
        match self {
            TypedFields::Session(f) => Some(f),
            _ => None,
        }
    }
}

/// The immutable envelope shared by every version of an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    #[serde(rename = "objectType")]
    pub object_type: ObjectType,
    pub source: Option<Source>,
    #[serde(rename = "identityHash")]
    pub identity_hash: String,
}

/// One version of an object: the immutable envelope plus a mutable payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectVersion {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub content: Option<String>,
    #[serde(rename = "fileHash")]
    pub file_hash: Option<String>,
    #[serde(rename = "contentHash")]
    pub content_hash: Option<String>,
    #[serde(rename = "metadataHash")]
    pub metadata_hash: String,
    #[serde(rename = "objectHash")]
    pub object_hash: String,
    pub fields: TypedFields,
}

impl ObjectVersion {
    /// True once a sourced file object has had its content read at least
    /// once (`fileHash` present). False for a discovery stub.
    pub fn is_stub(&self) -> bool {
        self.envelope.object_type == ObjectType::File && self.file_hash.is_none()
    }

    /// A tombstone is a file version confirmed deleted: `content == null`
    /// and `fileHash == null` on an object that used to be full. Structurally
    /// identical to a stub; the distinction is historical (§3 Lifecycle),
    /// not representable in a single version alone.
    pub fn is_deleted(&self) -> bool {
        self.content.is_none() && self.file_hash.is_none()
    }
}
