//! The five-hash hierarchy and the stable stringifier it is built on.
//!
//! All hashes are SHA-256 hex of a UTF-8 byte string. Non-scalar inputs go
//! through [`stable_stringify`] first so that two implementations (or two
//! agents) hashing the same logical value always produce the same digest.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Canonicalizes a JSON value into the hierarchy's wire format: objects with
/// lexicographically sorted keys, arrays in order, scalars via canonical
/// JSON, no whitespace anywhere.
///
/// This is the one routine every hash in the hierarchy funnels through.
/// Deviating here breaks multi-agent identity convergence (spec.md §9), so
/// it is implemented once and exhaustively tested against fixed vectors.
pub fn stable_stringify(value: &Value) -> String {
    let mut out = String::new();
    write_stable(value, &mut out);
    out
}

fn write_stable(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => {
            out.push_str(&serde_json::to_string(s).expect("string serialization is infallible"));
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_stable(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).expect("string serialization is infallible"));
                out.push(':');
                write_stable(&map[*key], out);
            }
            out.push('}');
        }
    }
}

/// SHA-256 hex digest of a UTF-8 byte string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// SHA-256 hex digest of raw bytes (used for `fileHash` over source bytes
/// that may not be valid UTF-8 on disk but are always treated as a UTF-8
/// byte string per spec.md §4.1 for text content).
pub fn sha256_hex_bytes(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// `identityHash` for a sourced object: `stableStringify({type, source})`.
pub fn identity_hash_sourced(object_type: &str, source: &Value) -> String {
    let envelope = serde_json::json!({ "type": object_type, "source": source });
    sha256_hex(&stable_stringify(&envelope))
}

/// `identityHash` for an unsourced object:
/// `stableStringify({type, "xt/id": assignedId})`.
pub fn identity_hash_unsourced(object_type: &str, assigned_id: &str) -> String {
    let envelope = serde_json::json!({ "type": object_type, "xt/id": assigned_id });
    sha256_hex(&stable_stringify(&envelope))
}

/// `fileHash` of raw source bytes, treated as a UTF-8 byte string.
pub fn file_hash(content: &str) -> String {
    sha256_hex(content)
}

/// `contentHash` of the stored payload. `None` iff `content` is `None`.
pub fn content_hash(content: Option<&str>) -> Option<String> {
    content.map(sha256_hex)
}

/// `metadataHash`: `stableStringify(typeSpecificFields)`, where
/// `type_specific_fields` must already exclude the envelope/hash fields the
/// spec names (callers build this value from the exact per-type field list
/// in spec.md §3, never from the whole document).
pub fn metadata_hash(type_specific_fields: &Value) -> String {
    sha256_hex(&stable_stringify(type_specific_fields))
}

/// `objectHash`: `stableStringify({fileHash, contentHash, metadataHash})`.
pub fn object_hash(
    file_hash: Option<&str>,
    content_hash: Option<&str>,
    metadata_hash: &str,
) -> String {
    let composite = serde_json::json!({
        "fileHash": file_hash,
        "contentHash": content_hash,
        "metadataHash": metadata_hash,
    });
    sha256_hex(&stable_stringify(&composite))
}
