//! Translate agent-visible paths to canonical host paths and back.
//!
//! Grounded on the sibling crate's `Refs`/path-handling conventions (atomic,
//! deterministic path manipulation with no filesystem probing at resolve
//! time) but built fresh: the sibling crate has no multi-filesystem mount
//! concept since it only ever deals with one local checkout.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// One bind-mount mapping between an agent-visible prefix and a canonical
/// host prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountMapping {
    pub agent_prefix: String,
    pub canonical_prefix: String,
    pub filesystem_id: String,
    pub writable: bool,
}

/// Result of resolving an agent-visible path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub filesystem_id: String,
    pub canonical_path: String,
    pub is_mounted: bool,
}

/// Translates agent-visible paths to canonical paths (and back), tags each
/// with a filesystem identifier, and decides watchability.
///
/// Mappings are kept sorted by `agent_prefix` length descending so
/// `resolve`/`reverse_resolve` can do a simple linear longest-prefix-match
/// scan. Insertion order is preserved among equal-length prefixes, which is
/// exactly the tie-break spec.md §4.2 calls for.
#[derive(Debug, Clone)]
pub struct FilesystemResolver {
    default_filesystem_id: String,
    mappings: Vec<MountMapping>,
}

impl FilesystemResolver {
    pub fn new(default_filesystem_id: String, mut mappings: Vec<MountMapping>) -> Self {
        // Stable sort preserves insertion order among equal-length prefixes.
        mappings.sort_by(|a, b| b.agent_prefix.len().cmp(&a.agent_prefix.len()));
        Self {
            default_filesystem_id,
            mappings,
        }
    }

    pub fn default_filesystem_id(&self) -> &str {
        &self.default_filesystem_id
    }

    /// Longest-prefix match on `agent_prefix`.
    pub fn resolve(&self, agent_path: &str) -> ResolvedPath {
        for mapping in &self.mappings {
            if let Some(rest) = agent_path.strip_prefix(mapping.agent_prefix.as_str()) {
                let canonical_path = format!("{}{}", mapping.canonical_prefix, rest);
                return ResolvedPath {
                    filesystem_id: mapping.filesystem_id.clone(),
                    canonical_path,
                    is_mounted: true,
                };
            }
        }
        ResolvedPath {
            filesystem_id: self.default_filesystem_id.clone(),
            canonical_path: agent_path.to_string(),
            is_mounted: false,
        }
    }

    /// Longest-prefix match on `canonical_prefix` with a matching
    /// `filesystem_id`.
    pub fn reverse_resolve(&self, canonical_path: &str, filesystem_id: &str) -> String {
        let mut best: Option<&MountMapping> = None;
        for mapping in &self.mappings {
            if mapping.filesystem_id != filesystem_id {
                continue;
            }
            if canonical_path.starts_with(mapping.canonical_prefix.as_str()) {
                let better = match best {
                    None => true,
                    Some(b) => mapping.canonical_prefix.len() > b.canonical_prefix.len(),
                };
                if better {
                    best = Some(mapping);
                }
            }
        }
        match best {
            Some(mapping) => {
                let rest = &canonical_path[mapping.canonical_prefix.len()..];
                format!("{}{}", mapping.agent_prefix, rest)
            }
            None => canonical_path.to_string(),
        }
    }

    /// Only bind-mounted (host-visible) paths are watchable; overlay or
    /// container-internal paths never get a tracker.
    pub fn is_watchable(&self, agent_path: &str) -> bool {
        self.resolve(agent_path).is_mounted
    }

    pub fn mappings(&self) -> &[MountMapping] {
        &self.mappings
    }
}

/// Derives a platform-portable filesystem identifier from `/etc/machine-id`
/// (or the platform equivalent). Bind mounts must be configured with the
/// *host's* identifier so sandbox-side and host-side agents converge on the
/// same object identity for the same underlying file (spec.md §4.2).
///
/// This never probes the filesystem at resolve time; it is a one-shot
/// startup computation fed into `FilesystemResolver::new` via config.
pub fn default_filesystem_id() -> String {
    for candidate in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
        if let Ok(contents) = fs::read_to_string(Path::new(candidate)) {
            let trimmed = contents.trim();
            if !trimmed.is_empty() {
                return hash_machine_id(trimmed);
            }
        }
    }
    // No machine id available (e.g. some containers/CI): fall back to a
    // fixed label rather than probing further. Misconfiguration here causes
    // object isolation, not corruption, per spec.md §4.2.
    hash_machine_id("unknown-filesystem")
}

fn hash_machine_id(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
