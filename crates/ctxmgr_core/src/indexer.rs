//! The indexing protocol: new/unchanged/updated decisions, stub upgrade,
//! and deletion tombstones (spec.md §4.3).

use crate::hash::{content_hash, file_hash, identity_hash_sourced, metadata_hash, object_hash};
use crate::resolver::FilesystemResolver;
use crate::store::StoreClient;
use crate::types::{Envelope, FileFields, ObjectType, ObjectVersion, Source, TypedFields};
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Outcome of an indexing operation, exactly the three spec.md §4.3 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Created,
    Unchanged,
    Updated,
}

/// A file object id paired with the decision the indexer made about it.
#[derive(Debug, Clone)]
pub struct IndexResult {
    pub id: String,
    pub outcome: IndexOutcome,
    pub version: ObjectVersion,
}

/// Implements the indexing protocol against a [`StoreClient`].
pub struct Indexer {
    store: Arc<dyn StoreClient>,
}

impl Indexer {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    fn source_for(resolver: &FilesystemResolver, agent_path: &str) -> Source {
        let resolved = resolver.resolve(agent_path);
        Source::Filesystem {
            filesystem_id: resolved.filesystem_id,
            canonical_path: resolved.canonical_path,
        }
    }

    fn object_id_for(source: &Source) -> String {
        identity_hash_sourced(ObjectType::File.as_str(), &source.to_json())
    }

    fn file_type_of(canonical_path: &str) -> String {
        Path::new(canonical_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string()
    }

    fn build_version(
        id: String,
        source: Source,
        content: Option<&str>,
        file_hash_value: Option<String>,
        file_type: String,
    ) -> ObjectVersion {
        let char_count = content.map(|c| c.chars().count()).unwrap_or(0);
        let fields = TypedFields::File(FileFields {
            file_type,
            char_count,
        });
        let content_hash_value = content_hash(content);
        let metadata_hash_value = metadata_hash(&fields.metadata_hash_input());
        let object_hash_value = object_hash(
            file_hash_value.as_deref(),
            content_hash_value.as_deref(),
            &metadata_hash_value,
        );
        let identity_hash = identity_hash_sourced(ObjectType::File.as_str(), &source.to_json());
        ObjectVersion {
            envelope: Envelope {
                id,
                object_type: ObjectType::File,
                source: Some(source),
                identity_hash,
            },
            content: content.map(|c| c.to_string()),
            file_hash: file_hash_value,
            content_hash: content_hash_value,
            metadata_hash: metadata_hash_value,
            object_hash: object_hash_value,
            fields,
        }
    }

    /// Full indexing: called when content is known (agent read, watcher
    /// event, resume reconcile). Steps 1-5 of spec.md §4.3.
    pub async fn full_index(
        &self,
        resolver: &FilesystemResolver,
        agent_path: &str,
        content: &str,
    ) -> Result<IndexResult> {
        let source = Self::source_for(resolver, agent_path);
        let id = Self::object_id_for(&source);
        let fh = file_hash(content);
        let file_type = Self::file_type_of(source.canonical_path());

        let current = self.store.get(&id).await?;
        let outcome = match &current {
            None => IndexOutcome::Created,
            Some(stored) if stored.doc.file_hash.is_none() => IndexOutcome::Updated,
            Some(stored) if stored.doc.file_hash.as_deref() == Some(fh.as_str()) => {
                IndexOutcome::Unchanged
            }
            Some(_) => IndexOutcome::Updated,
        };

        if outcome == IndexOutcome::Unchanged {
            let version = current.expect("unchanged implies a prior version exists").doc;
            return Ok(IndexResult { id, outcome, version });
        }

        let version = Self::build_version(id.clone(), source, Some(content), Some(fh), file_type);
        let stored = self.store.put(version, None).await?;
        Ok(IndexResult {
            id,
            outcome,
            version: stored.doc,
        })
    }

    /// Discovery indexing: called on `ls`/`find`/`grep` output where only a
    /// path is known. Discovery never overwrites an existing object, full or
    /// stub (idempotence of discovery, spec.md §8).
    pub async fn discovery_index(
        &self,
        resolver: &FilesystemResolver,
        agent_path: &str,
    ) -> Result<IndexResult> {
        let source = Self::source_for(resolver, agent_path);
        let id = Self::object_id_for(&source);

        if let Some(stored) = self.store.get(&id).await? {
            return Ok(IndexResult {
                id,
                outcome: IndexOutcome::Unchanged,
                version: stored.doc,
            });
        }

        let file_type = Self::file_type_of(source.canonical_path());
        let version = Self::build_version(id.clone(), source, None, None, file_type);
        let stored = self.store.put(version, None).await?;
        Ok(IndexResult {
            id,
            outcome: IndexOutcome::Created,
            version: stored.doc,
        })
    }

    /// Deletion: watcher unlink, or resume confirming absence. Writes a new
    /// version with `content/fileHash/contentHash == null`, same envelope
    /// and object id, preserving history.
    pub async fn delete(
        &self,
        resolver: &FilesystemResolver,
        agent_path: &str,
    ) -> Result<IndexResult> {
        let source = Self::source_for(resolver, agent_path);
        let id = Self::object_id_for(&source);
        let file_type = match self.store.get(&id).await? {
            Some(stored) => stored
                .doc
                .fields
                .as_file()
                .map(|f| f.file_type.clone())
                .unwrap_or_default(),
            None => Self::file_type_of(source.canonical_path()),
        };
        let version = Self::build_version(id.clone(), source, None, None, file_type);
        let stored = self.store.put(version, None).await?;
        Ok(IndexResult {
            id,
            outcome: IndexOutcome::Updated,
            version: stored.doc,
        })
    }
}
