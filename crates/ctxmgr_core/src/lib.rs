//! Context manager core.
//!
//! A context management layer sitting between a language-model agent and its
//! underlying conversation/tool host: decides, each turn, which artifacts
//! (files, tool outputs) are rendered into the model's limited context
//! window, while preserving the full history of everything the agent has
//! ever touched in a durable, bi-temporally versioned store.
//!
//! # Quick start
//!
//! ```
//! use ctxmgr_core::{ExtensionFacade, FacadeConfig, FakeStoreClient};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(FakeStoreClient::new());
//! let config = FacadeConfig::new("session-1").with_system_prompt("be helpful");
//! let mut facade = ExtensionFacade::load(config, store).await.unwrap();
//!
//! let status = facade.read("/tmp/example.txt", "hello world").await;
//! assert!(status.ok);
//! # }
//! ```

mod assembler;
mod config;
mod error;
mod facade;
mod hash;
mod indexer;
mod resolver;
mod resume;
mod session_core;
mod store;
mod tracker;
mod types;

pub use assembler::{render_context, AssembledMessage, MessageRole as RenderedRole};
pub use config::{CollapseConfig, FacadeConfig, TrackerConfig};
pub use error::{CoreError, Result};
pub use facade::{ExtensionFacade, ToolStatusReport};
pub use hash::{
    content_hash, file_hash, identity_hash_sourced, identity_hash_unsourced, metadata_hash,
    object_hash, sha256_hex, stable_stringify,
};
pub use indexer::{IndexOutcome, IndexResult, Indexer};
pub use resolver::{default_filesystem_id, FilesystemResolver, MountMapping, ResolvedPath};
pub use session_core::{
    CacheEntry, ChatLogEntry, HarnessMessage, HarnessRole, SessionCore, SetMembership,
    ToolCallSpec,
};
pub use store::{FakeStoreClient, HttpStoreClient, StoreClient, StoredVersion};
pub use tracker::{SourceLifecycle, Tracker, TrackerUpdate};
pub use types::{
    ChatFields, ChatTurn, Envelope, FileFields, ObjectType, ObjectVersion, Source, SessionFields,
    ToolCallFields, ToolStatus, TypedFields,
};

/// Time provider for testing.
///
/// Allows injecting controlled time into the tracker's rename-detection
/// window and the session's turn bookkeeping. Always available but only
/// overridden explicitly in tests; production code uses [`SystemTimeProvider`].
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in seconds.
    fn now(&self) -> i64;
}

impl<F> TimeProvider for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now(&self) -> i64 {
        self()
    }
}

/// Default, system-clock-backed [`TimeProvider`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_secs() as i64
    }
}
