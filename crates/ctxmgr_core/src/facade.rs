//! `ExtensionFacade`: the tool surface the harness plugs in (spec.md §4,
//! §6, §7).
//!
//! Wires `SessionCore` + `Indexer` + `FilesystemResolver` + `Tracker` +
//! `StoreClient` together and enforces the global error policy: agent-facing
//! calls never propagate a `Result` the harness has to unwrap — every one
//! returns a status object, except `load()` (spec.md §7: "the one fatal
//! condition is inability to reach the store on initial load()").

use crate::assembler::{render_context, AssembledMessage};
use crate::config::FacadeConfig;
use crate::error::Result;
use crate::indexer::Indexer;
use crate::resolver::FilesystemResolver;
use crate::resume::resume;
use crate::session_core::{HarnessMessage, SessionCore};
use crate::store::StoreClient;
use crate::tracker::Tracker;
use crate::{SystemTimeProvider, TimeProvider};
use std::sync::Arc;
use tracing::{error, warn};

/// Status object every agent-facing operation returns instead of letting an
/// error escape (spec.md §7).
#[derive(Debug, Clone)]
pub struct ToolStatusReport {
    pub ok: bool,
    pub message: String,
    pub id: Option<String>,
}

impl ToolStatusReport {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            id: None,
        }
    }

    fn ok_with_id(message: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            id: Some(id.into()),
        }
    }

    fn err(message: impl std::fmt::Display) -> Self {
        Self {
            ok: false,
            message: message.to_string(),
            id: None,
        }
    }
}

/// The public tool surface. One instance per session.
pub struct ExtensionFacade {
    session: SessionCore,
    store: Arc<dyn StoreClient>,
    resolver: Arc<FilesystemResolver>,
    tracker: Arc<Tracker>,
    tracker_updates: tokio::sync::mpsc::UnboundedReceiver<crate::tracker::TrackerUpdate>,
    system_prompt_content: String,
}

impl ExtensionFacade {
    /// Connects to the store at `config.store_base_url` and loads the
    /// session. This is the production entry point; `load` remains available
    /// directly for callers (tests, the CLI against a non-HTTP double) that
    /// already hold a constructed `StoreClient`.
    pub async fn connect(config: FacadeConfig) -> Result<Self> {
        let store: Arc<dyn StoreClient> =
            Arc::new(crate::store::HttpStoreClient::new(&config.store_base_url));
        Self::load(config, store).await
    }

    /// Runs the resume protocol against `store` and re-establishes trackers
    /// for every watchable sourced object. The only facade call that lets an
    /// error propagate (spec.md §7): an unreachable store on load is fatal.
    pub async fn load(config: FacadeConfig, store: Arc<dyn StoreClient>) -> Result<Self> {
        let resolver = Arc::new(FilesystemResolver::new(
            config
                .default_filesystem_id
                .clone()
                .unwrap_or_else(crate::resolver::default_filesystem_id),
            config.mount_mappings.clone(),
        ));
        let indexer = Arc::new(Indexer::new(Arc::clone(&store)));
        let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let tracker = Arc::new(Tracker::new(
            Arc::clone(&resolver),
            Arc::clone(&indexer),
            time,
            config.tracker.rename_window,
        ));
        let tracker_updates = tracker
            .take_updates()
            .expect("tracker update channel taken exactly once at construction");

        let outcome = resume(Arc::clone(&store), indexer, Arc::clone(&resolver), &config).await?;

        for agent_path in &outcome.watchable_agent_paths {
            if let Err(e) = tracker.attach(agent_path) {
                warn!(agent_path = %agent_path, error = %e, "failed to re-attach tracker on load");
            }
        }

        Ok(Self {
            session: outcome.session,
            store,
            resolver,
            tracker,
            tracker_updates,
            system_prompt_content: config.system_prompt.unwrap_or_default(),
        })
    }

    /// Drains the persistence chain, then releases the watcher (spec.md
    /// §5).
    pub async fn close(&mut self) {
        self.session.drain_persistence().await;
        self.drain_tracker_updates().await;
    }

    /// Pumps any pending tracker updates into the session's metadata cache.
    /// Called at the top of every other facade method so the single logical
    /// task model (spec.md §5) holds without a separate concurrent mutator
    /// of `SessionCore`.
    async fn drain_tracker_updates(&mut self) {
        while let Ok(update) = self.tracker_updates.try_recv() {
            let object_id = match &update {
                crate::tracker::TrackerUpdate::Upserted { object_id, .. } => object_id.clone(),
                crate::tracker::TrackerUpdate::Deleted { object_id, .. } => object_id.clone(),
            };
            match self.store.get(&object_id).await {
                Ok(Some(stored)) => self.session.apply_tracker_update(&update, &stored.doc),
                Ok(None) => {}
                Err(e) => error!(object_id = %object_id, error = %e, "failed to fetch tracker-updated object"),
            }
        }
    }

    pub async fn activate(&mut self, id: &str) -> ToolStatusReport {
        self.drain_tracker_updates().await;
        match self.session.activate(id).await {
            Ok(()) => ToolStatusReport::ok_with_id("activated", id),
            Err(e) => ToolStatusReport::err(e),
        }
    }

    pub async fn deactivate(&mut self, id: &str) -> ToolStatusReport {
        self.drain_tracker_updates().await;
        match self.session.deactivate(id).await {
            Ok(()) => ToolStatusReport::ok_with_id("deactivated", id),
            Err(e) => ToolStatusReport::err(e),
        }
    }

    pub async fn pin(&mut self, id: &str) -> ToolStatusReport {
        self.drain_tracker_updates().await;
        match self.session.pin(id).await {
            Ok(()) => ToolStatusReport::ok_with_id("pinned", id),
            Err(e) => ToolStatusReport::err(e),
        }
    }

    pub async fn unpin(&mut self, id: &str) -> ToolStatusReport {
        self.drain_tracker_updates().await;
        match self.session.unpin(id).await {
            Ok(()) => ToolStatusReport::ok_with_id("unpinned", id),
            Err(e) => ToolStatusReport::err(e),
        }
    }

    pub async fn read(&mut self, agent_path: &str, content: &str) -> ToolStatusReport {
        self.drain_tracker_updates().await;
        match self.session.read(agent_path, content).await {
            Ok(id) => {
                if let Err(e) = self.tracker.attach(agent_path) {
                    warn!(agent_path, error = %e, "failed to attach tracker after read");
                }
                ToolStatusReport::ok_with_id("indexed", id)
            }
            Err(e) => ToolStatusReport::err(e),
        }
    }

    pub async fn wrapped_write(&mut self, agent_path: &str, content: &str) -> ToolStatusReport {
        self.drain_tracker_updates().await;
        match self.session.wrapped_write(agent_path, content).await {
            Ok(id) => {
                if let Err(e) = self.tracker.attach(agent_path) {
                    warn!(agent_path, error = %e, "failed to attach tracker after write");
                }
                ToolStatusReport::ok_with_id("indexed", id)
            }
            Err(e) => ToolStatusReport::err(e),
        }
    }

    pub async fn wrapped_edit(&mut self, agent_path: &str, new_content: &str) -> ToolStatusReport {
        self.drain_tracker_updates().await;
        match self.session.wrapped_edit(agent_path, new_content).await {
            Ok(id) => ToolStatusReport::ok_with_id("indexed", id),
            Err(e) => ToolStatusReport::err(e),
        }
    }

    pub async fn wrapped_ls(&mut self, output: &str) -> ToolStatusReport {
        self.drain_tracker_updates().await;
        match self.session.wrapped_ls(output).await {
            Ok(ids) => ToolStatusReport::ok(format!("discovered {} paths", ids.len())),
            Err(e) => ToolStatusReport::err(e),
        }
    }

    pub async fn wrapped_find(&mut self, output: &str) -> ToolStatusReport {
        self.drain_tracker_updates().await;
        match self.session.wrapped_find(output).await {
            Ok(ids) => ToolStatusReport::ok(format!("discovered {} paths", ids.len())),
            Err(e) => ToolStatusReport::err(e),
        }
    }

    pub async fn wrapped_grep(&mut self, output: &str) -> ToolStatusReport {
        self.drain_tracker_updates().await;
        match self.session.wrapped_grep(output).await {
            Ok(ids) => ToolStatusReport::ok(format!("discovered {} paths", ids.len())),
            Err(e) => ToolStatusReport::err(e),
        }
    }

    pub async fn observe_tool_execution_end(
        &mut self,
        tool: &str,
        command_or_output: &str,
    ) -> ToolStatusReport {
        self.drain_tracker_updates().await;
        match self
            .session
            .observe_tool_execution_end(tool, command_or_output)
            .await
        {
            Ok(ids) => ToolStatusReport::ok(format!("observed {} paths", ids.len())),
            Err(e) => ToolStatusReport::err(e),
        }
    }

    /// Ingests new harness messages (advancing the cursor) and renders the
    /// full four-section context. Given identical state and an empty
    /// `messages` tail this is byte-identical across calls (spec.md §8).
    pub async fn transform_context(
        &mut self,
        stream_epoch: u64,
        messages: &[HarnessMessage],
    ) -> Result<Vec<AssembledMessage>> {
        self.drain_tracker_updates().await;
        self.session.transform_context(stream_epoch, messages).await?;
        render_context(&self.session, self.store.as_ref(), &self.system_prompt_content).await
    }

    /// Full bi-temporal version history of an object, straight from the
    /// store. Read-only diagnostic surface for resume tooling, not part of
    /// the agent-facing tool set.
    pub async fn history(&self, id: &str) -> Result<Vec<crate::store::StoredVersion>> {
        self.store.history(id).await
    }

    /// The version of an object valid as of `valid_time`, straight from the
    /// store. Same diagnostic purpose as [`Self::history`].
    pub async fn get_as_of(
        &self,
        id: &str,
        valid_time: i64,
    ) -> Result<Option<crate::store::StoredVersion>> {
        self.store.get_as_of(id, valid_time).await
    }

    pub fn session(&self) -> &SessionCore {
        &self.session
    }

    pub fn resolver(&self) -> &FilesystemResolver {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FakeStoreClient;

    #[tokio::test]
    async fn load_then_read_round_trips() {
        let store = Arc::new(FakeStoreClient::new());
        let config = FacadeConfig::new("session-1").with_system_prompt("be helpful");
        let mut facade = ExtensionFacade::load(config, store).await.unwrap();

        let status = facade.read("/tmp/example.txt", "hello world").await;
        assert!(status.ok);
        assert!(status.id.is_some());
    }

    #[tokio::test]
    async fn activate_unknown_id_reports_failure() {
        let store = Arc::new(FakeStoreClient::new());
        let config = FacadeConfig::new("session-1");
        let mut facade = ExtensionFacade::load(config, store).await.unwrap();

        let status = facade.activate("nonexistent").await;
        assert!(!status.ok);
    }

    #[tokio::test]
    async fn transform_context_renders_system_prompt() {
        let store = Arc::new(FakeStoreClient::new());
        let config = FacadeConfig::new("session-1").with_system_prompt("be helpful");
        let mut facade = ExtensionFacade::load(config, store).await.unwrap();

        let messages = facade.transform_context(1, &[]).await.unwrap();
        assert_eq!(messages[0].content, "be helpful");
    }

    #[tokio::test]
    async fn history_reflects_store_versions() {
        let store = Arc::new(FakeStoreClient::new());
        let config = FacadeConfig::new("session-1");
        let mut facade = ExtensionFacade::load(config, store).await.unwrap();

        let status = facade.read("/tmp/example.txt", "hello").await;
        let id = status.id.unwrap();

        let history = facade.history(&id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].doc.content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn empty_transform_context_is_deterministic_across_calls() {
        let store = Arc::new(FakeStoreClient::new());
        let config = FacadeConfig::new("session-1").with_system_prompt("be helpful");
        let mut facade = ExtensionFacade::load(config, store).await.unwrap();

        let first = facade.transform_context(1, &[]).await.unwrap();
        let second = facade.transform_context(1, &[]).await.unwrap();
        assert_eq!(first, second);
    }
}
