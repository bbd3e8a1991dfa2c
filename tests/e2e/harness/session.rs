use anyhow::Result;
use ctxmgr_core::{ExtensionFacade, FacadeConfig, FakeStoreClient, MountMapping, TrackerConfig};
use std::sync::Arc;

/// A facade wired to a shared `FakeStoreClient`, so a scenario can `close()`
/// one instance and `open()` a fresh one against the same store to simulate
/// a process restart without losing persisted state.
pub struct TestSession {
    pub store: Arc<FakeStoreClient>,
    session_id: String,
    mount_mappings: Vec<MountMapping>,
    default_filesystem_id: Option<String>,
    tracker: Option<TrackerConfig>,
}

impl TestSession {
    pub fn new(session_id: &str) -> Self {
        Self {
            store: Arc::new(FakeStoreClient::new()),
            session_id: session_id.to_string(),
            mount_mappings: Vec::new(),
            default_filesystem_id: None,
            tracker: None,
        }
    }

    pub fn with_mount_mappings(mut self, mappings: Vec<MountMapping>) -> Self {
        self.mount_mappings = mappings;
        self
    }

    pub fn with_default_filesystem_id(mut self, id: &str) -> Self {
        self.default_filesystem_id = Some(id.to_string());
        self
    }

    /// Overrides the tracker's rename-detection window. Scenarios that
    /// drive the tracker end to end shouldn't have to wait out the
    /// production default (2s) to observe it fire.
    pub fn with_tracker(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Shares `store` with another client of the same session, simulating a
    /// second agent process reading from the same backing store.
    pub fn sharing_store(session_id: &str, store: Arc<FakeStoreClient>) -> Self {
        Self {
            store,
            session_id: session_id.to_string(),
            mount_mappings: Vec::new(),
            default_filesystem_id: None,
            tracker: None,
        }
    }

    pub async fn open(&self) -> Result<ExtensionFacade> {
        let mut config = FacadeConfig::new(self.session_id.clone())
            .with_mount_mappings(self.mount_mappings.clone());
        if let Some(id) = &self.default_filesystem_id {
            config = config.with_default_filesystem_id(id.clone());
        }
        if let Some(tracker) = self.tracker {
            config = config.with_tracker(tracker);
        }
        let facade = ExtensionFacade::load(config, self.store.clone()).await?;
        Ok(facade)
    }
}
