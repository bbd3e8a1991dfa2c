//! Construction-time configuration (spec.md §6).

use crate::resolver::MountMapping;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tool-call sliding-window auto-collapse parameters (spec.md §4.4, §9 Open
/// Questions: "exact values ... are observed but not mandated; treat as
/// configuration").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CollapseConfig {
    /// Keep the last `n` tool calls regardless of turn.
    pub n: usize,
    /// Keep any tool call issued within the last `w` turns.
    pub w: usize,
}

impl Default for CollapseConfig {
    fn default() -> Self {
        Self { n: 5, w: 3 }
    }
}

/// Tracker rename-detection window (spec.md §4.5: "~2s", left as a tunable).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub rename_window: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            rename_window: Duration::from_secs(2),
        }
    }
}

/// Construction-time configuration for an [`crate::ExtensionFacade`].
#[derive(Debug, Clone)]
pub struct FacadeConfig {
    pub session_id: String,
    pub system_prompt: Option<String>,
    pub mount_mappings: Vec<MountMapping>,
    pub default_filesystem_id: Option<String>,
    pub store_base_url: String,
    pub collapse: CollapseConfig,
    pub tracker: TrackerConfig,
}

impl FacadeConfig {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            system_prompt: None,
            mount_mappings: Vec::new(),
            default_filesystem_id: None,
            store_base_url: default_store_base_url(),
            collapse: CollapseConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_mount_mappings(mut self, mappings: Vec<MountMapping>) -> Self {
        self.mount_mappings = mappings;
        self
    }

    pub fn with_default_filesystem_id(mut self, id: impl Into<String>) -> Self {
        self.default_filesystem_id = Some(id.into());
        self
    }

    pub fn with_store_base_url(mut self, url: impl Into<String>) -> Self {
        self.store_base_url = url.into();
        self
    }

    pub fn with_collapse(mut self, collapse: CollapseConfig) -> Self {
        self.collapse = collapse;
        self
    }

    pub fn with_tracker(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = tracker;
        self
    }
}

/// Default store URL per spec.md §6's "Environment" paragraph, overridable
/// by the `CTXMGR_STORE_URL` environment variable.
fn default_store_base_url() -> String {
    std::env::var("CTXMGR_STORE_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string())
}
