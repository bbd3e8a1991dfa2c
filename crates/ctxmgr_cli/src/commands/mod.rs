//! Debugging commands for the `ctxmgr` binary.
//!
//! None of these talk to a real harness: they stand in for one, so a
//! developer can drive a session by hand against a running store.

pub mod content;
pub mod render;

use anyhow::Result;
use ctxmgr_core::{ExtensionFacade, FacadeConfig};

/// Opens a facade against the given store for one command invocation. Every
/// invocation resumes fresh (per spec.md §6: "no persisted local state
/// beyond whatever the store provides"). `store_url` only ever reaches the
/// store client through `config.store_base_url` — `ExtensionFacade::connect`
/// is the single place that turns it into an `HttpStoreClient`.
pub async fn open_facade(
    store_url: &str,
    session_id: &str,
    system_prompt: Option<String>,
) -> Result<ExtensionFacade> {
    let mut config = FacadeConfig::new(session_id).with_store_base_url(store_url);
    if let Some(prompt) = system_prompt {
        config = config.with_system_prompt(prompt);
    }
    let facade = ExtensionFacade::connect(config).await?;
    Ok(facade)
}
