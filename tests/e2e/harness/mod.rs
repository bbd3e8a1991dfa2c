//! E2E test harness for ctxmgr.
//!
//! Intentionally thin: every scenario drives a real `ExtensionFacade` against
//! a `FakeStoreClient`, so the harness only needs to stand up that pair and,
//! for the tracker scenarios, a real temp-directory workspace.

#![allow(dead_code)]

pub mod session;
pub mod workspace;

pub use session::TestSession;
pub use workspace::TestWorkspace;
