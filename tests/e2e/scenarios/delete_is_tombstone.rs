use crate::harness::{TestSession, TestWorkspace};
use ctxmgr_core::{MountMapping, StoreClient, TrackerConfig};
use std::time::Duration;

/// Scenario 4 (spec.md §8): a tracked file is deleted on disk. The tracker
/// must write a tombstone version while keeping the ID in both forward sets.
#[tokio::test]
async fn deleting_tracked_file_writes_tombstone() {
    let workspace = TestWorkspace::new().unwrap();
    workspace.write_file("t.txt", "temporary").unwrap();

    let mapping = MountMapping {
        agent_prefix: "/workspace/".to_string(),
        canonical_prefix: format!("{}/", workspace.path().display()),
        filesystem_id: "host-fs".to_string(),
        writable: true,
    };
    // Shrink the rename window so the test doesn't have to wait out the
    // production default (2s) for the tombstone-writing task to wake.
    let rename_window = Duration::from_millis(50);
    let session = TestSession::new("scenario-4")
        .with_mount_mappings(vec![mapping])
        .with_tracker(TrackerConfig { rename_window });
    let mut facade = session.open().await.unwrap();

    let status = facade.read("/workspace/t.txt", "temporary").await;
    assert!(status.ok);
    let id = status.id.unwrap();

    workspace.remove_file("t.txt").unwrap();
    tokio::time::sleep(rename_window + Duration::from_millis(200)).await;
    let _ = facade.wrapped_ls("").await; // pump tracker updates

    let history = session.store.history(&id).await.unwrap();
    assert_eq!(history.len(), 2);
    let latest = history.last().unwrap();
    assert!(latest.doc.content.is_none());
    assert!(latest.doc.file_hash.is_none());

    let core = facade.session();
    assert!(core.session_index_ids().contains(&id));
    assert!(core.metadata_pool_ids().contains(&id));

    facade.close().await;
}
