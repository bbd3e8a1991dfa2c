use crate::harness::{TestSession, TestWorkspace};
use ctxmgr_core::MountMapping;
use std::time::Duration;

/// Scenario 2 (spec.md §8): a deactivated, tracked file is edited externally.
/// The tracker must refresh its metadata cache entry but never put it back
/// in the active set.
#[tokio::test]
async fn deactivated_file_is_reindexed_but_stays_inactive() {
    let workspace = TestWorkspace::new().unwrap();
    workspace.write_file("x.txt", "one two three").unwrap();

    let mapping = MountMapping {
        agent_prefix: "/workspace/".to_string(),
        canonical_prefix: format!("{}/", workspace.path().display()),
        filesystem_id: "host-fs".to_string(),
        writable: true,
    };
    let session = TestSession::new("scenario-2").with_mount_mappings(vec![mapping]);
    let mut facade = session.open().await.unwrap();

    let status = facade.read("/workspace/x.txt", "one two three").await;
    assert!(status.ok);
    let id = status.id.unwrap();

    let status = facade.deactivate(&id).await;
    assert!(status.ok);
    assert!(!facade.session().active_set_ids().contains(&id));

    workspace.write_file("x.txt", "one two three four five").unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    // Pump tracker updates by touching any facade method.
    let _ = facade.wrapped_ls("").await;

    let core = facade.session();
    assert!(!core.active_set_ids().contains(&id));
    if let Some(ctxmgr_core::CacheEntry::File { char_count, .. }) = core.cache_entry(&id) {
        assert_eq!(*char_count, "one two three four five".chars().count());
    }

    facade.close().await;
}
