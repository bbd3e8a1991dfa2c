use crate::harness::TestSession;
use ctxmgr_core::MountMapping;

/// Scenario 3 (spec.md §8): a sandboxed agent and a host agent referencing
/// the same underlying file through different agent-visible paths converge
/// on one object.
#[tokio::test]
async fn sandbox_and_host_paths_converge_on_one_object() {
    let mapping = MountMapping {
        agent_prefix: "/workspace/".to_string(),
        canonical_prefix: "/host/dev/".to_string(),
        filesystem_id: "host-fs".to_string(),
        writable: true,
    };
    let session = TestSession::new("scenario-3").with_mount_mappings(vec![mapping]);
    let mut facade = session.open().await.unwrap();

    let sandbox_status = facade.read("/workspace/main.ts", "export const x = 1;").await;
    assert!(sandbox_status.ok);
    let sandbox_id = sandbox_status.id.unwrap();

    // A second "client" for the same session, simulating the host agent
    // addressing the same file via its own (default) filesystem id, which
    // is configured to equal the mount's filesystem id — this is the
    // convergence condition spec.md §4.2 requires of the deployer.
    let host_session = TestSession::sharing_store("scenario-3", session.store.clone())
        .with_default_filesystem_id("host-fs");
    let mut host_facade = host_session.open().await.unwrap();
    let host_status = host_facade
        .read("/host/dev/main.ts", "export const x = 1;")
        .await;
    assert!(host_status.ok);
    let host_id = host_status.id.unwrap();

    assert_eq!(sandbox_id, host_id);

    let history = {
        use ctxmgr_core::StoreClient;
        session.store.history(&sandbox_id).await.unwrap()
    };
    // Identical content re-indexed: `unchanged`, no second version.
    assert_eq!(history.len(), 1);

    facade.close().await;
    host_facade.close().await;
}
