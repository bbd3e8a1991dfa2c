use crate::harness::TestSession;
use ctxmgr_core::StoreClient;

/// Scenario 1 (spec.md §8): `wrappedLs` then `read` on the same path.
#[tokio::test]
async fn ls_then_read_promotes_stub_to_full() {
    let session = TestSession::new("scenario-1");
    let mut facade = session.open().await.unwrap();

    let ls_status = facade.wrapped_ls("a.md").await;
    assert!(ls_status.ok);

    let core = facade.session();
    let ids_after_ls = core.session_index_ids();
    assert_eq!(ids_after_ls.len(), 1);
    let id = ids_after_ls[0].clone();
    assert!(core.metadata_pool_ids().contains(&id));
    assert!(core.active_set_ids().is_empty());

    let read_status = facade.read("a.md", "# hello").await;
    assert!(read_status.ok);
    assert_eq!(read_status.id.as_deref(), Some(id.as_str()));

    let core = facade.session();
    assert_eq!(core.session_index_ids(), vec![id.clone()]);
    assert_eq!(core.metadata_pool_ids(), vec![id.clone()]);
    assert_eq!(core.active_set_ids(), vec![id.clone()]);

    let history = session.store.history(&id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].doc.content.is_none());
    assert_eq!(history[1].doc.content.as_deref(), Some("# hello"));

    facade.close().await;
}
