//! Integration tests for hidden history surviving a restart.

mod common;

use std::sync::Arc;

use hairlytic_capture::SyntheticCameraDevice;
use hairlytic_storage::{FileStorage, HIDDEN_IDS_KEY, LocalStorage};

fn card_ids(harness: &common::Harness) -> Vec<String> {
    harness
        .app
        .ui_state()
        .history
        .into_iter()
        .map(|card| card.id)
        .collect()
}

#[tokio::test]
async fn hidden_history_reload_tests_hidden_entry_stays_hidden() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("local-storage.json");
    let backend = common::backend();
    backend.seed_history(common::USERNAME, common::history_entry("older", None, None));
    backend.seed_history(common::USERNAME, common::history_entry("newer", None, None));

    let storage: Arc<dyn LocalStorage> = Arc::new(FileStorage::open(path.clone()).expect("open"));
    let mut first = common::launch(backend.clone(), Arc::new(SyntheticCameraDevice::new()), storage).await;
    first.app.login(&common::credentials()).await.expect("login");
    assert_eq!(card_ids(&first), vec!["newer", "older"]);

    assert!(first.app.hide_history_item("older").expect("hide"));
    assert!(!first.app.hide_history_item("older").expect("hide again"));
    assert_eq!(card_ids(&first), vec!["newer"]);
    assert_eq!(first.app.history().len(), 2);
    drop(first);

    let reopened = FileStorage::open(path).expect("reopen");
    assert_eq!(reopened.get(HIDDEN_IDS_KEY).as_deref(), Some(r#"["older"]"#));

    let second = common::launch(backend.clone(), Arc::new(SyntheticCameraDevice::new()), Arc::new(reopened)).await;
    assert!(second.app.session().is_some(), "persisted session should restore");
    assert_eq!(card_ids(&second), vec!["newer"]);
    assert_eq!(backend.request_count("/login"), 1);
}

#[tokio::test]
async fn hidden_history_reload_tests_logout_keeps_memory_but_wipes_disk() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("local-storage.json");
    let backend = common::backend();
    backend.seed_history(common::USERNAME, common::history_entry("older", None, None));
    backend.seed_history(common::USERNAME, common::history_entry("newer", None, None));

    let storage: Arc<dyn LocalStorage> = Arc::new(FileStorage::open(path.clone()).expect("open"));
    let mut first = common::launch(backend.clone(), Arc::new(SyntheticCameraDevice::new()), storage).await;
    first.app.login(&common::credentials()).await.expect("login");
    first.app.hide_history_item("older").expect("hide");

    first.app.logout();
    assert!(FileStorage::open(path.clone()).expect("reopen").get(HIDDEN_IDS_KEY).is_none());

    first.app.login(&common::credentials()).await.expect("login again");
    assert_eq!(card_ids(&first), vec!["newer"], "in-memory hidden set survives logout");
    drop(first);

    let reopened: Arc<dyn LocalStorage> = Arc::new(FileStorage::open(path).expect("reopen"));
    let mut second = common::launch(backend, Arc::new(SyntheticCameraDevice::new()), reopened).await;
    second.app.login(&common::credentials()).await.expect("login after relaunch");
    assert_eq!(card_ids(&second), vec!["newer", "older"]);
}
