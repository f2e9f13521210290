//! Integration tests for tolerating history load failures.

mod common;

use hairlytic_history::EMPTY_HISTORY_TEXT;

#[tokio::test]
async fn history_load_tolerance_tests_failed_load_is_silent() {
    let mut harness = common::anonymous().await;
    harness.backend.set_history_available(false);

    harness.app.login(&common::credentials()).await.expect("login should still succeed");
    assert!(harness.app.notice().is_none());
    assert!(harness.app.history().is_empty());

    let state = harness.app.ui_state();
    assert!(state.history.is_empty());
    assert_eq!(state.history_placeholder.as_deref(), Some(EMPTY_HISTORY_TEXT));
}

#[tokio::test]
async fn history_load_tolerance_tests_failed_refresh_keeps_stale_list() {
    let mut harness = common::anonymous().await;
    harness
        .backend
        .seed_history(common::USERNAME, common::history_entry("first", None, None));
    harness.app.login(&common::credentials()).await.expect("login");
    assert_eq!(harness.app.history().len(), 1);

    harness
        .backend
        .seed_history(common::USERNAME, common::history_entry("second", None, None));
    harness.backend.set_history_available(false);
    assert!(harness.app.refresh_history().await.is_err());
    assert_eq!(harness.app.history().len(), 1);
    assert!(harness.app.notice().is_none());

    harness.backend.set_history_available(true);
    assert_eq!(harness.app.refresh_history().await.ok(), Some(2));
    let state = harness.app.ui_state();
    assert_eq!(state.history.len(), 2);
    assert!(state.history_placeholder.is_none());
    assert_eq!(state.history[0].performed_at, "Oct 16, 14:05");
}
