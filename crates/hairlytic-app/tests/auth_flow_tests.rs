//! Integration tests for login, registration, and session restore.

mod common;

use std::sync::Arc;

use hairlytic_app::AppError;
use hairlytic_app::controller::REGISTERED_MESSAGE;
use hairlytic_auth::{AuthError, Credentials};
use hairlytic_capture::SyntheticCameraDevice;
use hairlytic_storage::{LocalStorage, MemoryStorage, TOKEN_KEY, USERNAME_KEY};
use hairlytic_ui::{AuthTab, NoticeLevel, UiAuthMode};

#[tokio::test]
async fn auth_flow_tests_blank_credentials_stay_local() {
    let mut harness = common::anonymous().await;

    let outcome = harness.app.login(&Credentials::new("  ", "secret")).await;
    assert!(matches!(outcome, Err(AppError::Auth(AuthError::EmptyCredential))));
    assert!(harness.backend.requests().is_empty());
    assert_eq!(
        harness.app.notice().map(|notice| notice.text.as_str()),
        Some("Username and password are required")
    );
}

#[tokio::test]
async fn auth_flow_tests_rejected_login_surfaces_backend_detail() {
    let mut harness = common::anonymous().await;

    let outcome = harness
        .app
        .login(&Credentials::new(common::USERNAME, "wrong"))
        .await;
    assert!(matches!(outcome, Err(AppError::Auth(AuthError::Rejected { status: 401, .. }))));
    assert_eq!(
        harness.app.notice().map(|notice| notice.text.as_str()),
        Some("Incorrect username or password")
    );
    assert_eq!(harness.app.ui_state().auth, UiAuthMode::Anonymous);
    assert!(harness.storage.get(TOKEN_KEY).is_none());
    assert_eq!(harness.backend.request_count("/history"), 0);
}

#[tokio::test]
async fn auth_flow_tests_register_then_login() {
    let mut harness = common::anonymous().await;
    harness.app.set_auth_tab(AuthTab::Register);

    let duplicate = harness.app.register(&common::credentials()).await;
    assert!(duplicate.is_err());
    assert_eq!(
        harness.app.notice().map(|notice| notice.text.as_str()),
        Some("Username already registered")
    );
    assert_eq!(harness.app.ui_state().auth_tab, AuthTab::Register);

    let fresh = Credentials::new("grace", "hopper");
    harness.app.register(&fresh).await.expect("register");
    let notice = harness.app.notice().cloned().expect("success notice");
    assert_eq!(notice.level, NoticeLevel::Info);
    assert_eq!(notice.text, REGISTERED_MESSAGE);
    assert_eq!(harness.app.ui_state().auth_tab, AuthTab::Login);
    assert!(harness.app.session().is_none());

    let session = harness.app.login(&fresh).await.expect("login");
    assert_eq!(session.username(), "grace");
    assert!(harness.app.notice().is_none());
    assert_eq!(harness.storage.get(USERNAME_KEY).as_deref(), Some("grace"));
    assert_eq!(harness.storage.get(TOKEN_KEY).as_deref(), Some(session.token()));
    assert_eq!(harness.backend.request_count("/history"), 1);

    let state = harness.app.ui_state();
    assert_eq!(state.auth, UiAuthMode::Authenticated);
    assert_eq!(state.username.as_deref(), Some("grace"));
}

#[tokio::test]
async fn auth_flow_tests_half_present_session_starts_anonymous() {
    let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
    storage.set(TOKEN_KEY, "orphan-token").expect("seed token");

    let harness = common::launch(common::backend(), Arc::new(SyntheticCameraDevice::new()), storage).await;

    assert!(harness.app.session().is_none());
    assert!(harness.storage.get(TOKEN_KEY).is_none());
    assert!(harness.backend.requests().is_empty());
}
