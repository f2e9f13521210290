//! Integration tests for camera permission failures.

mod common;

use std::sync::Arc;

use hairlytic_api::ApiClient;
use hairlytic_app::{AppContext, AppController, AppError};
use hairlytic_capture::{CAMERA_ACCESS_MESSAGE, CaptureState, DevicePermission, SyntheticCameraDevice};
use hairlytic_core::ConfidenceThreshold;
use hairlytic_storage::MemoryStorage;
use hairlytic_ui::{CameraSurface, InputMode, NoticeLevel};

#[tokio::test]
async fn camera_denied_tests_denial_alerts_then_returns_to_idle() {
    let mut harness = common::signed_in().await;
    harness.camera.set_permission(DevicePermission::Denied);

    let outcome = harness.app.switch_input_mode(InputMode::Camera).await;
    assert!(matches!(outcome, Err(AppError::Capture(ref error)) if error.is_device_access_error()));
    assert!(matches!(harness.app.capture_state(), CaptureState::Denied { .. }));
    assert!(!harness.app.camera_open());

    let notice = harness.app.notice().cloned().expect("denial should raise a notice");
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.text, CAMERA_ACCESS_MESSAGE);

    harness.app.acknowledge_notice();
    assert_eq!(harness.app.capture_state(), &CaptureState::Idle);
    assert!(harness.app.notice().is_none());
    assert_eq!(harness.camera.open_streams(), 0);
    assert_eq!(harness.app.ui_state().camera_surface, CameraSurface::Placeholder);

    harness.camera.set_permission(DevicePermission::Granted);
    harness.app.start_camera().await.expect("retry should succeed once granted");
    assert!(harness.app.camera_open());
}

#[tokio::test]
async fn camera_denied_tests_kill_switch_never_touches_device() {
    let camera = Arc::new(SyntheticCameraDevice::new());
    let backend = common::backend();
    let api = ApiClient::new(common::API_BASE, backend).expect("base url should be valid");
    let mut app = AppController::launch(AppContext {
        api,
        storage: Arc::new(MemoryStorage::new()),
        camera: camera.clone(),
        camera_enabled: false,
        default_confidence: ConfidenceThreshold::default(),
    })
    .await;
    app.login(&common::credentials()).await.expect("login should succeed");

    assert!(app.switch_input_mode(InputMode::Camera).await.is_err());
    assert!(matches!(app.capture_state(), CaptureState::Denied { .. }));
    assert!(camera.last_constraints().is_none());
    assert_eq!(camera.acquisitions(), 0);
}
