//! Integration tests for camera stream pairing across the workflow.

mod common;

use hairlytic_app::{AppController, ScrollTarget};
use hairlytic_capture::{CaptureState, FacingMode, StartOutcome, SyntheticCameraDevice};
use hairlytic_ui::{CameraSurface, InputMode};

fn assert_stream_matches_state(app: &AppController, camera: &SyntheticCameraDevice) {
    let active = app.capture_state().is_active();
    assert_eq!(app.camera_open(), active, "state {:?}", app.capture_state());
    assert_eq!(camera.open_streams(), usize::from(active));
}

#[tokio::test]
async fn capture_lifecycle_tests_stream_held_iff_active() {
    let mut harness = common::signed_in().await;
    let camera = harness.camera.clone();
    assert_stream_matches_state(&harness.app, &camera);

    harness.app.switch_input_mode(InputMode::Camera).await.expect("start");
    assert_eq!(harness.app.capture_state(), &CaptureState::Previewing);
    assert_stream_matches_state(&harness.app, &camera);
    let constraints = camera.last_constraints().expect("constraints recorded");
    assert_eq!(constraints.facing, FacingMode::User);
    assert_eq!((constraints.ideal_width, constraints.ideal_height), (1280, 720));

    let still = harness.app.capture_photo().await.expect("capture");
    assert_eq!(still.image.content_type(), "image/jpeg");
    assert!(still.image.file_name().starts_with("camera_"));
    assert!(still.image.file_name().ends_with(".jpg"));
    assert_eq!(harness.app.ui_state().camera_surface, CameraSurface::Snapshot);
    assert_stream_matches_state(&harness.app, &camera);

    harness.app.retake().expect("retake");
    assert!(harness.app.selected_image().is_none());
    assert_eq!(harness.app.ui_state().camera_surface, CameraSurface::LiveVideo);
    assert_stream_matches_state(&harness.app, &camera);

    harness.app.capture_photo().await.expect("capture again");
    let outcome = harness.app.start_camera().await.expect("restart while active");
    assert_eq!(outcome, StartOutcome::Resumed);
    assert_eq!(camera.acquisitions(), 1);
    assert!(harness.app.selected_image().is_none());
    assert_stream_matches_state(&harness.app, &camera);

    harness.app.switch_input_mode(InputMode::Upload).await.expect("switch back");
    assert_eq!(harness.app.capture_state(), &CaptureState::Idle);
    assert_stream_matches_state(&harness.app, &camera);
    assert_eq!(camera.releases(), 1);
}

#[tokio::test]
async fn capture_lifecycle_tests_logout_and_shutdown_release_camera() {
    let mut harness = common::signed_in().await;
    let camera = harness.camera.clone();

    harness.app.switch_input_mode(InputMode::Camera).await.expect("start");
    harness.app.capture_photo().await.expect("capture");
    harness.app.logout();
    assert_eq!(camera.open_streams(), 0);
    assert_eq!(harness.app.input_mode(), InputMode::Upload);

    harness.app.login(&common::credentials()).await.expect("login");
    harness.app.switch_input_mode(InputMode::Camera).await.expect("start");
    assert_eq!(camera.open_streams(), 1);
    harness.app.shutdown();
    assert_eq!(camera.open_streams(), 0);
    assert_eq!(camera.acquisitions(), camera.releases());
}

#[tokio::test]
async fn capture_lifecycle_tests_new_analysis_resumes_live_preview() {
    let mut harness = common::signed_in().await;
    harness.app.switch_input_mode(InputMode::Camera).await.expect("start");
    harness.app.capture_photo().await.expect("capture");
    harness.app.submit().await.expect("submit");
    let _ = harness.app.take_scroll_request();

    harness.app.new_analysis();
    let state = harness.app.ui_state();
    assert_eq!(state.camera_surface, CameraSurface::LiveVideo);
    assert!(!state.has_image);
    assert!(state.results.is_none());
    assert!(harness.app.camera_open());
    assert_eq!(
        harness.app.take_scroll_request().map(|request| request.target),
        Some(ScrollTarget::Top)
    );
}
