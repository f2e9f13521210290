//! Integration tests for object URL install/release pairing across a session.

mod common;

use hairlytic_media::MediaSlot;
use hairlytic_ui::InputMode;

#[tokio::test]
async fn object_url_pairing_tests_every_url_is_released_by_shutdown() {
    let mut harness = common::signed_in().await;
    let live = |harness: &common::Harness| harness.app.urls().stats().live();

    for index in 0..3 {
        harness
            .app
            .select_file(common::png_image(&format!("scan-{index}.png")))
            .expect("select");
        assert_eq!(live(&harness), 1);
    }
    let replaced = harness.app.selected_image().expect("selected");
    harness.app.submit().await.expect("submit");

    let entry_id = harness.app.history()[0].id.clone();
    harness.app.open_history_item(&entry_id).await.expect("open");
    assert_eq!(live(&harness), 2);

    harness.app.switch_input_mode(InputMode::Camera).await.expect("camera");
    assert!(harness.app.urls().resolve(&replaced.url).is_none());
    assert!(harness.app.urls().current(MediaSlot::HistoryImage).is_some());
    assert_eq!(live(&harness), 1);

    harness.app.capture_photo().await.expect("capture");
    harness.app.retake().expect("retake");
    harness.app.capture_photo().await.expect("capture");
    assert_eq!(live(&harness), 2);

    harness.app.new_analysis();
    assert_eq!(live(&harness), 1);
    harness.app.capture_photo().await.expect("capture");

    harness.app.shutdown();
    let stats = harness.app.urls().stats();
    assert_eq!(stats.live(), 0);
    assert_eq!(stats.created, stats.revoked);
    assert!(stats.created >= 7);
}

#[tokio::test]
async fn object_url_pairing_tests_rejected_selection_keeps_previous_preview() {
    let mut harness = common::signed_in().await;
    let kept = harness
        .app
        .select_file(common::png_image("scalp.png"))
        .expect("select");

    assert!(harness.app.select_file_bytes("notes.txt", b"plain text".to_vec()).is_err());
    assert_eq!(harness.app.selected_image(), Some(kept));
    assert_eq!(harness.app.urls().stats().live(), 1);
    assert_eq!(
        harness.app.notice().map(|notice| notice.text.as_str()),
        Some(hairlytic_app::INVALID_IMAGE_MESSAGE)
    );
}
