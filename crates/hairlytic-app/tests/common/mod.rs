//! Shared fixtures for app integration tests.

use std::sync::Arc;

use hairlytic_api::ApiClient;
use hairlytic_app::{AppContext, AppController, OfflineBackend};
use hairlytic_auth::Credentials;
use hairlytic_capture::SyntheticCameraDevice;
use hairlytic_core::{ConfidenceThreshold, ImageFile};
use hairlytic_prediction_contract::{HistoryEntry, PredictionStatus};
use hairlytic_storage::{LocalStorage, MemoryStorage};

/// Registered fixture user.
#[allow(dead_code)]
pub const USERNAME: &str = "ada";
/// Password of [`USERNAME`].
#[allow(dead_code)]
pub const PASSWORD: &str = "correct horse";
/// Backend base URL used by every harness.
#[allow(dead_code)]
pub const API_BASE: &str = "http://localhost:8000/api";

/// Controller plus handles on its collaborators.
#[allow(dead_code)]
pub struct Harness {
    /// Controller under test.
    pub app: AppController,
    /// In-process backend.
    pub backend: Arc<OfflineBackend>,
    /// Synthetic camera.
    pub camera: Arc<SyntheticCameraDevice>,
    /// Local storage shared with the controller.
    pub storage: Arc<dyn LocalStorage>,
}

/// Smallest payload that sniffs as PNG.
#[allow(dead_code)]
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R']);
    bytes
}

/// PNG upload fixture.
#[allow(dead_code)]
pub fn png_image(name: &str) -> ImageFile {
    ImageFile::new(name, "image/png", png_bytes()).expect("png fixture should be valid")
}

/// Accepted history record fixture.
#[allow(dead_code)]
pub fn history_entry(id: &str, image_filename: Option<&str>, username: Option<&str>) -> HistoryEntry {
    HistoryEntry {
        id: id.to_string(),
        filename: format!("{id}.png"),
        image_filename: image_filename.map(str::to_string),
        username: username.map(str::to_string),
        timestamp: "2026-10-16T14:05:09.120000".to_string(),
        status: PredictionStatus::Accepted,
        diagnosis: Some("Alopecia Detected".to_string()),
        message: None,
        detections: None,
    }
}

/// Fixture user's credentials.
#[allow(dead_code)]
pub fn credentials() -> Credentials {
    Credentials::new(USERNAME, PASSWORD)
}

/// Backend with the fixture user registered.
#[allow(dead_code)]
pub fn backend() -> Arc<OfflineBackend> {
    Arc::new(OfflineBackend::new().with_user(USERNAME, PASSWORD))
}

/// Launches a controller over the given collaborators.
#[allow(dead_code)]
pub async fn launch(
    backend: Arc<OfflineBackend>,
    camera: Arc<SyntheticCameraDevice>,
    storage: Arc<dyn LocalStorage>,
) -> Harness {
    let api = ApiClient::new(API_BASE, backend.clone()).expect("fixture base url should be valid");
    let app = AppController::launch(AppContext {
        api,
        storage: storage.clone(),
        camera: camera.clone(),
        camera_enabled: true,
        default_confidence: ConfidenceThreshold::default(),
    })
    .await;

    Harness {
        app,
        backend,
        camera,
        storage,
    }
}

/// Anonymous controller over fresh in-memory collaborators.
#[allow(dead_code)]
pub async fn anonymous() -> Harness {
    launch(
        backend(),
        Arc::new(SyntheticCameraDevice::new()),
        Arc::new(MemoryStorage::new()),
    )
    .await
}

/// Controller signed in as the fixture user.
#[allow(dead_code)]
pub async fn signed_in() -> Harness {
    let mut harness = anonymous().await;
    harness
        .app
        .login(&credentials())
        .await
        .expect("fixture login should succeed");
    harness
}
