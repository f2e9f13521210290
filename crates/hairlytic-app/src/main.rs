#![warn(missing_docs)]
//! # hairlytic-app binary
//!
//! Offline demo run of the detection workflow: signs a demo user in against
//! the in-process backend, submits an image (the path given as the first
//! argument, or a synthetic camera still), and prints the projected UI state.

use std::path::Path;
use std::sync::Arc;

use hairlytic_api::ApiClient;
use hairlytic_app::logging::init_tracing;
use hairlytic_app::{AppContext, AppController, AppError, Config, OfflineBackend, app_version};
use hairlytic_auth::Credentials;
use hairlytic_capture::SyntheticCameraDevice;
use hairlytic_storage::FileStorage;
use hairlytic_ui::{InputMode, ResultPanel};
use tracing::info;

const DEMO_USERNAME: &str = "demo";
const DEMO_PASSWORD: &str = "demo-password";

/// CLI entry point.
#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("hairlytic-app failed: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    init_tracing(config.log_level);
    info!(
        stage = "app",
        action = "config",
        api_base = %config.api_base,
        storage = %config.storage_path.display(),
        camera_enabled = config.camera_enabled,
        "configuration loaded"
    );

    let storage = Arc::new(FileStorage::open(config.storage_path.clone())?);
    let backend = Arc::new(OfflineBackend::new());
    let api = ApiClient::new(&config.api_base, backend.clone())?;
    let camera = Arc::new(SyntheticCameraDevice::with_resolution(1280, 720));

    let mut app = AppController::launch(AppContext {
        api,
        storage,
        camera,
        camera_enabled: config.camera_enabled,
        default_confidence: config.default_confidence,
    })
    .await;

    // Offline tokens do not outlive the process.
    if app.session().is_some() {
        app.logout();
    }
    let credentials = Credentials::new(DEMO_USERNAME, DEMO_PASSWORD);
    app.register(&credentials).await?;
    app.acknowledge_notice();
    app.login(&credentials).await?;

    match std::env::args_os().nth(1) {
        Some(path) => {
            app.select_file_path(Path::new(&path))?;
        }
        None => {
            app.switch_input_mode(InputMode::Camera).await?;
            app.capture_photo().await?;
        }
    }
    app.submit().await?;

    let state = app.ui_state();
    println!("hairlytic-app {}", app_version());
    println!("user={} conf={}", state.username.as_deref().unwrap_or("-"), state.confidence);
    match &state.results {
        Some(ResultPanel::Detected { diagnosis, rows, .. }) => {
            println!("{diagnosis}");
            for row in rows {
                println!("  {} {}", row.class_name, row.confidence);
            }
        }
        Some(ResultPanel::Clear { diagnosis, message }) => println!("{diagnosis}: {message}"),
        Some(ResultPanel::Rejected { reason, message }) => println!("rejected: {reason}: {message}"),
        None => println!("no result"),
    }
    for card in &state.history {
        println!("history {} {} {}", card.id, card.filename, card.performed_at);
    }

    app.shutdown();
    Ok(())
}
