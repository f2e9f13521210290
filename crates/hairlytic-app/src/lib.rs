#![warn(missing_docs)]
//! # hairlytic-app
//!
//! ## Purpose
//! Composition root for HairLytic: owns every component and orchestrates the
//! detection workflow.
//!
//! ## Responsibilities
//! - Load configuration and bootstrap logging.
//! - Restore persisted state at launch (session, hidden history ids).
//! - Gate every workflow step on the session.
//! - Select or capture an image, submit it with a confidence threshold, and
//!   hold the returned result.
//! - Project controller state into [`hairlytic_ui::UiState`].
//!
//! ## Data flow
//! [`AppContext`] -> [`AppController::launch`] -> user events
//! (`login`, `select_file`, `capture_photo`, `submit`, `hide_history_item`,
//! `logout`, ...) -> [`AppController::ui_state`].
//!
//! ## Ownership and lifetimes
//! All mutable state lives in [`AppController`] and is passed down to the
//! component controllers explicitly (the object-URL manager is lent to the
//! capture controller per call). Nothing is process-global.
//!
//! ## Error model
//! Component errors are wrapped in [`AppError`]. User-facing failures are
//! also recorded as a [`hairlytic_ui::Notice`]; history load failures are
//! logged only. No error leaves the controller in an unusable state.
//!
//! ## Security and privacy notes
//! - Tokens and passwords are never logged.
//! - [`redact_sensitive`] scrubs secret markers from free-form backend text
//!   before it reaches the log.

pub mod config;
pub mod controller;
pub mod logging;
pub mod offline;

use std::time::{SystemTime, UNIX_EPOCH};

use hairlytic_api::ApiError;
use hairlytic_auth::AuthError;
use hairlytic_capture::CaptureError;
use hairlytic_history::HistoryError;
use hairlytic_storage::StorageError;
use thiserror::Error;

pub use config::{Config, ConfigError};
pub use controller::{
    AppContext, AppController, PredictionError, ScrollRequest, ScrollTarget,
};
pub use offline::OfflineBackend;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("HAIRLYTIC_VERSION");

/// Alert text for a rejected upload.
pub const INVALID_IMAGE_MESSAGE: &str = "Please select a valid image file";

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Current time in Unix epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Redacts values following common secret markers.
///
/// Every occurrence of `password`, `token`, `authorization`, or `bearer`
/// (case-insensitive) keeps its key and loses the value up to the next
/// delimiter (whitespace, `&`, `,`, `;`, `"`).
pub fn redact_sensitive(input: &str) -> String {
    const MARKERS: [&str; 4] = ["password", "token", "authorization", "bearer"];
    const REDACTED: &str = "<redacted>";

    let lower = input.to_ascii_lowercase();
    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;

    while cursor < input.len() {
        let next = MARKERS
            .iter()
            .filter_map(|marker| lower[cursor..].find(marker).map(|at| (cursor + at, marker.len())))
            .min_by_key(|(at, _)| *at);

        let Some((at, marker_len)) = next else {
            output.push_str(&input[cursor..]);
            break;
        };

        let key_end = at + marker_len;
        output.push_str(&input[cursor..key_end]);

        cursor = key_end;
        loop {
            let rest = &input[cursor..];
            let separator_len = rest.len() - rest.trim_start_matches([' ', '=', ':', '"']).len();
            output.push_str(&rest[..separator_len]);
            cursor += separator_len;

            let value = &input[cursor..];
            let value_len = value
                .find(|c: char| c.is_whitespace() || matches!(c, '&' | ',' | ';' | '"'))
                .unwrap_or(value.len());
            // `Authorization: Bearer <token>` carries the secret one word later.
            if value_len > 0 && value[..value_len].eq_ignore_ascii_case("bearer") {
                output.push_str(&value[..value_len]);
                cursor += value_len;
                continue;
            }
            if value_len > 0 {
                output.push_str(REDACTED);
            }
            cursor += value_len;
            break;
        }
    }

    output
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Local storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// Backend boundary failure outside a specific workflow step.
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    /// Login/registration failure.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
    /// Camera failure.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Submission failure.
    #[error("prediction error: {0}")]
    Prediction(#[from] PredictionError),
    /// Hidden-id persistence failure.
    #[error("history error: {0}")]
    History(#[from] HistoryError),
    /// Selected file is not an image.
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// Operation is not available in the current input mode.
    #[error("operation not available in {0:?} mode")]
    WrongInputMode(hairlytic_ui::InputMode),
    /// Operation requires a session.
    #[error("not signed in")]
    NotAuthenticated,
    /// History id is not in the loaded list.
    #[error("unknown history entry: {0}")]
    UnknownHistoryEntry(String),
}
