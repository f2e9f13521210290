#![warn(missing_docs)]
//! # hairlytic-ui
//!
//! ## Purpose
//! Defines the display-safe view model rendered by a HairLytic front end.
//!
//! ## Responsibilities
//! - Represent auth mode, input mode, camera surface, and submit gating.
//! - Project prediction results into render-ready panels and detection rows.
//! - Format history cards.
//!
//! ## Data flow
//! The app crate projects its controller state into [`UiState`] after every
//! event; a renderer draws it without consulting any other state.
//!
//! ## Ownership and lifetimes
//! `UiState` owns all string values to keep projection and rendering
//! decoupled.
//!
//! ## Security and privacy notes
//! UI state intentionally excludes secrets (credentials, tokens).

use chrono::{DateTime, NaiveDateTime};
use hairlytic_prediction_contract::{HistoryEntry, PredictionOutcome, PredictionResult};

/// Submit button label while idle.
pub const SUBMIT_LABEL: &str = "Start Diagnosis";
/// Submit button label while a request is in flight.
pub const SUBMITTING_LABEL: &str = "Analyzing Image";

/// UI-auth projection, derived from token presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAuthMode {
    /// Auth form is shown.
    Anonymous,
    /// Workspace is shown.
    Authenticated,
}

/// Auth form tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthTab {
    /// Sign in.
    #[default]
    Login,
    /// Create account.
    Register,
}

/// Image source selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// File upload.
    #[default]
    Upload,
    /// Live camera.
    Camera,
}

/// What the camera frame area shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSurface {
    /// "Tap to start camera" placeholder.
    Placeholder,
    /// Live video.
    LiveVideo,
    /// Frozen still.
    Snapshot,
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Blocking error.
    Error,
}

/// Alert waiting for acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text.
    pub text: String,
}

impl Notice {
    /// Informational notice.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    /// Error notice.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// One rendered detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRow {
    /// Class label.
    pub class_name: String,
    /// Confidence as `NN.N%`.
    pub confidence: String,
}

/// Rendered result panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultPanel {
    /// Image refused by the backend.
    Rejected {
        /// Headline.
        reason: String,
        /// Explanation.
        message: String,
    },
    /// Nothing found.
    Clear {
        /// Diagnosis.
        diagnosis: String,
        /// Explanation.
        message: String,
    },
    /// Regions found.
    Detected {
        /// Diagnosis.
        diagnosis: String,
        /// Annotated image as a `data:` URL.
        annotated_image: Option<String>,
        /// Rows, in backend order.
        rows: Vec<DetectionRow>,
    },
}

impl ResultPanel {
    /// Projects a prediction result.
    pub fn from_result(result: &PredictionResult) -> Self {
        match result.outcome() {
            PredictionOutcome::Rejected { reason, message } => Self::Rejected {
                reason: reason.to_string(),
                message: message.to_string(),
            },
            PredictionOutcome::Clear { diagnosis, message } => Self::Clear {
                diagnosis: diagnosis.to_string(),
                message: message.to_string(),
            },
            PredictionOutcome::Detected {
                diagnosis,
                detections,
                ..
            } => Self::Detected {
                diagnosis: diagnosis.to_string(),
                annotated_image: result.annotated_image_data_url(),
                rows: detections
                    .iter()
                    .map(|detection| DetectionRow {
                        class_name: detection.class_name.clone(),
                        confidence: detection.confidence_label(),
                    })
                    .collect(),
            },
        }
    }
}

/// One rendered history card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryCard {
    /// Record id, used for hide/select events.
    pub id: String,
    /// Upload file name.
    pub filename: String,
    /// Short timestamp (`Oct 16, 14:05`).
    pub performed_at: String,
}

impl HistoryCard {
    /// Projects a history entry.
    pub fn from_entry(entry: &HistoryEntry) -> Self {
        Self {
            id: entry.id.clone(),
            filename: entry.filename.clone(),
            performed_at: format_short_timestamp(&entry.timestamp),
        }
    }
}

/// Aggregate UI state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    /// App version string sourced from root `VERSION`.
    pub version: String,
    /// Auth projection.
    pub auth: UiAuthMode,
    /// Active auth tab.
    pub auth_tab: AuthTab,
    /// Signed-in username.
    pub username: Option<String>,
    /// Image source.
    pub input_mode: InputMode,
    /// Camera frame content.
    pub camera_surface: CameraSurface,
    /// Preview URL of the selected image.
    pub preview_url: Option<String>,
    /// Confidence slider label (`0.25`).
    pub confidence: String,
    /// Whether an image is selected.
    pub has_image: bool,
    /// Whether a prediction request is in flight.
    pub submitting: bool,
    /// Result panel, when a result is held.
    pub results: Option<ResultPanel>,
    /// Visible history cards.
    pub history: Vec<HistoryCard>,
    /// Text shown in place of the cards when none are visible.
    pub history_placeholder: Option<String>,
    /// Pending alert.
    pub notice: Option<Notice>,
}

impl UiState {
    /// Creates the anonymous start state.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            auth: UiAuthMode::Anonymous,
            auth_tab: AuthTab::Login,
            username: None,
            input_mode: InputMode::Upload,
            camera_surface: CameraSurface::Placeholder,
            preview_url: None,
            confidence: "0.25".to_string(),
            has_image: false,
            submitting: false,
            results: None,
            history: Vec::new(),
            history_placeholder: None,
            notice: None,
        }
    }

    /// Returns `true` when the submit button is enabled: an image is selected,
    /// nothing is in flight, and the camera is not showing live video.
    pub fn can_submit(&self) -> bool {
        self.auth == UiAuthMode::Authenticated
            && self.has_image
            && !self.submitting
            && self.camera_surface != CameraSurface::LiveVideo
    }

    /// Submit button label.
    pub fn submit_label(&self) -> &'static str {
        if self.submitting {
            SUBMITTING_LABEL
        } else {
            SUBMIT_LABEL
        }
    }
}

/// Formats an ISO-8601 timestamp as `Mon D, HH:MM`; unparsable input is
/// returned unchanged.
pub fn format_short_timestamp(raw: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.format("%b %-d, %H:%M").to_string();
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return parsed.format("%b %-d, %H:%M").to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    //! Unit tests for UI gates and formatting.

    use super::*;

    #[test]
    fn submit_gate_blocks_live_preview() {
        let mut state = UiState::new("v0.1.0");
        state.auth = UiAuthMode::Authenticated;
        assert!(!state.can_submit());

        state.has_image = true;
        state.input_mode = InputMode::Camera;
        state.camera_surface = CameraSurface::LiveVideo;
        assert!(!state.can_submit());

        state.camera_surface = CameraSurface::Snapshot;
        assert!(state.can_submit());

        state.submitting = true;
        assert!(!state.can_submit());
        assert_eq!(state.submit_label(), "Analyzing Image");
    }

    #[test]
    fn short_timestamp_accepts_naive_and_offset_forms() {
        assert_eq!(format_short_timestamp("2026-10-16T14:05:09.123456"), "Oct 16, 14:05");
        assert_eq!(format_short_timestamp("2026-03-02T08:30:00+00:00"), "Mar 2, 08:30");
        assert_eq!(format_short_timestamp("yesterday"), "yesterday");
    }
}
