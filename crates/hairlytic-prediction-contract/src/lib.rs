#![warn(missing_docs)]
//! # hairlytic-prediction-contract
//!
//! ## Purpose
//! Defines the backend response schemas and client-side mapping helpers.
//!
//! ## Responsibilities
//! - Parse prediction, history, login, and error-detail payloads.
//! - Classify a prediction into the panel the UI should render.
//! - Format detection confidences and decode annotated images.
//!
//! ## Data flow
//! Raw JSON body -> [`parse_prediction_response`] / [`parse_history_response`]
//! -> [`PredictionResult::outcome`] -> UI projection.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned structs to avoid borrowing from transient network
//! buffers.
//!
//! ## Error model
//! Invalid JSON or blank mandatory fields return [`ContractError`]. A
//! negative diagnosis or a rejected status is a valid result, not an error.
//! Individual malformed history records are skipped with a warning so one bad
//! row never hides the rest of the list.
//!
//! ## Security and privacy notes
//! This crate processes only model outputs and record metadata; the login
//! response token is never formatted by `Debug`.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Diagnosis label the backend uses for a clean scan.
pub const NO_ALOPECIA_DIAGNOSIS: &str = "No Alopecia Detected";

/// Backend verdict on whether the image was usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    /// Image was analyzed.
    Accepted,
    /// Image failed validation (not a scalp, unreadable, ...).
    Rejected,
}

/// One labeled, confidence-scored region found by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Detector class label.
    pub class_name: String,
    /// Confidence score in `[0.0, 1.0]`.
    pub confidence: f32,
}

impl Detection {
    /// Formats confidence as a percentage with one decimal (`0.87` -> `87.0%`).
    pub fn confidence_label(&self) -> String {
        format_confidence(self.confidence)
    }
}

/// Result of one `POST /predict` call. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Accepted or rejected.
    pub status: PredictionStatus,
    /// Diagnosis label for accepted images.
    #[serde(default)]
    pub diagnosis: Option<String>,
    /// Short rejection reason.
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable explanation.
    #[serde(default)]
    pub message: Option<String>,
    /// Detected regions; absent or `null` on rejected scans.
    #[serde(default)]
    pub detections: Option<Vec<Detection>>,
    /// Base64-encoded annotated PNG.
    #[serde(default)]
    pub annotated_image: Option<String>,
}

/// Render-ready classification of a prediction.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome<'a> {
    /// The backend refused the image.
    Rejected {
        /// Short reason headline.
        reason: &'a str,
        /// Explanation text.
        message: &'a str,
    },
    /// Image analyzed, nothing found.
    Clear {
        /// Diagnosis label.
        diagnosis: &'a str,
        /// Explanation text.
        message: &'a str,
    },
    /// Image analyzed, regions found.
    Detected {
        /// Diagnosis label.
        diagnosis: &'a str,
        /// Detected regions.
        detections: &'a [Detection],
        /// Base64 annotated image, if supplied.
        annotated_image: Option<&'a str>,
    },
}

impl PredictionResult {
    /// Classifies this result for rendering.
    pub fn outcome(&self) -> PredictionOutcome<'_> {
        let message = self.message.as_deref().unwrap_or_default();
        if self.status == PredictionStatus::Rejected {
            return PredictionOutcome::Rejected {
                reason: self.reason.as_deref().unwrap_or("Image rejected"),
                message,
            };
        }

        let diagnosis = self.diagnosis.as_deref().unwrap_or_default();
        if diagnosis == NO_ALOPECIA_DIAGNOSIS {
            return PredictionOutcome::Clear { diagnosis, message };
        }

        PredictionOutcome::Detected {
            diagnosis,
            detections: self.detections(),
            annotated_image: self.annotated_image.as_deref(),
        }
    }

    /// Detected regions, empty when the backend sent none.
    pub fn detections(&self) -> &[Detection] {
        self.detections.as_deref().unwrap_or_default()
    }

    /// Returns the annotated image as a `data:` URL usable as an image source.
    pub fn annotated_image_data_url(&self) -> Option<String> {
        self.annotated_image
            .as_deref()
            .map(|encoded| format!("data:image/png;base64,{encoded}"))
    }

    /// Decodes the annotated image into raw PNG bytes.
    ///
    /// # Errors
    /// Returns [`ContractError::InvalidContract`] when the payload is not
    /// valid base64.
    pub fn annotated_image_bytes(&self) -> Result<Option<Vec<u8>>, ContractError> {
        self.annotated_image
            .as_deref()
            .map(|encoded| {
                STANDARD.decode(encoded).map_err(|error| {
                    ContractError::InvalidContract(format!("annotated_image: {error}"))
                })
            })
            .transpose()
    }
}

/// One record of `GET /history`. Read-only on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Backend record id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Original upload file name.
    pub filename: String,
    /// Stored image file name under `/uploads/<username>/`.
    #[serde(default)]
    pub image_filename: Option<String>,
    /// Owner of the stored image.
    #[serde(default)]
    pub username: Option<String>,
    /// ISO-8601 time the prediction was performed.
    pub timestamp: String,
    /// Accepted or rejected.
    pub status: PredictionStatus,
    /// Diagnosis label for accepted records.
    #[serde(default)]
    pub diagnosis: Option<String>,
    /// Rejection or info message.
    #[serde(default)]
    pub message: Option<String>,
    /// Detected regions.
    #[serde(default)]
    pub detections: Option<Vec<Detection>>,
}

impl HistoryEntry {
    /// Returns `true` when the record shows a clean scan.
    pub fn is_clear(&self) -> bool {
        self.diagnosis.as_deref() == Some(NO_ALOPECIA_DIAGNOSIS)
    }
}

/// Body of a successful `POST /login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token.
    pub access_token: String,
    /// Token scheme, normally `bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Parses raw JSON into a prediction result.
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON.
/// Returns [`ContractError::InvalidContract`] when detection confidences fall
/// outside `[0, 1]` or a class name is blank.
pub fn parse_prediction_response(raw: &[u8]) -> Result<PredictionResult, ContractError> {
    let parsed: PredictionResult = serde_json::from_slice(raw)?;
    validate_detections(parsed.detections())?;
    Ok(parsed)
}

/// Parses the ordered history sequence.
///
/// Records with a blank id or invalid detections are dropped with a warning;
/// the remaining records keep their order.
///
/// # Errors
/// Returns [`ContractError::Decode`] when the body is not a JSON array of
/// history records.
pub fn parse_history_response(raw: &[u8]) -> Result<Vec<HistoryEntry>, ContractError> {
    let parsed: Vec<HistoryEntry> = serde_json::from_slice(raw)?;
    Ok(parsed
        .into_iter()
        .filter(|entry| match validate_history_entry(entry) {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    stage = "contract",
                    action = "parse_history",
                    id = %entry.id,
                    error = %error,
                    "skipping invalid history entry"
                );
                false
            }
        })
        .collect())
}

fn validate_history_entry(entry: &HistoryEntry) -> Result<(), ContractError> {
    if entry.id.trim().is_empty() {
        return Err(ContractError::InvalidContract(
            "history entry has empty _id".to_string(),
        ));
    }
    match &entry.detections {
        Some(detections) => validate_detections(detections),
        None => Ok(()),
    }
}

/// Parses a login response.
///
/// # Errors
/// Returns [`ContractError::InvalidContract`] when the token is blank.
pub fn parse_login_response(raw: &[u8]) -> Result<LoginResponse, ContractError> {
    let parsed: LoginResponse = serde_json::from_slice(raw)?;
    if parsed.access_token.trim().is_empty() {
        return Err(ContractError::InvalidContract(
            "access_token is empty".to_string(),
        ));
    }
    Ok(parsed)
}

/// Extracts the human-readable `detail` string from an error body.
///
/// Structured details (validation error lists) and non-JSON bodies yield
/// `None` so callers fall back to their generic message.
pub fn extract_error_detail(raw: &[u8]) -> Option<String> {
    let body: ErrorBody = serde_json::from_slice(raw).ok()?;
    match body.detail? {
        serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail),
        _ => None,
    }
}

/// Formats a `[0, 1]` confidence as a one-decimal percentage.
pub fn format_confidence(confidence: f32) -> String {
    format!("{:.1}%", confidence * 100.0)
}

fn validate_detections(detections: &[Detection]) -> Result<(), ContractError> {
    for detection in detections {
        if detection.class_name.trim().is_empty() {
            return Err(ContractError::InvalidContract(
                "detection class_name is empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&detection.confidence) {
            return Err(ContractError::InvalidContract(format!(
                "detection confidence {} is outside [0, 1]",
                detection.confidence
            )));
        }
    }
    Ok(())
}

/// Contract errors.
#[derive(Debug, Error)]
pub enum ContractError {
    /// JSON decode failure.
    #[error("response decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Parsed payload violates contract invariants.
    #[error("response contract violation: {0}")]
    InvalidContract(String),
}
