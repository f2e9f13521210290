//! In-process backend used by the demo binary and the integration tests.
//!
//! Implements the five REST operations over in-memory maps and records every
//! request it receives.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hairlytic_api::{ApiError, ApiRequest, ApiResponse, BackendTransport, HttpMethod, RequestBody};
use hairlytic_core::ImageFile;
use hairlytic_prediction_contract::{HistoryEntry, PredictionResult};
use serde_json::json;

const CREDENTIALS_REJECTED: &str = "Could not validate credentials";
const LOGIN_REJECTED: &str = "Incorrect username or password";
const USERNAME_TAKEN: &str = "Username already registered";

#[derive(Default)]
struct OfflineState {
    users: HashMap<String, String>,
    tokens: HashMap<String, String>,
    history: HashMap<String, Vec<HistoryEntry>>,
    uploads: HashMap<(String, String), ImageFile>,
    requests: Vec<ApiRequest>,
    prediction: Option<(u16, serde_json::Value)>,
    history_available: bool,
    next_id: u64,
}

/// In-memory [`BackendTransport`].
///
/// Predictions echo the uploaded image back as the annotated image and, when
/// accepted, report one `patch` detection at 0.87 unless another response is
/// scripted with [`OfflineBackend::set_prediction_response`].
pub struct OfflineBackend {
    state: Mutex<OfflineState>,
    latency: Option<Duration>,
}

impl OfflineBackend {
    /// Creates a backend without users.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(OfflineState {
                history_available: true,
                ..OfflineState::default()
            }),
            latency: None,
        }
    }

    /// Adds a registered user.
    pub fn with_user(self, username: &str, password: &str) -> Self {
        self.with_state(|state| {
            state.users.insert(username.to_string(), password.to_string());
        });
        self
    }

    /// Delays every response.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Scripts the `/predict` answer. Non-2xx statuses are returned as errors
    /// and record nothing.
    pub fn set_prediction_response(&self, status: u16, body: serde_json::Value) {
        self.with_state(|state| state.prediction = Some((status, body)));
    }

    /// Makes `/history` fail with a 500 while `false`.
    pub fn set_history_available(&self, available: bool) {
        self.with_state(|state| state.history_available = available);
    }

    /// Inserts a history record for `username` (newest first).
    pub fn seed_history(&self, username: &str, entry: HistoryEntry) {
        self.with_state(|state| {
            state
                .history
                .entry(username.to_string())
                .or_default()
                .insert(0, entry);
        });
    }

    /// Stores an upload under `/uploads/<username>/<image_filename>`.
    pub fn seed_upload(&self, username: &str, image_filename: &str, image: ImageFile) {
        self.with_state(|state| {
            state
                .uploads
                .insert((username.to_string(), image_filename.to_string()), image);
        });
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state
            .lock()
            .map(|state| state.requests.clone())
            .unwrap_or_default()
    }

    /// Number of requests whose path ends with `suffix`.
    pub fn request_count(&self, suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.url.path().ends_with(suffix))
            .count()
    }

    fn with_state<T>(&self, apply: impl FnOnce(&mut OfflineState) -> T) -> Option<T> {
        self.state.lock().ok().map(|mut state| apply(&mut state))
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendTransport for OfflineBackend {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self
            .state
            .lock()
            .map_err(|_| ApiError::Transport("offline backend state poisoned".to_string()))?;
        state.requests.push(request.clone());

        let segments: Vec<String> = request
            .url
            .path_segments()
            .map(|segments| segments.map(str::to_string).collect())
            .unwrap_or_default();
        let tail: Vec<&str> = segments.iter().map(String::as_str).collect();

        let response = match (request.method, tail.as_slice()) {
            (HttpMethod::Post, [.., "login"]) => login(&mut state, &request),
            (HttpMethod::Post, [.., "register"]) => register(&mut state, &request),
            (HttpMethod::Get, [.., "history"]) => match authorize(&state, &request) {
                Ok(_) if !state.history_available => error(500, "History store unavailable"),
                Ok(username) => {
                    let entries = state.history.get(&username).cloned().unwrap_or_default();
                    ApiResponse::json(200, &json!(entries))
                }
                Err(response) => response,
            },
            (HttpMethod::Post, [.., "predict"]) => match authorize(&state, &request) {
                Ok(username) => predict(&mut state, &request, &username),
                Err(response) => response,
            },
            (HttpMethod::Get, [.., "uploads", owner, file]) => match authorize(&state, &request) {
                Ok(_) => match state.uploads.get(&(owner.to_string(), file.to_string())) {
                    Some(image) => ApiResponse::binary(image.content_type(), image.bytes().clone()),
                    None => error(404, "File not found"),
                },
                Err(response) => response,
            },
            _ => error(404, "Not Found"),
        };
        Ok(response)
    }
}

fn error(status: u16, detail: &str) -> ApiResponse {
    ApiResponse::json(status, &json!({ "detail": detail }))
}

fn authorize(state: &OfflineState, request: &ApiRequest) -> Result<String, ApiResponse> {
    request
        .bearer
        .as_ref()
        .and_then(|token| state.tokens.get(token))
        .cloned()
        .ok_or_else(|| error(401, CREDENTIALS_REJECTED))
}

fn login(state: &mut OfflineState, request: &ApiRequest) -> ApiResponse {
    let (Some(username), Some(password)) =
        (request.form_value("username"), request.form_value("password"))
    else {
        return error(422, "username and password are required");
    };
    if state.users.get(username).map(String::as_str) != Some(password) {
        return error(401, LOGIN_REJECTED);
    }

    state.next_id += 1;
    let token = format!("offline-token-{}", state.next_id);
    state.tokens.insert(token.clone(), username.to_string());
    ApiResponse::json(200, &json!({ "access_token": token, "token_type": "bearer" }))
}

fn register(state: &mut OfflineState, request: &ApiRequest) -> ApiResponse {
    let (Some(username), Some(password)) =
        (request.form_value("username"), request.form_value("password"))
    else {
        return error(422, "username and password are required");
    };
    if state.users.contains_key(username) {
        return error(400, USERNAME_TAKEN);
    }
    state.users.insert(username.to_string(), password.to_string());
    ApiResponse::json(200, &json!({ "message": "User created successfully" }))
}

fn predict(state: &mut OfflineState, request: &ApiRequest, username: &str) -> ApiResponse {
    let RequestBody::Multipart { file, .. } = &request.body else {
        return error(422, "file is required");
    };

    let (status, body) = state.prediction.clone().unwrap_or_else(|| {
        (
            200,
            json!({
                "status": "accepted",
                "diagnosis": "Alopecia Detected",
                "detections": [{ "class_name": "patch", "confidence": 0.87 }],
                "annotated_image": STANDARD.encode(file.bytes()),
            }),
        )
    });
    if !(200..300).contains(&status) {
        return ApiResponse::json(status, &body);
    }

    // Stored like the real backend: one history record plus the raw upload.
    if let Ok(result) = serde_json::from_value::<PredictionResult>(body.clone()) {
        state.next_id += 1;
        let image_filename = format!("{}_{}", state.next_id, file.file_name());
        let entry = HistoryEntry {
            id: format!("pred-{}", state.next_id),
            filename: file.file_name().to_string(),
            image_filename: Some(image_filename.clone()),
            username: Some(username.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: result.status,
            diagnosis: result.diagnosis,
            message: result.message,
            detections: result.detections,
        };
        state
            .history
            .entry(username.to_string())
            .or_default()
            .insert(0, entry);
        state
            .uploads
            .insert((username.to_string(), image_filename), file.clone());
    }

    ApiResponse::json(status, &body)
}
