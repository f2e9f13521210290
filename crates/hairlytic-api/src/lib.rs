#![warn(missing_docs)]
//! # hairlytic-api
//!
//! ## Purpose
//! Client side of the backend REST boundary.
//!
//! ## Responsibilities
//! - Build typed requests for the five backend operations (`/login`,
//!   `/register`, `/history`, `/predict`, `/uploads/<user>/<file>`).
//! - Send them through an injectable [`BackendTransport`].
//! - Map non-2xx responses to [`ApiError::Status`] carrying the backend's
//!   human-readable `detail` when one is provided.
//!
//! ## Data flow
//! Controller -> [`ApiClient`] builds [`ApiRequest`] -> [`BackendTransport::send`]
//! -> [`ApiResponse`] -> contract parsing -> typed result.
//!
//! ## Ownership and lifetimes
//! Requests own their body (image bytes are a shared [`bytes::Bytes`]
//! handle), so transports may move them across tasks.
//!
//! ## Error model
//! No retries are attempted anywhere. Every failure is returned to the
//! caller, which decides which user-facing surface shows it.
//!
//! ## Security and privacy notes
//! Bearer tokens and form passwords are redacted from `Debug` output.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use hairlytic_core::{ConfidenceThreshold, ImageFile};
use hairlytic_prediction_contract::{
    ContractError, HistoryEntry, LoginResponse, PredictionResult, extract_error_detail,
    parse_history_response, parse_login_response, parse_prediction_response,
};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Multipart field name carrying the image on `/predict`.
pub const PREDICT_FILE_FIELD: &str = "file";

/// HTTP method subset used by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

/// Request payload variants.
#[derive(Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    /// `multipart/form-data` with a single file part.
    Multipart {
        /// Part name.
        field: String,
        /// File content.
        file: ImageFile,
    },
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Form(pairs) => {
                let keys: Vec<&str> = pairs.iter().map(|(key, _)| key.as_str()).collect();
                f.debug_tuple("Form").field(&keys).finish()
            }
            Self::Multipart { field, file } => f
                .debug_struct("Multipart")
                .field("field", field)
                .field("file", file)
                .finish(),
        }
    }
}

/// One backend request.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute request URL.
    pub url: Url,
    /// Bearer token for protected routes.
    pub bearer: Option<String>,
    /// Request body.
    pub body: RequestBody,
}

impl ApiRequest {
    /// Returns the value of form field `key`, if this is a form request.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(pairs) => pairs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// Returns the value of query parameter `key`.
    pub fn query_value(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .field("body", &self.body)
            .finish()
    }
}

/// One backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header value.
    pub content_type: Option<String>,
    /// Raw body.
    pub body: Bytes,
}

impl ApiResponse {
    /// Builds a JSON response.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: Bytes::from(value.to_string()),
        }
    }

    /// Builds a binary response.
    pub fn binary(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.into()),
            body: body.into(),
        }
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstract transport used by [`ApiClient`].
#[async_trait]
pub trait BackendTransport: Send + Sync {
    /// Sends one request and returns the raw response.
    ///
    /// # Errors
    /// Returns [`ApiError::Transport`] when no response was received.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// Typed client for the backend REST API.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    transport: Arc<dyn BackendTransport>,
}

impl ApiClient {
    /// Creates a client rooted at `base_url` (for example
    /// `http://localhost:8000/api`).
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidEndpoint`] when the URL does not parse or is
    /// not `http`/`https`.
    pub fn new(base_url: &str, transport: Arc<dyn BackendTransport>) -> Result<Self, ApiError> {
        let base = validate_base_url(base_url)?;
        Ok(Self { base, transport })
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Joins path segments onto the base URL, percent-encoding each segment.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `POST /login` with form-encoded credentials.
    ///
    /// # Errors
    /// Returns [`ApiError::Status`] for rejected credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .execute(ApiRequest {
                method: HttpMethod::Post,
                url: self.endpoint(&["login"]),
                bearer: None,
                body: credential_form(username, password),
            })
            .await?;
        Ok(parse_login_response(&response.body)?)
    }

    /// `POST /register` with form-encoded credentials.
    ///
    /// # Errors
    /// Returns [`ApiError::Status`] when the backend refuses the account.
    pub async fn register(&self, username: &str, password: &str) -> Result<(), ApiError> {
        self.execute(ApiRequest {
            method: HttpMethod::Post,
            url: self.endpoint(&["register"]),
            bearer: None,
            body: credential_form(username, password),
        })
        .await?;
        Ok(())
    }

    /// `GET /history`.
    ///
    /// # Errors
    /// Propagates transport, status, and decode failures.
    pub async fn history(&self, token: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        let response = self
            .execute(ApiRequest {
                method: HttpMethod::Get,
                url: self.endpoint(&["history"]),
                bearer: Some(token.to_string()),
                body: RequestBody::Empty,
            })
            .await?;
        Ok(parse_history_response(&response.body)?)
    }

    /// `POST /predict?conf=<threshold>` with a multipart image.
    ///
    /// # Errors
    /// Returns [`ApiError::Status`] when the backend fails to process the
    /// image. A rejected-status body is a successful result.
    pub async fn predict(
        &self,
        token: &str,
        image: &ImageFile,
        confidence: ConfidenceThreshold,
    ) -> Result<PredictionResult, ApiError> {
        let mut url = self.endpoint(&["predict"]);
        url.query_pairs_mut()
            .append_pair("conf", &confidence.to_string());

        let response = self
            .execute(ApiRequest {
                method: HttpMethod::Post,
                url,
                bearer: Some(token.to_string()),
                body: RequestBody::Multipart {
                    field: PREDICT_FILE_FIELD.to_string(),
                    file: image.clone(),
                },
            })
            .await?;
        Ok(parse_prediction_response(&response.body)?)
    }

    /// `GET /uploads/<username>/<image_filename>`.
    ///
    /// # Errors
    /// Returns [`ApiError::NotAnImage`] when the body is not an image.
    pub async fn fetch_upload(
        &self,
        token: &str,
        username: &str,
        image_filename: &str,
    ) -> Result<ImageFile, ApiError> {
        let response = self
            .execute(ApiRequest {
                method: HttpMethod::Get,
                url: self.endpoint(&["uploads", username, image_filename]),
                bearer: Some(token.to_string()),
                body: RequestBody::Empty,
            })
            .await?;

        let image = match response.content_type.as_deref() {
            Some(content_type) if content_type.starts_with("image/") => {
                ImageFile::new(image_filename, content_type, response.body)
            }
            _ => ImageFile::sniffed(image_filename, response.body),
        };
        image.map_err(|error| ApiError::NotAnImage(error.to_string()))
    }

    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        debug!(
            stage = "api",
            action = "send",
            method = ?request.method,
            path = request.url.path(),
            "sending backend request"
        );
        let response = self.transport.send(request).await?;
        if response.is_success() {
            return Ok(response);
        }

        Err(ApiError::Status {
            status: response.status,
            detail: extract_error_detail(&response.body),
        })
    }
}

/// Validates a backend base URL.
///
/// # Errors
/// Returns [`ApiError::InvalidEndpoint`] for unparsable, non-HTTP, or
/// non-hierarchical URLs.
pub fn validate_base_url(base_url: &str) -> Result<Url, ApiError> {
    let parsed = Url::parse(base_url)
        .map_err(|error| ApiError::InvalidEndpoint(format!("invalid base url: {error}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::InvalidEndpoint(
            "base url must use http or https".to_string(),
        ));
    }
    if parsed.cannot_be_a_base() {
        return Err(ApiError::InvalidEndpoint(
            "base url must be hierarchical".to_string(),
        ));
    }

    Ok(parsed)
}

/// Returns `true` when endpoint URL is HTTPS.
pub fn is_https_endpoint(endpoint: &str) -> bool {
    Url::parse(endpoint)
        .map(|url| url.scheme() == "https")
        .unwrap_or(false)
}

/// Returns `true` when the endpoint host is loopback (`localhost`, `127.0.0.1`, `::1`).
pub fn is_loopback_endpoint(endpoint: &str) -> bool {
    Url::parse(endpoint)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .is_some_and(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]"))
}

fn credential_form(username: &str, password: &str) -> RequestBody {
    RequestBody::Form(vec![
        ("username".to_string(), username.to_string()),
        ("password".to_string(), password.to_string()),
    ])
}

/// Errors produced at the backend boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Base URL violates endpoint policy.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// No response was received.
    #[error("backend transport failure: {0}")]
    Transport(String),
    /// Backend answered with a non-2xx status.
    #[error("backend returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Human-readable `detail` from the error body.
        detail: Option<String>,
    },
    /// Successful response body violated the contract.
    #[error("backend contract failure: {0}")]
    Contract(#[from] ContractError),
    /// Binary response was not an image.
    #[error("backend returned a non-image payload: {0}")]
    NotAnImage(String),
}

impl ApiError {
    /// Backend-provided detail text, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status {
                detail: Some(detail),
                ..
            } => Some(detail),
            _ => None,
        }
    }

    /// Backend detail, or `fallback` when none was provided.
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail().unwrap_or(fallback).to_string()
    }
}
