#![warn(missing_docs)]
//! # hairlytic-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `hairlytic` workspace.
//!
//! ## Responsibilities
//! - Represent raw camera frames and validated image files.
//! - Model the confidence threshold sent with every prediction request.
//! - Model the authenticated session pair (token + username).
//!
//! ## Data flow
//! Capture code emits [`Frame`] values which are encoded into an
//! [`ImageFile`]. Uploads produce [`ImageFile`] directly from selected bytes.
//! The workflow submits an [`ImageFile`] together with a
//! [`ConfidenceThreshold`] on behalf of the current [`Session`].
//!
//! ## Ownership and lifetimes
//! Image payloads are carried as [`bytes::Bytes`], so previews, pending
//! submissions, and object URLs share one buffer without copies.
//!
//! ## Error model
//! Validation failures (shape mismatch, non-image payload, blank session
//! fields) return [`CoreError`] variants.
//!
//! ## Security and privacy notes
//! [`Session`] deliberately omits the token from its `Debug` output.
//!
//! ## Example
//! ```rust
//! use hairlytic_core::ConfidenceThreshold;
//!
//! let conf = ConfidenceThreshold::new(0.27);
//! assert_eq!(conf.to_string(), "0.25");
//! ```

use std::fmt;
use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest confidence threshold accepted by the detector, in hundredths.
const MIN_CONFIDENCE_HUNDREDTHS: u8 = 10;
/// Highest confidence threshold, in hundredths.
const MAX_CONFIDENCE_HUNDREDTHS: u8 = 100;
/// Slider granularity, in hundredths.
const CONFIDENCE_STEP_HUNDREDTHS: u8 = 5;
/// Initial slider position, in hundredths.
const DEFAULT_CONFIDENCE_HUNDREDTHS: u8 = 25;

/// One raw frame pulled from a live camera stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Identifier of the device that produced the frame.
    pub device_id: String,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Capture time in Unix epoch milliseconds.
    pub captured_at_ms: u64,
    /// Raw RGBA pixel buffer (`width * height * 4` bytes).
    pub rgba: Vec<u8>,
}

impl Frame {
    /// Constructs a validated frame.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidFrameShape`] when the pixel buffer length is
    /// not exactly `width * height * 4`, and [`CoreError::EmptyFrame`] when
    /// either dimension is zero.
    pub fn new(
        device_id: impl Into<String>,
        width: u32,
        height: u32,
        captured_at_ms: u64,
        rgba: Vec<u8>,
    ) -> Result<Self, CoreError> {
        if width == 0 || height == 0 {
            return Err(CoreError::EmptyFrame);
        }

        let expected_len = required_rgba_len(width, height)?;
        if rgba.len() != expected_len {
            return Err(CoreError::InvalidFrameShape {
                expected: expected_len,
                actual: rgba.len(),
            });
        }

        Ok(Self {
            device_id: device_id.into(),
            width,
            height,
            captured_at_ms,
            rgba,
        })
    }
}

/// Binary image data chosen for analysis, either uploaded or captured.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    file_name: String,
    content_type: String,
    bytes: Bytes,
}

impl ImageFile {
    /// Creates an image file with an explicit content type.
    ///
    /// # Errors
    /// Returns [`CoreError::NotAnImage`] when `content_type` is not `image/*`
    /// and [`CoreError::EmptyImage`] when `bytes` is empty.
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Result<Self, CoreError> {
        let content_type = content_type.into();
        if !content_type.starts_with("image/") {
            return Err(CoreError::NotAnImage(content_type));
        }

        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(CoreError::EmptyImage);
        }

        Ok(Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        })
    }

    /// Creates an image file by sniffing the content type from the payload.
    ///
    /// # Errors
    /// Returns [`CoreError::NotAnImage`] when the bytes do not match any known
    /// image signature.
    pub fn sniffed(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Result<Self, CoreError> {
        let bytes = bytes.into();
        let format = image::guess_format(&bytes)
            .map_err(|_| CoreError::NotAnImage("unrecognized payload".to_string()))?;
        Self::new(file_name, format.to_mime_type(), bytes)
    }

    /// Reads and sniffs an image from disk.
    ///
    /// # Errors
    /// Returns [`CoreError::Io`] when the file cannot be read and
    /// [`CoreError::NotAnImage`] when it is not an image.
    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Self::sniffed(file_name, bytes)
    }

    /// Returns the file name reported to the backend.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the MIME type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Returns a cheap handle to the payload.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Returns payload size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false` for a constructed file; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Detector confidence threshold, constrained to `[0.10, 1.00]` on a 0.05 grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfidenceThreshold {
    hundredths: u8,
}

impl ConfidenceThreshold {
    /// Lowest selectable threshold.
    pub const MIN: Self = Self {
        hundredths: MIN_CONFIDENCE_HUNDREDTHS,
    };
    /// Highest selectable threshold.
    pub const MAX: Self = Self {
        hundredths: MAX_CONFIDENCE_HUNDREDTHS,
    };

    /// Creates a threshold, clamping into range and snapping to the 0.05 grid.
    /// Non-finite input falls back to the default.
    pub fn new(value: f32) -> Self {
        if !value.is_finite() {
            return Self::default();
        }

        let steps = (value * 100.0 / f32::from(CONFIDENCE_STEP_HUNDREDTHS)).round();
        let hundredths = (steps * f32::from(CONFIDENCE_STEP_HUNDREDTHS)).clamp(
            f32::from(MIN_CONFIDENCE_HUNDREDTHS),
            f32::from(MAX_CONFIDENCE_HUNDREDTHS),
        ) as u8;
        Self { hundredths }
    }

    /// Returns the threshold as a float in `[0.1, 1.0]`.
    pub fn value(&self) -> f32 {
        f32::from(self.hundredths) / 100.0
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self {
            hundredths: DEFAULT_CONFIDENCE_HUNDREDTHS,
        }
    }
}

impl fmt::Display for ConfidenceThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.hundredths / 100, self.hundredths % 100)
    }
}

/// Authenticated session: bearer token plus the username it was issued for.
///
/// Both fields are always present together; an anonymous user has no
/// `Session` at all.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    token: String,
    username: String,
}

impl Session {
    /// Creates a session.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidSession`] when either field is blank.
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Result<Self, CoreError> {
        let token = token.into();
        let username = username.into();
        if token.trim().is_empty() || username.trim().is_empty() {
            return Err(CoreError::InvalidSession);
        }
        Ok(Self { token, username })
    }

    /// Bearer token for protected API calls.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Username the token was issued for.
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}

/// Error type for core domain validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Frame buffer shape does not match declared geometry.
    #[error("invalid frame shape: expected {expected} bytes, got {actual}")]
    InvalidFrameShape {
        /// Expected RGBA byte count.
        expected: usize,
        /// Actual RGBA byte count.
        actual: usize,
    },
    /// Frame has a zero dimension.
    #[error("frame has zero width or height")]
    EmptyFrame,
    /// Frame dimensions overflow addressable memory.
    #[error("frame dimensions overflow")]
    FrameOverflow,
    /// Payload is not an image.
    #[error("not an image: {0}")]
    NotAnImage(String),
    /// Image payload is empty.
    #[error("image payload is empty")]
    EmptyImage,
    /// Session token or username is blank.
    #[error("session token and username must be non-empty")]
    InvalidSession,
    /// Reading an image from disk failed.
    #[error("image read failure: {0}")]
    Io(#[from] std::io::Error),
}

fn required_rgba_len(width: u32, height: u32) -> Result<usize, CoreError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(CoreError::FrameOverflow)
}
