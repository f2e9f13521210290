#![warn(missing_docs)]
//! # hairlytic-capture
//!
//! ## Purpose
//! Manages a live camera stream and turns a frozen frame into a submittable
//! JPEG still.
//!
//! ## Responsibilities
//! - Define a backend-agnostic [`CaptureDevice`] / [`StreamHandle`] pair.
//! - Drive the capture lifecycle through [`CaptureController`]
//!   (`Idle -> Requesting -> Previewing <-> Frozen`, or `Denied`).
//! - Guarantee the device handle is held iff the controller is previewing or
//!   frozen, and is released on every teardown path.
//! - Provide a deterministic synthetic device for tests and offline runs.
//!
//! ## Data flow
//! [`CaptureController::start`] acquires a stream -> live preview ->
//! [`CaptureController::capture`] grabs a [`Frame`], encodes JPEG, installs it
//! in the preview slot of [`ObjectUrlManager`] -> workflow submits it.
//!
//! ## Ownership and lifetimes
//! The controller exclusively owns the boxed stream handle. Releasing
//! consumes the handle, so a stream cannot be stopped twice. Dropping the
//! controller releases the stream.
//!
//! ## Error model
//! Permission and availability failures move the controller to `Denied`;
//! acknowledging returns it to `Idle`. Illegal transitions return
//! [`CaptureError`] without changing state.
//!
//! ## Cancellation
//! Each controller owns a teardown [`CancellationToken`]. Cancelling it
//! aborts an in-flight acquisition or frame grab; the controller then ends in
//! `Idle` with no handle.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hairlytic_core::{Frame, ImageFile};
use hairlytic_media::{MediaReference, MediaSlot, ObjectUrlManager};
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// JPEG quality used for snapshot stills.
pub const JPEG_QUALITY: u8 = 95;

/// Alert shown when the camera cannot be opened.
pub const CAMERA_ACCESS_MESSAGE: &str = "Could not access camera. Please check permissions.";

/// Preferred camera facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Front (selfie) camera.
    User,
    /// Rear camera.
    Environment,
}

/// Acquisition constraints passed to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    /// Preferred facing.
    pub facing: FacingMode,
    /// Ideal frame width in pixels.
    pub ideal_width: u32,
    /// Ideal frame height in pixels.
    pub ideal_height: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Source of live video streams.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Requests exclusive access to a camera.
    ///
    /// # Errors
    /// Returns [`CaptureError::PermissionDenied`] or
    /// [`CaptureError::DeviceUnavailable`] when access is refused.
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn StreamHandle>, CaptureError>;
}

/// Exclusive handle to an open camera stream.
#[async_trait]
pub trait StreamHandle: Send {
    /// Identifier of the producing device.
    fn device_id(&self) -> &str;

    /// Draws the current video frame.
    ///
    /// # Errors
    /// Returns [`CaptureError::Backend`] when the stream cannot produce a frame.
    async fn grab_frame(&mut self, captured_at_ms: u64) -> Result<Frame, CaptureError>;

    /// Stops every track and releases the device.
    fn stop_tracks(self: Box<Self>);
}

/// Capture lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    /// No stream, nothing pending.
    Idle,
    /// Waiting for the device to grant access.
    Requesting,
    /// Stream open, live video visible.
    Previewing,
    /// Stream open, captured still visible.
    Frozen,
    /// Access was refused; waiting for acknowledgment.
    Denied {
        /// User-facing alert text.
        message: String,
    },
}

impl CaptureState {
    /// Returns `true` for the two states that hold a stream.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Previewing | Self::Frozen)
    }
}

/// Result of [`CaptureController::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new stream was acquired.
    Acquired,
    /// A stream was already open; the controller went back to live preview.
    Resumed,
}

/// Capture state machine enforcing one open stream at a time.
pub struct CaptureController {
    device: Arc<dyn CaptureDevice>,
    constraints: CaptureConstraints,
    enabled: bool,
    state: CaptureState,
    stream: Option<Box<dyn StreamHandle>>,
    teardown: CancellationToken,
}

impl CaptureController {
    /// Creates an idle controller for `device`.
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self {
            device,
            constraints: CaptureConstraints::default(),
            enabled: true,
            state: CaptureState::Idle,
            stream: None,
            teardown: CancellationToken::new(),
        }
    }

    /// Overrides acquisition constraints.
    pub fn with_constraints(mut self, constraints: CaptureConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Disables camera access entirely (runtime kill switch).
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Current state.
    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Returns `true` while a stream handle is held.
    pub fn holds_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Token that aborts in-flight operations when cancelled. Hand it to the
    /// owning view's teardown path.
    pub fn teardown_handle(&self) -> CancellationToken {
        self.teardown.clone()
    }

    /// Opens the camera, or returns to live preview if it is already open.
    ///
    /// Re-entering while active drops any frozen still (releasing its preview
    /// URL) instead of acquiring a second stream.
    ///
    /// # Errors
    /// Returns device-access errors (state becomes `Denied`) or
    /// [`CaptureError::TornDown`] after teardown (state becomes `Idle`).
    pub async fn start(&mut self, urls: &mut ObjectUrlManager) -> Result<StartOutcome, CaptureError> {
        if self.teardown.is_cancelled() {
            return Err(CaptureError::TornDown);
        }

        if self.state.is_active() && self.stream.is_some() {
            urls.clear(MediaSlot::Preview);
            self.state = CaptureState::Previewing;
            return Ok(StartOutcome::Resumed);
        }

        if !self.enabled {
            let error = CaptureError::DeviceUnavailable("camera disabled by configuration".to_string());
            self.state = CaptureState::Denied {
                message: error.user_message(),
            };
            return Err(error);
        }

        self.state = CaptureState::Requesting;
        info!(stage = "capture", action = "start", constraints = ?self.constraints, "requesting camera");

        let token = self.teardown.clone();
        let acquired = tokio::select! {
            biased;
            _ = token.cancelled() => Err(CaptureError::TornDown),
            result = self.device.acquire(&self.constraints) => result,
        };

        match acquired {
            Ok(stream) => {
                info!(stage = "capture", action = "granted", device = stream.device_id(), "camera stream open");
                self.stream = Some(stream);
                self.state = CaptureState::Previewing;
                Ok(StartOutcome::Acquired)
            }
            Err(CaptureError::TornDown) => {
                self.state = CaptureState::Idle;
                Err(CaptureError::TornDown)
            }
            Err(error) => {
                warn!(stage = "capture", action = "denied", "camera request failed: {error}");
                self.state = CaptureState::Denied {
                    message: error.user_message(),
                };
                Err(error)
            }
        }
    }

    /// Acknowledges a denial alert. No-op in any other state.
    pub fn acknowledge_denied(&mut self) {
        if matches!(self.state, CaptureState::Denied { .. }) {
            self.state = CaptureState::Idle;
        }
    }

    /// Freezes the current frame into a JPEG still installed in the preview
    /// slot. The stream stays open for a retake.
    ///
    /// # Errors
    /// Returns [`CaptureError::NotPreviewing`] unless the live preview is
    /// showing; encoding and stream failures leave the preview running.
    pub async fn capture(
        &mut self,
        urls: &mut ObjectUrlManager,
        captured_at_ms: u64,
    ) -> Result<MediaReference, CaptureError> {
        if self.state != CaptureState::Previewing {
            return Err(CaptureError::NotPreviewing);
        }
        let token = self.teardown.clone();
        let stream = self.stream.as_mut().ok_or(CaptureError::NotPreviewing)?;

        let grabbed = tokio::select! {
            biased;
            _ = token.cancelled() => Err(CaptureError::TornDown),
            result = stream.grab_frame(captured_at_ms) => result,
        };
        let frame = match grabbed {
            Ok(frame) => frame,
            Err(CaptureError::TornDown) => {
                self.stop();
                return Err(CaptureError::TornDown);
            }
            Err(error) => return Err(error),
        };

        let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(&frame, JPEG_QUALITY))
            .await
            .map_err(|error| CaptureError::Encode(error.to_string()))??;
        let still = ImageFile::new(format!("camera_{captured_at_ms}.jpg"), "image/jpeg", jpeg)
            .map_err(|error| CaptureError::Encode(error.to_string()))?;

        let reference = urls.set(MediaSlot::Preview, still);
        self.state = CaptureState::Frozen;
        info!(stage = "capture", action = "snapshot", bytes = reference.image.len(), "still captured");
        Ok(reference)
    }

    /// Discards the frozen still and resumes live preview.
    ///
    /// # Errors
    /// Returns [`CaptureError::NotFrozen`] when no still is showing.
    pub fn retake(&mut self, urls: &mut ObjectUrlManager) -> Result<(), CaptureError> {
        if self.state != CaptureState::Frozen {
            return Err(CaptureError::NotFrozen);
        }
        urls.clear(MediaSlot::Preview);
        self.state = CaptureState::Previewing;
        Ok(())
    }

    /// Releases the stream (if any) and returns to `Idle`. Safe from any state.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            info!(stage = "capture", action = "stop", device = stream.device_id(), "releasing camera");
            stream.stop_tracks();
        }
        self.state = CaptureState::Idle;
    }

    /// Cancels in-flight work and stops. Further starts are refused.
    pub fn teardown(&mut self) {
        self.teardown.cancel();
        self.stop();
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for CaptureController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureController")
            .field("state", &self.state)
            .field("holds_stream", &self.stream.is_some())
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Encodes an RGBA frame as JPEG.
///
/// # Errors
/// Returns [`CaptureError::Encode`] when the frame buffer is inconsistent or
/// the encoder fails.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let rgba = image::RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone())
        .ok_or_else(|| CaptureError::Encode("frame buffer does not match geometry".to_string()))?;
    let rgb = image::DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|error| CaptureError::Encode(error.to_string()))?;
    Ok(jpeg)
}

/// Permission answer of the synthetic device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePermission {
    /// Access granted.
    Granted,
    /// User or OS refused access.
    Denied,
    /// No camera present.
    Unavailable,
}

#[derive(Debug, Default)]
struct DeviceCounters {
    open: AtomicUsize,
    acquisitions: AtomicUsize,
    releases: AtomicUsize,
    sequence: AtomicU64,
}

/// Deterministic camera for tests and offline runs.
///
/// Refuses a second acquisition while a stream is open, which models the
/// exclusive nature of a real camera.
#[derive(Debug)]
pub struct SyntheticCameraDevice {
    id: String,
    width: u32,
    height: u32,
    permission: Mutex<DevicePermission>,
    acquire_delay: Option<Duration>,
    last_constraints: Mutex<Option<CaptureConstraints>>,
    counters: Arc<DeviceCounters>,
}

impl SyntheticCameraDevice {
    /// Creates a granting 16x12 device.
    pub fn new() -> Self {
        Self::with_resolution(16, 12)
    }

    /// Creates a granting device with the given frame size.
    pub fn with_resolution(width: u32, height: u32) -> Self {
        Self {
            id: "synthetic-camera".to_string(),
            width,
            height,
            permission: Mutex::new(DevicePermission::Granted),
            acquire_delay: None,
            last_constraints: Mutex::new(None),
            counters: Arc::new(DeviceCounters::default()),
        }
    }

    /// Delays every acquisition, to exercise the `Requesting` state.
    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = Some(delay);
        self
    }

    /// Changes the answer to future acquisition requests.
    pub fn set_permission(&self, permission: DevicePermission) {
        if let Ok(mut current) = self.permission.lock() {
            *current = permission;
        }
    }

    /// Streams currently open.
    pub fn open_streams(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Successful acquisitions so far.
    pub fn acquisitions(&self) -> usize {
        self.counters.acquisitions.load(Ordering::SeqCst)
    }

    /// Releases so far.
    pub fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }

    /// Constraints of the most recent request.
    pub fn last_constraints(&self) -> Option<CaptureConstraints> {
        self.last_constraints.lock().ok().and_then(|last| *last)
    }
}

impl Default for SyntheticCameraDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureDevice for SyntheticCameraDevice {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn StreamHandle>, CaptureError> {
        if let Ok(mut last) = self.last_constraints.lock() {
            *last = Some(*constraints);
        }
        if let Some(delay) = self.acquire_delay {
            tokio::time::sleep(delay).await;
        }

        let permission = self
            .permission
            .lock()
            .map(|permission| *permission)
            .map_err(|_| CaptureError::Backend("synthetic permission lock poisoned".to_string()))?;
        match permission {
            DevicePermission::Granted => {}
            DevicePermission::Denied => {
                return Err(CaptureError::PermissionDenied("NotAllowedError".to_string()));
            }
            DevicePermission::Unavailable => {
                return Err(CaptureError::DeviceUnavailable("NotFoundError".to_string()));
            }
        }

        if self
            .counters
            .open
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CaptureError::Busy);
        }
        self.counters.acquisitions.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(SyntheticStream {
            device_id: self.id.clone(),
            width: self.width,
            height: self.height,
            counters: self.counters.clone(),
        }))
    }
}

struct SyntheticStream {
    device_id: String,
    width: u32,
    height: u32,
    counters: Arc<DeviceCounters>,
}

#[async_trait]
impl StreamHandle for SyntheticStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn grab_frame(&mut self, captured_at_ms: u64) -> Result<Frame, CaptureError> {
        let sequence = self.counters.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let shade = (sequence % 255) as u8;

        let mut rgba = Vec::with_capacity((self.width * self.height * 4) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                rgba.extend_from_slice(&[(x * 255 / self.width) as u8, (y * 255 / self.height) as u8, shade, 255]);
            }
        }

        Frame::new(self.device_id.clone(), self.width, self.height, captured_at_ms, rgba)
            .map_err(|error| CaptureError::Backend(error.to_string()))
    }

    fn stop_tracks(self: Box<Self>) {
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Capture layer error type.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// User or OS refused camera access.
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    /// No usable camera.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    /// Another stream already holds the camera.
    #[error("camera is already in use")]
    Busy,
    /// Operation needs the live preview.
    #[error("live preview is not showing")]
    NotPreviewing,
    /// Operation needs a frozen still.
    #[error("no captured still to discard")]
    NotFrozen,
    /// The owning view was torn down.
    #[error("capture controller torn down")]
    TornDown,
    /// JPEG encoding failed.
    #[error("snapshot encode failure: {0}")]
    Encode(String),
    /// Stream backend failure.
    #[error("capture backend failure: {0}")]
    Backend(String),
}

impl CaptureError {
    /// Returns `true` for permission/availability failures.
    pub fn is_device_access_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_) | Self::DeviceUnavailable(_) | Self::Busy
        )
    }

    /// Alert text for this error.
    pub fn user_message(&self) -> String {
        if self.is_device_access_error() {
            CAMERA_ACCESS_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the capture state machine.

    use super::*;

    fn controller() -> (CaptureController, Arc<SyntheticCameraDevice>) {
        let device = Arc::new(SyntheticCameraDevice::new());
        (CaptureController::new(device.clone()), device)
    }

    #[tokio::test]
    async fn start_requests_front_camera_at_720p() {
        let (mut controller, device) = controller();
        let mut urls = ObjectUrlManager::new();

        let outcome = controller.start(&mut urls).await.expect("start should succeed");
        assert_eq!(outcome, StartOutcome::Acquired);
        assert_eq!(controller.state(), &CaptureState::Previewing);
        assert_eq!(device.last_constraints(), Some(CaptureConstraints::default()));
        assert_eq!(device.open_streams(), 1);
    }

    #[tokio::test]
    async fn capture_freezes_jpeg_and_keeps_stream_warm() {
        let (mut controller, device) = controller();
        let mut urls = ObjectUrlManager::new();
        controller.start(&mut urls).await.expect("start should succeed");

        let still = controller
            .capture(&mut urls, 1_700_000_000_000)
            .await
            .expect("capture should succeed");
        assert_eq!(controller.state(), &CaptureState::Frozen);
        assert_eq!(still.image.file_name(), "camera_1700000000000.jpg");
        assert_eq!(&still.image.bytes()[..2], &[0xFF, 0xD8]);
        assert_eq!(device.open_streams(), 1);

        controller.retake(&mut urls).expect("retake should succeed");
        assert!(urls.resolve(&still.url).is_none());
        assert_eq!(controller.state(), &CaptureState::Previewing);
    }

    #[tokio::test]
    async fn restarting_while_active_does_not_reacquire() {
        let (mut controller, device) = controller();
        let mut urls = ObjectUrlManager::new();
        controller.start(&mut urls).await.expect("start should succeed");
        controller.capture(&mut urls, 1).await.expect("capture should succeed");

        let outcome = controller.start(&mut urls).await.expect("restart should succeed");
        assert_eq!(outcome, StartOutcome::Resumed);
        assert_eq!(device.acquisitions(), 1);
        assert!(urls.current(MediaSlot::Preview).is_none());
        assert_eq!(controller.state(), &CaptureState::Previewing);
    }

    #[test]
    fn capture_requires_live_preview() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime should build");
        let (mut controller, _) = controller();
        let mut urls = ObjectUrlManager::new();

        let error = runtime
            .block_on(controller.capture(&mut urls, 0))
            .expect_err("idle capture should fail");
        assert!(matches!(error, CaptureError::NotPreviewing));
        assert!(matches!(controller.retake(&mut urls), Err(CaptureError::NotFrozen)));
    }

    #[tokio::test]
    async fn drop_releases_stream() {
        let (mut controller, device) = controller();
        let mut urls = ObjectUrlManager::new();
        controller.start(&mut urls).await.expect("start should succeed");
        drop(controller);

        assert_eq!(device.open_streams(), 0);
        assert_eq!(device.releases(), 1);
    }
}
