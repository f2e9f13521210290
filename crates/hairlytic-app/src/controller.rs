//! Detection workflow controller: the composition root that owns every piece
//! of client state and sequences user events against the backend.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hairlytic_api::{ApiClient, ApiError};
use hairlytic_auth::{AuthError, Credentials, SessionController};
use hairlytic_capture::{CaptureController, CaptureDevice, CaptureState, StartOutcome};
use hairlytic_core::{ConfidenceThreshold, ImageFile, Session};
use hairlytic_history::{
    EMPTY_HISTORY_TEXT, HistoryDetail, HistoryImageFetchError, HistoryLoadError,
    HistoryVisibilityStore, image_owner,
};
use hairlytic_media::{MediaReference, MediaSlot, ObjectUrlManager};
use hairlytic_prediction_contract::{HistoryEntry, PredictionResult};
use hairlytic_storage::LocalStorage;
use hairlytic_ui::{
    AuthTab, CameraSurface, HistoryCard, InputMode, Notice, ResultPanel, UiAuthMode, UiState,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{APP_VERSION, AppError, INVALID_IMAGE_MESSAGE, now_ms, redact_sensitive};

/// Notice shown when the backend gives no detail for a failed prediction.
pub const PREDICTION_FAILED_MESSAGE: &str = "Prediction failed";
/// Notice shown after a successful registration.
pub const REGISTERED_MESSAGE: &str = "Registration successful! Please login.";
/// Delay before the results panel is scrolled into view.
pub const RESULTS_SCROLL_DELAY: Duration = Duration::from_millis(100);

/// Everything the controller needs from the outside world.
#[derive(Clone)]
pub struct AppContext {
    /// Backend client.
    pub api: ApiClient,
    /// Durable local storage.
    pub storage: Arc<dyn LocalStorage>,
    /// Camera device.
    pub camera: Arc<dyn CaptureDevice>,
    /// Camera kill switch.
    pub camera_enabled: bool,
    /// Initial slider position.
    pub default_confidence: ConfidenceThreshold,
}

/// Surface a scroll request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    /// Results panel.
    Results,
    /// Top of the page.
    Top,
}

/// Deferred scroll the renderer should perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRequest {
    /// Where to scroll.
    pub target: ScrollTarget,
    /// How long to wait first.
    pub delay: Duration,
}

/// Submission failures.
///
/// Precondition failures are raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictionError {
    /// No session.
    #[error("not signed in")]
    NotAuthenticated,
    /// Nothing to submit.
    #[error("no image selected")]
    NoImageSelected,
    /// Camera mode is showing live video instead of a still.
    #[error("capture a still before submitting")]
    PreviewNotFrozen,
    /// A submission is already outstanding.
    #[error("a prediction is already in flight")]
    AlreadySubmitting,
    /// Backend failed or refused to process the image.
    #[error("{message}")]
    Backend {
        /// HTTP status, when one was received.
        status: Option<u16>,
        /// User-facing message.
        message: String,
    },
}

/// Holds the in-flight flag for the lifetime of one submission.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns session, media, capture, history, and result state.
///
/// Every method leaves the controller interactive; failures are returned and,
/// where the user needs to see them, recorded as a [`Notice`].
pub struct AppController {
    api: ApiClient,
    session: SessionController,
    urls: ObjectUrlManager,
    capture: CaptureController,
    hidden: HistoryVisibilityStore,
    history: Vec<HistoryEntry>,
    detail: Option<HistoryDetail>,
    auth_tab: AuthTab,
    input_mode: InputMode,
    confidence: ConfidenceThreshold,
    result: Option<PredictionResult>,
    notice: Option<Notice>,
    scroll: Option<ScrollRequest>,
    in_flight: Arc<AtomicBool>,
}

impl AppController {
    /// Restores persisted state and, for a restored session, loads history.
    pub async fn launch(context: AppContext) -> Self {
        let AppContext {
            api,
            storage,
            camera,
            camera_enabled,
            default_confidence,
        } = context;

        let session = SessionController::restore(storage.clone());
        let hidden = HistoryVisibilityStore::load(storage);
        let capture = CaptureController::new(camera).with_enabled(camera_enabled);

        let mut controller = Self {
            api,
            session,
            urls: ObjectUrlManager::new(),
            capture,
            hidden,
            history: Vec::new(),
            detail: None,
            auth_tab: AuthTab::Login,
            input_mode: InputMode::Upload,
            confidence: default_confidence,
            result: None,
            notice: None,
            scroll: None,
            in_flight: Arc::new(AtomicBool::new(false)),
        };

        info!(
            stage = "app",
            action = "launch",
            version = APP_VERSION,
            authenticated = controller.session.is_authenticated(),
            hidden = controller.hidden.hidden_ids().len(),
            "controller ready"
        );
        if controller.session.is_authenticated() {
            let _ = controller.refresh_history().await;
        }
        controller
    }

    /// Signs in and loads history.
    ///
    /// # Errors
    /// Returns [`AppError::Auth`]; the message is also set as a notice.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<Session, AppError> {
        match self.session.login(&self.api, credentials).await {
            Ok(session) => {
                self.notice = None;
                let _ = self.refresh_history().await;
                Ok(session)
            }
            Err(error) => Err(self.auth_failed(error)),
        }
    }

    /// Creates an account and switches the form to the login tab.
    ///
    /// # Errors
    /// Returns [`AppError::Auth`]; the message is also set as a notice.
    pub async fn register(&mut self, credentials: &Credentials) -> Result<(), AppError> {
        match self.session.register(&self.api, credentials).await {
            Ok(()) => {
                self.notice = Some(Notice::info(REGISTERED_MESSAGE));
                self.auth_tab = AuthTab::Login;
                Ok(())
            }
            Err(error) => Err(self.auth_failed(error)),
        }
    }

    fn auth_failed(&mut self, error: AuthError) -> AppError {
        warn!(stage = "auth", action = "failed", "{}", redact_sensitive(&error.to_string()));
        self.notice = Some(Notice::error(error.user_message()));
        AppError::Auth(error)
    }

    /// Switches the auth form tab.
    pub fn set_auth_tab(&mut self, tab: AuthTab) {
        self.auth_tab = tab;
    }

    /// Clears the session and every piece of state derived from it.
    ///
    /// Hidden history ids are kept.
    pub fn logout(&mut self) {
        self.capture.stop();
        self.close_history_item();
        self.urls.clear(MediaSlot::Preview);
        self.result = None;
        self.history.clear();
        self.scroll = None;
        self.notice = None;
        self.input_mode = InputMode::Upload;
        self.auth_tab = AuthTab::Login;
        self.session.logout();
    }

    /// Re-fetches history. Failures are logged and keep the previous list.
    ///
    /// # Errors
    /// Returns [`HistoryLoadError`] for logging; callers never surface it.
    pub async fn refresh_history(&mut self) -> Result<usize, HistoryLoadError> {
        let Some(token) = self.session.session().map(|session| session.token().to_string())
        else {
            return Err(HistoryLoadError("not signed in".to_string()));
        };

        match self.api.history(&token).await {
            Ok(entries) => {
                self.history = entries;
                let visible = self.hidden.visible(&self.history).len();
                info!(stage = "history", action = "load", total = self.history.len(), visible, "history loaded");
                Ok(visible)
            }
            Err(error) => {
                let failure = HistoryLoadError(redact_sensitive(&error.to_string()));
                error!(stage = "history", action = "load", "{failure}");
                Err(failure)
            }
        }
    }

    /// Hides a history entry locally. Returns `false` when already hidden.
    ///
    /// # Errors
    /// Returns [`AppError::History`] when the hidden set could not be
    /// persisted; the entry stays hidden for this run.
    pub fn hide_history_item(&mut self, id: &str) -> Result<bool, AppError> {
        self.hidden.hide(id).map_err(|error| {
            warn!(stage = "history", action = "hide", id, "{error}");
            AppError::History(error)
        })
    }

    /// Opens the detail view of a visible history entry and fetches its image.
    ///
    /// Image failures are recorded inline on the detail view, never as a
    /// notice.
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] without a session and
    /// [`AppError::UnknownHistoryEntry`] for ids not currently visible.
    pub async fn open_history_item(&mut self, id: &str) -> Result<(), AppError> {
        let session = self.session.session().cloned().ok_or(AppError::NotAuthenticated)?;
        let entry = self
            .hidden
            .visible(&self.history)
            .into_iter()
            .find(|entry| entry.id == id)
            .cloned()
            .ok_or_else(|| AppError::UnknownHistoryEntry(id.to_string()))?;

        self.close_history_item();
        let mut detail = HistoryDetail::open(entry.clone());

        match entry.image_filename.as_deref().filter(|name| !name.trim().is_empty()) {
            None => detail.image_failed(HistoryImageFetchError::MissingReference),
            Some(image_filename) => {
                let owner = image_owner(&entry, session.username());
                match self.api.fetch_upload(session.token(), owner, image_filename).await {
                    Ok(image) => {
                        let reference = self.urls.set(MediaSlot::HistoryImage, image);
                        detail.image_loaded(reference.url);
                    }
                    Err(error) => {
                        warn!(stage = "history", action = "fetch_image", id, "{error}");
                        detail.image_failed(HistoryImageFetchError::Unavailable);
                    }
                }
            }
        }

        self.detail = Some(detail);
        Ok(())
    }

    /// Closes the detail view and releases its image URL.
    pub fn close_history_item(&mut self) {
        self.detail = None;
        self.urls.clear(MediaSlot::HistoryImage);
    }

    /// Moves the confidence slider. The value is snapped onto the slider grid.
    pub fn set_confidence(&mut self, value: f32) -> ConfidenceThreshold {
        self.confidence = ConfidenceThreshold::new(value);
        self.confidence
    }

    /// Installs an uploaded image as the selection and clears the result.
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] or
    /// [`AppError::WrongInputMode`] outside upload mode.
    pub fn select_file(&mut self, file: ImageFile) -> Result<MediaReference, AppError> {
        if !self.session.is_authenticated() {
            return Err(AppError::NotAuthenticated);
        }
        if self.input_mode != InputMode::Upload {
            return Err(AppError::WrongInputMode(self.input_mode));
        }

        info!(stage = "workflow", action = "select", file = file.file_name(), bytes = file.len(), "image selected");
        let reference = self.urls.set(MediaSlot::Preview, file);
        self.result = None;
        Ok(reference)
    }

    /// Sniffs raw bytes and selects them as an upload.
    ///
    /// # Errors
    /// Returns [`AppError::InvalidImage`] (with an error notice) for non-image
    /// data, otherwise as [`AppController::select_file`].
    pub fn select_file_bytes(
        &mut self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<MediaReference, AppError> {
        match ImageFile::sniffed(file_name, bytes) {
            Ok(file) => self.select_file(file),
            Err(error) => Err(self.invalid_image(error.to_string())),
        }
    }

    /// Reads a file from disk and selects it as an upload.
    ///
    /// # Errors
    /// Same as [`AppController::select_file_bytes`].
    pub fn select_file_path(&mut self, path: &Path) -> Result<MediaReference, AppError> {
        match ImageFile::from_path(path) {
            Ok(file) => self.select_file(file),
            Err(error) => Err(self.invalid_image(error.to_string())),
        }
    }

    fn invalid_image(&mut self, reason: String) -> AppError {
        warn!(stage = "workflow", action = "select", "rejected selection: {reason}");
        self.notice = Some(Notice::error(INVALID_IMAGE_MESSAGE));
        AppError::InvalidImage(reason)
    }

    /// Switches between upload and camera input.
    ///
    /// A switch is a full reset: the selection and result are dropped. Moving
    /// to camera mode starts the camera; moving away stops it.
    ///
    /// # Errors
    /// Returns the camera start failure when switching to camera mode; the
    /// mode still changes so the placeholder can offer a retry.
    pub async fn switch_input_mode(&mut self, mode: InputMode) -> Result<(), AppError> {
        if mode == self.input_mode {
            return Ok(());
        }
        info!(stage = "workflow", action = "switch_mode", from = ?self.input_mode, to = ?mode, "input mode changed");

        self.input_mode = mode;
        self.result = None;
        self.urls.clear(MediaSlot::Preview);
        match mode {
            InputMode::Upload => {
                self.capture.stop();
                Ok(())
            }
            InputMode::Camera => self.start_camera().await.map(|_| ()),
        }
    }

    /// Starts the camera, or returns an open camera to live preview.
    ///
    /// # Errors
    /// Returns [`AppError::WrongInputMode`] outside camera mode and
    /// [`AppError::Capture`] on device failure (with a notice for access
    /// failures).
    pub async fn start_camera(&mut self) -> Result<StartOutcome, AppError> {
        if self.input_mode != InputMode::Camera {
            return Err(AppError::WrongInputMode(self.input_mode));
        }

        match self.capture.start(&mut self.urls).await {
            Ok(outcome) => {
                self.result = None;
                Ok(outcome)
            }
            Err(error) => {
                if error.is_device_access_error() {
                    self.notice = Some(Notice::error(error.user_message()));
                }
                Err(AppError::Capture(error))
            }
        }
    }

    /// Freezes the live preview into a JPEG still and selects it.
    ///
    /// # Errors
    /// Returns [`AppError::Capture`] unless the live preview is showing.
    pub async fn capture_photo(&mut self) -> Result<MediaReference, AppError> {
        let reference = self.capture.capture(&mut self.urls, now_ms()).await?;
        Ok(reference)
    }

    /// Discards the still and resumes live preview.
    ///
    /// # Errors
    /// Returns [`AppError::Capture`] when no still is showing.
    pub fn retake(&mut self) -> Result<(), AppError> {
        self.capture.retake(&mut self.urls)?;
        Ok(())
    }

    /// Dismisses the pending notice. A camera denial returns to idle.
    pub fn acknowledge_notice(&mut self) {
        self.notice = None;
        self.capture.acknowledge_denied();
    }

    /// Submits the selected image at the current confidence threshold.
    ///
    /// On success the result is stored, history is refreshed, and the results
    /// panel is scheduled into view. On failure the selection is kept so the
    /// user can retry.
    ///
    /// # Errors
    /// Precondition failures return before any network call; backend
    /// failures return [`PredictionError::Backend`] and set a notice.
    pub async fn submit(&mut self) -> Result<PredictionResult, PredictionError> {
        let session = self
            .session
            .session()
            .cloned()
            .ok_or(PredictionError::NotAuthenticated)?;
        if self.input_mode == InputMode::Camera && *self.capture.state() != CaptureState::Frozen {
            return Err(PredictionError::PreviewNotFrozen);
        }
        let image = self
            .urls
            .current(MediaSlot::Preview)
            .map(|reference| reference.image)
            .ok_or(PredictionError::NoImageSelected)?;
        let guard = InFlightGuard::acquire(&self.in_flight).ok_or(PredictionError::AlreadySubmitting)?;

        info!(
            stage = "workflow",
            action = "submit",
            file = image.file_name(),
            conf = %self.confidence,
            "submitting image"
        );
        let outcome = self.api.predict(session.token(), &image, self.confidence).await;
        drop(guard);

        match outcome {
            Ok(result) => {
                info!(stage = "workflow", action = "result", status = ?result.status, "prediction received");
                self.result = Some(result.clone());
                let _ = self.refresh_history().await;
                self.scroll = Some(ScrollRequest {
                    target: ScrollTarget::Results,
                    delay: RESULTS_SCROLL_DELAY,
                });
                Ok(result)
            }
            Err(error) => {
                warn!(stage = "workflow", action = "submit", "{}", redact_sensitive(&error.to_string()));
                let message = error.user_message(PREDICTION_FAILED_MESSAGE);
                self.notice = Some(Notice::error(message.clone()));
                let status = match &error {
                    ApiError::Status { status, .. } => Some(*status),
                    _ => None,
                };
                Err(PredictionError::Backend { status, message })
            }
        }
    }

    /// Clears the result only.
    pub fn reset(&mut self) {
        self.result = None;
    }

    /// Starts over within the current mode.
    ///
    /// Camera mode returns to live preview; upload mode drops the selection.
    pub fn new_analysis(&mut self) {
        if self.input_mode == InputMode::Camera && *self.capture.state() == CaptureState::Frozen {
            if let Err(error) = self.capture.retake(&mut self.urls) {
                warn!(stage = "workflow", action = "new_analysis", "{error}");
            }
        }
        self.urls.clear(MediaSlot::Preview);
        self.result = None;
        self.scroll = Some(ScrollRequest {
            target: ScrollTarget::Top,
            delay: Duration::ZERO,
        });
    }

    /// Takes the pending scroll request, if any.
    pub fn take_scroll_request(&mut self) -> Option<ScrollRequest> {
        self.scroll.take()
    }

    /// Unmount path: cancels camera work and releases every URL.
    pub fn shutdown(&mut self) {
        self.capture.teardown();
        self.detail = None;
        self.urls.clear_all();
        info!(stage = "app", action = "shutdown", live_urls = self.urls.stats().live(), "controller shut down");
    }

    /// Projects controller state for rendering.
    pub fn ui_state(&self) -> UiState {
        let mut state = UiState::new(APP_VERSION);
        let preview = self.urls.current(MediaSlot::Preview);

        state.auth = if self.session.is_authenticated() {
            UiAuthMode::Authenticated
        } else {
            UiAuthMode::Anonymous
        };
        state.auth_tab = self.auth_tab;
        state.username = self.session.session().map(|session| session.username().to_string());
        state.input_mode = self.input_mode;
        state.camera_surface = match (self.input_mode, self.capture.state()) {
            (InputMode::Camera, CaptureState::Previewing) => CameraSurface::LiveVideo,
            (InputMode::Camera, CaptureState::Frozen) => CameraSurface::Snapshot,
            _ => CameraSurface::Placeholder,
        };
        state.preview_url = preview.as_ref().map(|reference| reference.url.to_string());
        state.has_image = preview.is_some();
        state.confidence = self.confidence.to_string();
        state.submitting = self.in_flight.load(Ordering::SeqCst);
        state.results = self.result.as_ref().map(ResultPanel::from_result);
        state.history = self
            .hidden
            .visible(&self.history)
            .into_iter()
            .map(HistoryCard::from_entry)
            .collect();
        if state.auth == UiAuthMode::Authenticated && state.history.is_empty() {
            state.history_placeholder = Some(EMPTY_HISTORY_TEXT.to_string());
        }
        state.notice = self.notice.clone();
        state
    }

    /// Active session.
    pub fn session(&self) -> Option<&Session> {
        self.session.session()
    }

    /// Current input mode.
    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    /// Current confidence threshold.
    pub fn confidence(&self) -> ConfidenceThreshold {
        self.confidence
    }

    /// Held prediction result.
    pub fn result(&self) -> Option<&PredictionResult> {
        self.result.as_ref()
    }

    /// Currently selected image.
    pub fn selected_image(&self) -> Option<MediaReference> {
        self.urls.current(MediaSlot::Preview)
    }

    /// Pending notice.
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Full fetched history, hidden entries included.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Open detail view.
    pub fn history_detail(&self) -> Option<&HistoryDetail> {
        self.detail.as_ref()
    }

    /// Object URL bookkeeping.
    pub fn urls(&self) -> &ObjectUrlManager {
        &self.urls
    }

    /// Camera state.
    pub fn capture_state(&self) -> &CaptureState {
        self.capture.state()
    }

    /// Returns `true` while the camera stream is held.
    pub fn camera_open(&self) -> bool {
        self.capture.holds_stream()
    }

    /// Token that tears down camera work when cancelled.
    pub fn capture_teardown_handle(&self) -> CancellationToken {
        self.capture.teardown_handle()
    }

    /// Shared in-flight flag, readable while a submission is suspended.
    pub fn submission_flag(&self) -> Arc<AtomicBool> {
        self.in_flight.clone()
    }
}

impl fmt::Debug for AppController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppController")
            .field("session", &self.session)
            .field("input_mode", &self.input_mode)
            .field("capture", &self.capture)
            .field("confidence", &self.confidence)
            .field("history", &self.history.len())
            .field("has_result", &self.result.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the in-flight guard.

    use super::*;

    #[test]
    fn in_flight_guard_is_exclusive_and_releases_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = InFlightGuard::acquire(&flag);
        assert!(guard.is_some());
        assert!(InFlightGuard::acquire(&flag).is_none());

        drop(guard);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(InFlightGuard::acquire(&flag).is_some());
    }
}
