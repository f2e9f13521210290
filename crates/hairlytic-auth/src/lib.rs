#![warn(missing_docs)]
//! # hairlytic-auth
//!
//! ## Purpose
//! Implements the session lifecycle: credential exchange, durable session
//! persistence, and logout.
//!
//! ## Responsibilities
//! - Validate credentials locally before any network call.
//! - Exchange credentials for a bearer token through [`ApiClient`].
//! - Persist `{token, username}` and restore it on startup.
//! - Wipe every persisted client key on logout.
//! - Model the anonymous/authenticated transition that gates every other
//!   component.
//!
//! ## Data flow
//! Auth form collects [`Credentials`] -> [`SessionController::login`] ->
//! [`ApiClient::login`] -> [`Session`] -> [`AuthStateMachine`] + storage.
//!
//! ## Ownership and lifetimes
//! The controller owns its state machine and shares the storage handle with
//! the rest of the composition root.
//!
//! ## Error model
//! Failed logins and registrations return [`AuthError`] and never mutate the
//! session. Storage write failures are logged; they do not undo an accepted
//! login and never block logout.
//!
//! ## Security and privacy notes
//! This crate does not log credentials or token values.
//!
//! ## Example
//! ```rust
//! use hairlytic_auth::{AuthState, AuthStateMachine};
//!
//! let machine = AuthStateMachine::new();
//! assert!(matches!(machine.state(), AuthState::Anonymous));
//! ```

use std::fmt;
use std::sync::Arc;

use hairlytic_api::{ApiClient, ApiError};
use hairlytic_core::Session;
use hairlytic_storage::{HIDDEN_IDS_KEY, LocalStorage, TOKEN_KEY, USERNAME_KEY};
use thiserror::Error;
use tracing::{info, warn};

/// Fallback text when the backend gives no detail.
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed";

/// User-provided credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account username.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials from form input.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn validate(&self) -> Result<(), AuthError> {
        if self.username.trim().is_empty() || self.password.trim().is_empty() {
            return Err(AuthError::EmptyCredential);
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Runtime authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No session; the auth form is shown.
    Anonymous,
    /// Valid session.
    Authenticated(Session),
}

/// Auth state machine with explicit legal transitions.
#[derive(Debug, Clone)]
pub struct AuthStateMachine {
    state: AuthState,
}

impl AuthStateMachine {
    /// Creates a new state machine in `Anonymous` state.
    pub fn new() -> Self {
        Self {
            state: AuthState::Anonymous,
        }
    }

    /// Returns current auth state snapshot.
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Applies login success transition.
    pub fn on_login_success(&mut self, session: Session) {
        self.state = AuthState::Authenticated(session);
    }

    /// Explicit logout transition.
    pub fn logout(&mut self) {
        self.state = AuthState::Anonymous;
    }

    /// Returns the active session, if any.
    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            AuthState::Authenticated(session) => Some(session),
            AuthState::Anonymous => None,
        }
    }
}

impl Default for AuthStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the session and its durable copy.
pub struct SessionController {
    machine: AuthStateMachine,
    storage: Arc<dyn LocalStorage>,
}

impl SessionController {
    /// Restores the persisted session, if a complete one exists.
    ///
    /// A half-present pair (token without username or the reverse) violates
    /// the session invariant; both keys are cleared and the user starts
    /// anonymous.
    pub fn restore(storage: Arc<dyn LocalStorage>) -> Self {
        let mut machine = AuthStateMachine::new();
        let token = storage.get(TOKEN_KEY);
        let username = storage.get(USERNAME_KEY);

        match (token, username) {
            (Some(token), Some(username)) => match Session::new(token, username) {
                Ok(session) => {
                    info!(stage = "auth", action = "restore", username = session.username(), "restored session");
                    machine.on_login_success(session);
                }
                Err(_) => clear_persisted(storage.as_ref()),
            },
            (None, None) => {}
            _ => {
                warn!(stage = "auth", action = "restore", "discarding incomplete persisted session");
                clear_persisted(storage.as_ref());
            }
        }

        Self { machine, storage }
    }

    /// Returns current auth state.
    pub fn state(&self) -> &AuthState {
        self.machine.state()
    }

    /// Returns the active session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.machine.session()
    }

    /// Returns `true` when a session is active.
    pub fn is_authenticated(&self) -> bool {
        self.machine.session().is_some()
    }

    /// Exchanges credentials for a session and persists it.
    ///
    /// # Errors
    /// Returns [`AuthError::EmptyCredential`] without a network call for blank
    /// input, and [`AuthError::Rejected`] / [`AuthError::Transport`] for
    /// backend failures. The current state is untouched on error.
    pub async fn login(
        &mut self,
        api: &ApiClient,
        credentials: &Credentials,
    ) -> Result<Session, AuthError> {
        credentials.validate()?;

        let response = api
            .login(&credentials.username, &credentials.password)
            .await
            .map_err(AuthError::from_api)?;
        let session = Session::new(response.access_token, credentials.username.clone())
            .map_err(|error| AuthError::InvalidResponse(error.to_string()))?;

        for (key, value) in [(TOKEN_KEY, session.token()), (USERNAME_KEY, session.username())] {
            if let Err(error) = self.storage.set(key, value) {
                warn!(stage = "auth", action = "persist", key, "session not persisted: {error}");
            }
        }

        info!(stage = "auth", action = "login", username = session.username(), "login succeeded");
        self.machine.on_login_success(session.clone());
        Ok(session)
    }

    /// Creates an account. Does not log in.
    ///
    /// # Errors
    /// Same classification as [`SessionController::login`].
    pub async fn register(
        &self,
        api: &ApiClient,
        credentials: &Credentials,
    ) -> Result<(), AuthError> {
        credentials.validate()?;
        api.register(&credentials.username, &credentials.password)
            .await
            .map_err(AuthError::from_api)?;
        info!(stage = "auth", action = "register", username = %credentials.username, "account registered");
        Ok(())
    }

    /// Clears the in-memory session and every persisted client key, hidden
    /// history ids included. Always succeeds.
    pub fn logout(&mut self) {
        clear_keys(self.storage.as_ref(), &[TOKEN_KEY, USERNAME_KEY, HIDDEN_IDS_KEY]);
        self.machine.logout();
        info!(stage = "auth", action = "logout", "session cleared");
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

fn clear_persisted(storage: &dyn LocalStorage) {
    clear_keys(storage, &[TOKEN_KEY, USERNAME_KEY]);
}

fn clear_keys(storage: &dyn LocalStorage, keys: &[&'static str]) {
    for &key in keys {
        if let Err(error) = storage.remove(key) {
            warn!(stage = "auth", action = "clear", key, "persisted session key not removed: {error}");
        }
    }
}

/// Errors produced by login and registration.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credentials are missing/blank.
    #[error("username and password must be non-empty")]
    EmptyCredential,
    /// Backend refused the credentials or account.
    #[error("credentials rejected (status {status})")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Backend-provided explanation.
        detail: Option<String>,
    },
    /// Backend could not be reached or answered unexpectedly.
    #[error("auth transport failure: {0}")]
    Transport(String),
    /// Response payload violated the auth contract.
    #[error("invalid auth response: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    fn from_api(error: ApiError) -> Self {
        match error {
            ApiError::Status { status, detail } => Self::Rejected { status, detail },
            ApiError::Contract(error) => Self::InvalidResponse(error.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }

    /// Inline message for the auth form.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyCredential => "Username and password are required".to_string(),
            Self::Rejected {
                detail: Some(detail),
                ..
            } => detail.clone(),
            _ => AUTH_FAILED_MESSAGE.to_string(),
        }
    }
}
