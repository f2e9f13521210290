//! Runtime configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honoured outside of tests.

use std::path::PathBuf;

use hairlytic_api::{is_https_endpoint, is_loopback_endpoint, validate_base_url};
use hairlytic_core::ConfidenceThreshold;
use hairlytic_storage::FileStorage;
use tracing::{Level, warn};
use tracing_subscriber::EnvFilter;

/// Backend base URL variable.
pub const API_BASE_VAR: &str = "HAIRLYTIC_API_BASE";
/// Local storage file variable.
pub const STORAGE_PATH_VAR: &str = "HAIRLYTIC_STORAGE_PATH";
/// Initial confidence threshold variable.
pub const DEFAULT_CONFIDENCE_VAR: &str = "HAIRLYTIC_DEFAULT_CONFIDENCE";
/// Camera kill-switch variable.
pub const CAMERA_ENABLED_VAR: &str = "HAIRLYTIC_CAMERA_ENABLED";
/// Log level variable.
pub const LOG_LEVEL_VAR: &str = "RUST_LOG";

/// Backend base URL used when none is configured.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Variable is present but unusable.
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// All configuration loaded at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Backend base URL (`http`/`https`).
    pub api_base: String,
    /// Local storage file.
    pub storage_path: PathBuf,
    /// Initial slider position.
    pub default_confidence: ConfidenceThreshold,
    /// Fallback tracing level; a `RUST_LOG` directive string is applied by
    /// [`crate::logging::init_tracing`] on top of it.
    pub log_level: Level,
    /// Camera kill switch.
    pub camera_enabled: bool,
}

impl Config {
    /// Loads configuration from environment variables, applying defaults for
    /// anything unset.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for an unparsable URL, threshold,
    /// or log level.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let api_base = std::env::var(API_BASE_VAR).unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        validate_base_url(&api_base)
            .map_err(|error| ConfigError::InvalidValue(API_BASE_VAR.to_string(), error.to_string()))?;
        if !is_https_endpoint(&api_base) && !is_loopback_endpoint(&api_base) {
            warn!(stage = "config", action = "load", api_base = %api_base, "backend endpoint is not https");
        }

        let storage_path = std::env::var(STORAGE_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| FileStorage::default_path());

        let default_confidence = match std::env::var(DEFAULT_CONFIDENCE_VAR) {
            Ok(raw) => {
                let value = raw.trim().parse::<f32>().map_err(|_| {
                    ConfigError::InvalidValue(
                        DEFAULT_CONFIDENCE_VAR.to_string(),
                        format!("'{raw}' is not a number"),
                    )
                })?;
                let min = ConfidenceThreshold::MIN.value();
                let max = ConfidenceThreshold::MAX.value();
                if !(min..=max).contains(&value) {
                    return Err(ConfigError::InvalidValue(
                        DEFAULT_CONFIDENCE_VAR.to_string(),
                        format!("{value} is outside {min:.2}..={max:.2}"),
                    ));
                }
                ConfidenceThreshold::new(value)
            }
            Err(_) => ConfidenceThreshold::default(),
        };

        let log_level = match std::env::var(LOG_LEVEL_VAR) {
            Ok(raw) => parse_log_level(&raw)?,
            Err(_) => Level::INFO,
        };

        let camera_enabled = std::env::var(CAMERA_ENABLED_VAR)
            .map(|value| parse_switch(&value))
            .unwrap_or(true);

        Ok(Self {
            api_base,
            storage_path,
            default_confidence,
            log_level,
            camera_enabled,
        })
    }
}

/// A bare level (`debug`) sets the fallback level. Any other valid
/// `EnvFilter` directive (`info,hairlytic_app=debug`) keeps `INFO` as the
/// fallback and is left for the subscriber to apply.
fn parse_log_level(raw: &str) -> Result<Level, ConfigError> {
    if let Ok(level) = raw.trim().parse::<Level>() {
        return Ok(level);
    }
    EnvFilter::try_new(raw)
        .map(|_| Level::INFO)
        .map_err(|error| ConfigError::InvalidValue(LOG_LEVEL_VAR.to_string(), error.to_string()))
}

/// `0`, `false`, and `off` turn a switch off; anything else leaves it on.
fn parse_switch(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    !matches!(normalized.as_str(), "0" | "false" | "off")
}
