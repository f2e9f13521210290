//! Tracing subscriber bootstrap for the binary.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs a global fmt subscriber filtered at `level`.
///
/// `RUST_LOG` directives win over `level` when they parse. Calling this twice
/// is harmless; the second install is ignored.
pub fn init_tracing(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_ascii_lowercase()));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}
