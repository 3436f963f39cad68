//! Tracing subscriber bootstrap.

use crate::error::{KeystoneError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install a global subscriber logging at `log_level` unless `RUST_LOG` says otherwise.
///
/// Fails instead of panicking when a subscriber is already installed.
pub fn init_logging(log_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .map_err(|e| KeystoneError::config(format!("Failed to initialize logging: {}", e)))
}
