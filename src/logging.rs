//! Process-wide log subscriber for the server binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{CorridorError, CorridorResult};

/// Installs a `tracing` subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (for example `"info"`) when the variable is unset or
/// invalid.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(default_filter: &str) -> CorridorResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| CorridorError::internal(format!("failed to install log subscriber: {e}")))
}
