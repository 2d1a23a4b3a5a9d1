//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Configure log level from config, CLI or `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Output goes to stderr: stdout may be the HTTP channel
//! - `RUST_LOG` wins over the configured level when set

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global subscriber. `level_override` (from the command line)
/// replaces the configured level.
pub fn init_logging(
    config: &ObservabilityConfig,
    level_override: Option<&str>,
) -> Result<(), TryInitError> {
    let level = level_override.unwrap_or(config.log_level.as_str());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(config.ansi),
        )
        .try_init()
}
