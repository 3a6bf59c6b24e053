//! Tracing initialization
//! Structured logging with env-filter level control and optional JSON
//! output for log shipping.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level so operators
/// can raise verbosity per-module without a restart config change.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    match config.format {
        LogFormat::Json => {
            fmt()
                .with_env_filter(filter)
                .json()
                .with_current_span(true)
                .with_target(true)
                .init();
        }
        LogFormat::Plain => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}
