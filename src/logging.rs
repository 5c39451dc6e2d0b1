//! Log output for the command-line verifier.
//!
//! Logs go to stderr so stdout stays free for reports. `RUST_LOG` takes
//! precedence over the configured level.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogConfig;

#[derive(Debug, thiserror::Error)]
#[error("failed to initialize logging: {0}")]
pub struct LoggingError(String);

/// Level after applying `-v` flags on top of the configured level.
pub fn effective_level(configured: &str, verbose: u8) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber.
pub fn init_logging(config: &LogConfig, verbose: u8) -> Result<(), LoggingError> {
    let level = effective_level(&config.level, verbose);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.json {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr);

        subscriber
            .with(json_layer)
            .try_init()
            .map_err(|e| LoggingError(e.to_string()))
    } else {
        let text_layer = fmt::layer()
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr);

        subscriber
            .with(text_layer)
            .try_init()
            .map_err(|e| LoggingError(e.to_string()))
    }
}
