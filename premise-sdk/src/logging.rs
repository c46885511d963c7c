//! Logging setup for applications using the Premise SDK
//!
//! Every crate in the workspace logs through `tracing`. Nothing is printed
//! until the application installs a subscriber, either its own or one of the
//! presets here.

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingMode {
    /// No subscriber; GUI front ends own the terminal
    #[default]
    Silent,
    /// Compact stderr output
    Development,
    /// Verbose output with source locations and wire traces
    Debug,
}

impl FromStr for LoggingMode {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" | "" => Ok(LoggingMode::Silent),
            "development" | "dev" => Ok(LoggingMode::Development),
            "debug" => Ok(LoggingMode::Debug),
            other => Err(LoggingError::InvalidEnv(format!("PREMISE_LOG_MODE={}", other))),
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Initialize logging with the specified mode
///
/// Call once, early, before connecting.
///
/// # Examples
///
/// ```rust,ignore
/// use premise_sdk::logging::{init_logging, LoggingMode};
///
/// init_logging(LoggingMode::Development)?;
/// ```
///
/// # Environment Variables
///
/// - `PREMISE_LOG_LEVEL`: filter directives, e.g. `premise_stream=trace`
/// - `RUST_LOG`: used when `PREMISE_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from `PREMISE_LOG_MODE` (`silent`, `development`, `debug`)
///
/// Unset means silent; an unknown mode is an error.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("PREMISE_LOG_MODE") {
        Ok(mode) => mode.parse()?,
        Err(_) => LoggingMode::Silent,
    };
    init_logging(mode)
}

fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let (name, directives) = match std::env::var("PREMISE_LOG_LEVEL") {
        Ok(level) => ("PREMISE_LOG_LEVEL", level),
        Err(_) => match std::env::var("RUST_LOG") {
            Ok(rust_log) => ("RUST_LOG", rust_log),
            Err(_) => return Ok(EnvFilter::new(default_level)),
        },
    };

    EnvFilter::try_new(&directives)
        .map_err(|e| LoggingError::InvalidEnv(format!("{}={}: {}", name, directives, e)))
}

/// Check whether a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_mode() {
        assert!(init_logging(LoggingMode::Silent).is_ok());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("debug".parse::<LoggingMode>().unwrap(), LoggingMode::Debug);
        assert_eq!("Development".parse::<LoggingMode>().unwrap(), LoggingMode::Development);
        assert_eq!("".parse::<LoggingMode>().unwrap(), LoggingMode::Silent);
        assert!(matches!(
            "loud".parse::<LoggingMode>(),
            Err(LoggingError::InvalidEnv(_))
        ));
    }
}
