//! Structured tracing helpers.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive could not be parsed.
    #[error("invalid log filter `{directive}`: {reason}")]
    InvalidFilter {
        /// Offending directive.
        directive: String,
        /// Parser message.
        reason: String,
    },
    /// A global subscriber is already installed.
    #[error("tracing subscriber already installed")]
    AlreadyInstalled,
}

/// Builds the filter: `RUST_LOG` when set, otherwise `fallback`.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] when `fallback` is used and does
/// not parse.
pub fn env_filter(fallback: &str) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(fallback).map_err(|err| TelemetryError::InvalidFilter {
        directive: fallback.to_owned(),
        reason: err.to_string(),
    })
}

/// Installs a global fmt subscriber filtered by `RUST_LOG` or `fallback`.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init(fallback: &str) -> Result<(), TelemetryError> {
    let filter = env_filter(fallback)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInstalled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_directive() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = env_filter("forge=notalevel").unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidFilter { .. }));
    }

    #[test]
    fn second_init_reports_existing_subscriber() {
        let first = init("warn");
        let second = init("warn");
        assert!(first.is_ok() || matches!(first, Err(TelemetryError::AlreadyInstalled)));
        assert!(matches!(second, Err(TelemetryError::AlreadyInstalled)));
    }
}
