//! Logging Initialisation
//!
//! `TigerStyle`: Optional, idempotent, never panics.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mnemos_memory::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
//!
//! // Defaults: filter from MNEMOS_LOG, then RUST_LOG, then "info"
//! init_telemetry(&TelemetryConfig::default()).expect("telemetry init");
//!
//! // Or configure explicitly
//! let config = TelemetryConfig::builder()
//!     .filter("mnemos_memory=debug")
//!     .format(LogFormat::Json)
//!     .build();
//! init_telemetry(&config).expect("telemetry init");
//! ```
//!
//! ## Environment Variables
//!
//! - `MNEMOS_LOG` - Filter directives, preferred over `RUST_LOG`
//! - `RUST_LOG` - Filter directives

use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::constants::TELEMETRY_FILTER_DEFAULT;

/// Filter variable read before `RUST_LOG`.
pub const ENV_LOG_FILTER: &str = "MNEMOS_LOG";

/// Set once a subscriber from this module is installed.
static INSTALLED: Mutex<bool> = Mutex::new(false);

/// Telemetry initialisation errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Filter directives did not parse
    #[error("invalid log filter {filter:?}: {reason}")]
    InvalidFilter {
        /// The directives
        filter: String,
        /// Parser message
        reason: String,
    },

    /// Another global subscriber is already installed
    #[error("telemetry initialization failed: {reason}")]
    InitFailed {
        /// The reason for the failure
        reason: String,
    },
}

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Output format of the fmt subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line human readable
    #[default]
    Full,
    /// Multi-line human readable
    Pretty,
    /// Abbreviated single line
    Compact,
    /// Newline-delimited JSON
    Json,
}

/// Configuration for log output
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Explicit filter directives; `None` reads the environment
    pub filter: Option<String>,

    /// Output format
    pub format: LogFormat,

    /// Include the event target
    pub with_target: bool,

    /// Use ANSI colours
    pub with_ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: None,
            format: LogFormat::default(),
            with_target: true,
            with_ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create a new builder for `TelemetryConfig`
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::default()
    }

    /// Filter directives to use, given an environment lookup.
    fn resolve_filter<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        self.filter
            .clone()
            .or_else(|| lookup(ENV_LOG_FILTER))
            .or_else(|| lookup("RUST_LOG"))
            .filter(|directives| !directives.trim().is_empty())
            .unwrap_or_else(|| TELEMETRY_FILTER_DEFAULT.to_string())
    }
}

/// Builder for `TelemetryConfig`
#[derive(Default)]
pub struct TelemetryConfigBuilder {
    filter: Option<String>,
    format: Option<LogFormat>,
    with_target: Option<bool>,
    with_ansi: Option<bool>,
}

impl TelemetryConfigBuilder {
    /// Set explicit filter directives
    #[must_use]
    pub fn filter(mut self, directives: impl Into<String>) -> Self {
        self.filter = Some(directives.into());
        self
    }

    /// Set the output format
    #[must_use]
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Include or omit event targets
    #[must_use]
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = Some(enabled);
        self
    }

    /// Enable or disable ANSI colours
    #[must_use]
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = Some(enabled);
        self
    }

    /// Build the `TelemetryConfig`
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        let default = TelemetryConfig::default();
        TelemetryConfig {
            filter: self.filter.or(default.filter),
            format: self.format.unwrap_or(default.format),
            with_target: self.with_target.unwrap_or(default.with_target),
            with_ansi: self.with_ansi.unwrap_or(default.with_ansi),
        }
    }
}

/// Install a global fmt subscriber.
///
/// Calling this again after a successful install is a no-op.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidFilter` if the directives do not parse.
/// Returns `TelemetryError::InitFailed` if a subscriber not installed by
/// this function is already the global default.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<()> {
    let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
    if *installed {
        return Ok(());
    }

    let directives = config.resolve_filter(|var| std::env::var(var).ok());
    let filter = EnvFilter::try_new(&directives).map_err(|e| TelemetryError::InvalidFilter {
        filter: directives.clone(),
        reason: e.to_string(),
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .with_ansi(config.with_ansi);

    let result = match config.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| TelemetryError::InitFailed {
        reason: e.to_string(),
    })?;

    *installed = true;
    tracing::debug!(filter = %directives, format = ?config.format, "telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert!(config.filter.is_none());
        assert_eq!(config.format, LogFormat::Full);
        assert!(config.with_target);
    }

    #[test]
    fn test_telemetry_config_builder() {
        let config = TelemetryConfig::builder()
            .filter("mnemos_memory=debug")
            .format(LogFormat::Json)
            .with_ansi(false)
            .build();

        assert_eq!(config.filter.as_deref(), Some("mnemos_memory=debug"));
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.with_ansi);
    }

    #[test]
    fn test_filter_resolution_order() {
        let explicit = TelemetryConfig::builder().filter("warn").build();
        assert_eq!(explicit.resolve_filter(|_| Some("trace".to_string())), "warn");

        let env = TelemetryConfig::default();
        let lookup = |var: &str| match var {
            ENV_LOG_FILTER => Some("debug".to_string()),
            "RUST_LOG" => Some("trace".to_string()),
            _ => None,
        };
        assert_eq!(env.resolve_filter(lookup), "debug");
        assert_eq!(
            env.resolve_filter(|var| (var == "RUST_LOG").then(|| "trace".to_string())),
            "trace"
        );
        assert_eq!(env.resolve_filter(|_| None), TELEMETRY_FILTER_DEFAULT);
    }

    #[test]
    fn test_invalid_filter_is_error() {
        let config = TelemetryConfig::builder().filter("mnemos_memory=notalevel").build();
        let result = init_telemetry(&config);
        assert!(matches!(
            result,
            Err(TelemetryError::InvalidFilter { .. }) | Ok(())
        ));
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = TelemetryConfig::builder().with_ansi(false).build();
        let first = init_telemetry(&config);
        // A foreign subscriber may already be installed in this process
        if first.is_ok() {
            assert!(init_telemetry(&config).is_ok());
        }
    }
}
