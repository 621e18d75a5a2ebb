//! Memory Configuration
//!
//! `TigerStyle`: Sensible defaults, builder pattern, explicit over implicit.
//!
//! Durations are carried as milliseconds so the config round-trips through
//! JSON unchanged. Environment overrides use the `MNEMOS_` prefix.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    BACKEND_ACQUIRE_TIMEOUT_MS_DEFAULT, BACKEND_PERMITS_COUNT_DEFAULT, BACKEND_TIMEOUT_MS_DEFAULT,
    CONSOLIDATION_SIMILARITY_THRESHOLD_DEFAULT, CONTEXT_RANKING_WEIGHT_DEFAULT,
    MAINTENANCE_INTERVAL_MS_DEFAULT, RETENTION_DAYS_DEFAULT, WORKING_MEMORY_CAPACITY_COUNT_DEFAULT,
    WORKING_MEMORY_DECAY_RATE_DEFAULT,
};

/// Environment variable overriding working memory capacity.
pub const ENV_WORKING_CAPACITY: &str = "MNEMOS_WORKING_CAPACITY";
/// Environment variable overriding the working memory decay rate.
pub const ENV_WORKING_DECAY_RATE: &str = "MNEMOS_WORKING_DECAY_RATE";
/// Environment variable overriding the per-call backend timeout.
pub const ENV_BACKEND_TIMEOUT_MS: &str = "MNEMOS_BACKEND_TIMEOUT_MS";
/// Environment variable overriding the backend permit count.
pub const ENV_BACKEND_PERMITS: &str = "MNEMOS_BACKEND_PERMITS";
/// Environment variable overriding the retention window.
pub const ENV_RETENTION_DAYS: &str = "MNEMOS_RETENTION_DAYS";
/// Environment variable overriding the context ranking weight.
pub const ENV_CONTEXT_WEIGHT: &str = "MNEMOS_CONTEXT_WEIGHT";
/// Environment variable overriding the maintenance interval.
pub const ENV_MAINTENANCE_INTERVAL_MS: &str = "MNEMOS_MAINTENANCE_INTERVAL_MS";
/// Environment variable bounding each orchestrated agent.
pub const ENV_AGENT_TIMEOUT_MS: &str = "MNEMOS_AGENT_TIMEOUT_MS";

// =============================================================================
// ConfigError
// =============================================================================

/// Errors from building or loading a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field is out of range
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Why it is invalid
        reason: String,
    },

    /// An environment variable could not be parsed
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },

    /// JSON could not be parsed
    #[error("config parse error: {message}")]
    Parse {
        /// Parser message
        message: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// MemoryConfig
// =============================================================================

/// Configuration for the tiered memory provider.
///
/// # Example
///
/// ```rust
/// use mnemos_memory::config::MemoryConfig;
///
/// let config = MemoryConfig::default()
///     .with_working_capacity(9)
///     .without_embedding();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Working memory items per agent.
    ///
    /// Default: 7
    pub working_capacity: usize,

    /// Attention lost by every other item on each working memory event.
    ///
    /// Default: 0.1
    pub working_decay_rate: f64,

    /// Upper bound on one backend call once it holds a permit.
    ///
    /// Default: 5s
    pub backend_timeout_ms: u64,

    /// Upper bound on waiting for a backend permit.
    ///
    /// Default: 1s
    pub backend_acquire_timeout_ms: u64,

    /// Concurrent backend calls allowed.
    ///
    /// Default: 16
    pub backend_permits: usize,

    /// Age after which non-consolidated records are archived.
    ///
    /// Default: 90 days
    pub retention_days: u32,

    /// Blend weight of context similarity in contextual ranking.
    ///
    /// Default: 0.3
    pub context_weight: f64,

    /// Period of background maintenance.
    ///
    /// Default: 5 minutes
    pub maintenance_interval_ms: u64,

    /// Fingerprint similarity needed to merge records in smart consolidation.
    ///
    /// Default: 0.7
    pub consolidation_similarity_threshold: f64,

    /// Whether `store` computes an embedding when a provider is attached.
    ///
    /// Default: true
    pub embed_on_store: bool,

    /// Per-agent bound in orchestrated retrieval; `None` waits for every agent.
    ///
    /// Default: none
    pub agent_timeout_ms: Option<u64>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            working_capacity: WORKING_MEMORY_CAPACITY_COUNT_DEFAULT,
            working_decay_rate: WORKING_MEMORY_DECAY_RATE_DEFAULT,
            backend_timeout_ms: BACKEND_TIMEOUT_MS_DEFAULT,
            backend_acquire_timeout_ms: BACKEND_ACQUIRE_TIMEOUT_MS_DEFAULT,
            backend_permits: BACKEND_PERMITS_COUNT_DEFAULT,
            retention_days: RETENTION_DAYS_DEFAULT,
            context_weight: CONTEXT_RANKING_WEIGHT_DEFAULT,
            maintenance_interval_ms: MAINTENANCE_INTERVAL_MS_DEFAULT,
            consolidation_similarity_threshold: CONSOLIDATION_SIMILARITY_THRESHOLD_DEFAULT,
            embed_on_store: true,
            agent_timeout_ms: None,
        }
    }
}

impl MemoryConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with `MNEMOS_*` environment overrides applied.
    ///
    /// # Errors
    /// Returns `ConfigError` if a variable is unparsable or the result is
    /// out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env_with(|var| std::env::var(var).ok())
    }

    /// Apply overrides from a variable lookup, then validate.
    ///
    /// # Errors
    /// Returns `ConfigError` if a value is unparsable or the result is out
    /// of range.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(
            lookup: &dyn Fn(&str) -> Option<String>,
            var: &'static str,
        ) -> Result<Option<T>, ConfigError> {
            match lookup(var) {
                None => Ok(None),
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidEnv { var, value: raw }),
            }
        }

        if let Some(v) = parse(&lookup, ENV_WORKING_CAPACITY)? {
            self.working_capacity = v;
        }
        if let Some(v) = parse(&lookup, ENV_WORKING_DECAY_RATE)? {
            self.working_decay_rate = v;
        }
        if let Some(v) = parse(&lookup, ENV_BACKEND_TIMEOUT_MS)? {
            self.backend_timeout_ms = v;
        }
        if let Some(v) = parse(&lookup, ENV_BACKEND_PERMITS)? {
            self.backend_permits = v;
        }
        if let Some(v) = parse(&lookup, ENV_RETENTION_DAYS)? {
            self.retention_days = v;
        }
        if let Some(v) = parse(&lookup, ENV_CONTEXT_WEIGHT)? {
            self.context_weight = v;
        }
        if let Some(v) = parse(&lookup, ENV_MAINTENANCE_INTERVAL_MS)? {
            self.maintenance_interval_ms = v;
        }
        if let Some(v) = parse(&lookup, ENV_AGENT_TIMEOUT_MS)? {
            self.agent_timeout_ms = Some(v);
        }

        self.validate()?;
        Ok(self)
    }

    /// Parse and validate a JSON config; missing fields take defaults.
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` on malformed JSON, or a validation error.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field is in range.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` for the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.working_capacity == 0 {
            return Err(ConfigError::invalid("working_capacity", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.working_decay_rate) {
            return Err(ConfigError::invalid("working_decay_rate", "must be in [0, 1]"));
        }
        if self.backend_timeout_ms == 0 {
            return Err(ConfigError::invalid("backend_timeout_ms", "must be positive"));
        }
        if self.backend_acquire_timeout_ms == 0 {
            return Err(ConfigError::invalid("backend_acquire_timeout_ms", "must be positive"));
        }
        if self.backend_permits == 0 {
            return Err(ConfigError::invalid("backend_permits", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.context_weight) {
            return Err(ConfigError::invalid("context_weight", "must be in [0, 1]"));
        }
        if self.maintenance_interval_ms == 0 {
            return Err(ConfigError::invalid("maintenance_interval_ms", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.consolidation_similarity_threshold) {
            return Err(ConfigError::invalid(
                "consolidation_similarity_threshold",
                "must be in [0, 1]",
            ));
        }
        if self.agent_timeout_ms == Some(0) {
            return Err(ConfigError::invalid("agent_timeout_ms", "must be positive"));
        }
        Ok(())
    }

    /// Per-call backend timeout.
    #[must_use]
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    /// Backend permit wait bound.
    #[must_use]
    pub fn backend_acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_acquire_timeout_ms)
    }

    /// Background maintenance period.
    #[must_use]
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_millis(self.maintenance_interval_ms)
    }

    /// Orchestrated per-agent bound, if any.
    #[must_use]
    pub fn agent_timeout(&self) -> Option<Duration> {
        self.agent_timeout_ms.map(Duration::from_millis)
    }

    /// Set working memory capacity.
    ///
    /// # Panics
    /// Panics if capacity is zero.
    #[must_use]
    pub fn with_working_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "working capacity must be positive");
        self.working_capacity = capacity;
        self
    }

    /// Set the working memory decay rate.
    ///
    /// # Panics
    /// Panics if the rate is outside [0, 1].
    #[must_use]
    pub fn with_working_decay_rate(mut self, rate: f64) -> Self {
        assert!((0.0..=1.0).contains(&rate), "decay rate must be in [0, 1]");
        self.working_decay_rate = rate;
        self
    }

    /// Set the per-call backend timeout.
    ///
    /// # Panics
    /// Panics if the timeout is zero.
    #[must_use]
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        assert!(!timeout.is_zero(), "backend timeout must be positive");
        self.backend_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set how many backend calls may run at once, and how long to wait for
    /// a slot.
    ///
    /// # Panics
    /// Panics if either argument is zero.
    #[must_use]
    pub fn with_backend_permits(mut self, permits: usize, acquire_timeout: Duration) -> Self {
        assert!(permits > 0, "backend permits must be positive");
        assert!(!acquire_timeout.is_zero(), "acquire timeout must be positive");
        self.backend_permits = permits;
        self.backend_acquire_timeout_ms =
            u64::try_from(acquire_timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the retention window.
    #[must_use]
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Set the context ranking weight.
    ///
    /// # Panics
    /// Panics if the weight is outside [0, 1].
    #[must_use]
    pub fn with_context_weight(mut self, weight: f64) -> Self {
        assert!((0.0..=1.0).contains(&weight), "context weight must be in [0, 1]");
        self.context_weight = weight;
        self
    }

    /// Set the maintenance interval.
    ///
    /// # Panics
    /// Panics if the interval is zero.
    #[must_use]
    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "maintenance interval must be positive");
        self.maintenance_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the smart consolidation merge threshold.
    ///
    /// # Panics
    /// Panics if the threshold is outside [0, 1].
    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        assert!((0.0..=1.0).contains(&threshold), "threshold must be in [0, 1]");
        self.consolidation_similarity_threshold = threshold;
        self
    }

    /// Bound each orchestrated agent.
    ///
    /// # Panics
    /// Panics if the timeout is zero.
    #[must_use]
    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        assert!(!timeout.is_zero(), "agent timeout must be positive");
        self.agent_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Store records without computing embeddings.
    #[must_use]
    pub fn without_embedding(mut self) -> Self {
        self.embed_on_store = false;
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
