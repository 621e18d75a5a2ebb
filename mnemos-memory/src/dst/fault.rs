//! `FaultInjector` - Probabilistic Fault Injection
//!
//! `TigerStyle`: Explicit fault injection for chaos testing.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::rng::DeterministicRng;
use crate::constants::DST_FAULT_PROBABILITY_MAX;

/// Types of faults that can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    // =========================================================================
    // Storage Faults
    // =========================================================================
    /// Write operation fails
    StorageWriteFail,
    /// Read operation fails
    StorageReadFail,
    /// Delete operation fails
    StorageDeleteFail,
    /// Backend refuses connections
    StorageUnavailable,
    /// Backend answers slowly (simulated latency)
    StorageLatency,

    // =========================================================================
    // Embedding Faults
    // =========================================================================
    /// Embedding request timeout
    EmbeddingTimeout,
    /// Embedding service unavailable
    EmbeddingUnavailable,

    // =========================================================================
    // Agent Faults
    // =========================================================================
    /// A retrieval agent fails mid-query
    AgentFailure,
}

impl FaultType {
    /// Get the fault type name as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StorageWriteFail => "storage_write_fail",
            Self::StorageReadFail => "storage_read_fail",
            Self::StorageDeleteFail => "storage_delete_fail",
            Self::StorageUnavailable => "storage_unavailable",
            Self::StorageLatency => "storage_latency",
            Self::EmbeddingTimeout => "embedding_timeout",
            Self::EmbeddingUnavailable => "embedding_unavailable",
            Self::AgentFailure => "agent_failure",
        }
    }

    /// Whether this fault targets the storage backend.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::StorageWriteFail
                | Self::StorageReadFail
                | Self::StorageDeleteFail
                | Self::StorageUnavailable
                | Self::StorageLatency
        )
    }

    /// Whether this fault targets the embedding provider.
    #[must_use]
    pub fn is_embedding(&self) -> bool {
        matches!(self, Self::EmbeddingTimeout | Self::EmbeddingUnavailable)
    }
}

/// Configuration for a specific fault.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// The type of fault
    pub fault_type: FaultType,
    /// Probability of injection (0.0 to 1.0)
    pub probability: f64,
    /// Optional operation filter (substring match)
    pub operation_filter: Option<String>,
    /// Maximum number of injections (None = unlimited)
    pub max_injections: Option<u64>,
}

impl FaultConfig {
    /// Create a new fault configuration.
    ///
    /// # Panics
    /// Panics if probability is not in [0, 1].
    #[must_use]
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        assert!(
            (0.0..=DST_FAULT_PROBABILITY_MAX).contains(&probability),
            "probability must be in [0, {DST_FAULT_PROBABILITY_MAX}], got {probability}"
        );

        Self {
            fault_type,
            probability,
            operation_filter: None,
            max_injections: None,
        }
    }

    /// Only inject for operations whose name contains `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.operation_filter = Some(filter.into());
        self
    }

    /// Set maximum number of injections.
    #[must_use]
    pub fn with_max_injections(mut self, max: u64) -> Self {
        assert!(max > 0, "max_injections must be positive");
        self.max_injections = Some(max);
        self
    }
}

/// Fault injector for simulation testing.
///
/// Interior mutability lets one injector be shared via `Arc` between the
/// storage backend, the embedding provider and test doubles.
#[derive(Debug)]
pub struct FaultInjector {
    rng: Mutex<DeterministicRng>,
    configs: Vec<FaultConfig>,
    injection_counts: Mutex<HashMap<FaultType, u64>>,
}

impl FaultInjector {
    /// Create a new fault injector with the given RNG.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            configs: Vec::new(),
            injection_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Register a fault configuration.
    ///
    /// Registration must happen before sharing via Arc.
    pub fn register(&mut self, config: FaultConfig) {
        self.injection_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(config.fault_type)
            .or_insert(0);
        self.configs.push(config);
    }

    /// Check if a fault should be injected for the given operation.
    ///
    /// Returns the fault type if one should be injected, None otherwise.
    pub fn should_inject(&self, operation: &str) -> Option<FaultType> {
        self.should_inject_matching(operation, |_| true)
    }

    /// Like [`Self::should_inject`], but only considers fault types the
    /// caller can express. Configs rejected by `accept` are skipped without
    /// consuming randomness.
    pub fn should_inject_matching(
        &self,
        operation: &str,
        accept: impl Fn(FaultType) -> bool,
    ) -> Option<FaultType> {
        for config in &self.configs {
            if !accept(config.fault_type) {
                continue;
            }

            if let Some(ref filter) = config.operation_filter {
                if !operation.contains(filter.as_str()) {
                    continue;
                }
            }

            if let Some(max) = config.max_injections {
                let counts = self
                    .injection_counts
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if counts.get(&config.fault_type).copied().unwrap_or(0) >= max {
                    continue;
                }
            }

            let roll = self
                .rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .next_bool(config.probability);

            if roll {
                *self
                    .injection_counts
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(config.fault_type)
                    .or_insert(0) += 1;
                return Some(config.fault_type);
            }
        }

        None
    }

    /// Whether any fault is registered.
    #[must_use]
    pub fn has_faults(&self) -> bool {
        !self.configs.is_empty()
    }

    /// Get injection counts keyed by fault name.
    #[must_use]
    pub fn injection_stats(&self) -> HashMap<String, u64> {
        self.injection_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(fault_type, count)| (fault_type.as_str().to_string(), *count))
            .collect()
    }

    /// Get total number of injections.
    #[must_use]
    pub fn total_injections(&self) -> u64 {
        self.injection_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }
}

/// Builder for `FaultInjector`.
pub struct FaultInjectorBuilder {
    rng: DeterministicRng,
    configs: Vec<FaultConfig>,
}

impl FaultInjectorBuilder {
    /// Create a new builder with the given RNG.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng,
            configs: Vec::new(),
        }
    }

    /// Add a fault configuration.
    #[must_use]
    pub fn with_fault(mut self, config: FaultConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Add read and write storage faults.
    #[must_use]
    pub fn with_storage_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::StorageWriteFail, probability))
            .with_fault(FaultConfig::new(FaultType::StorageReadFail, probability))
    }

    /// Build the `FaultInjector`.
    #[must_use]
    pub fn build(self) -> FaultInjector {
        let mut injector = FaultInjector::new(self.rng);
        for config in self.configs {
            injector.register(config);
        }
        injector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_faults_registered() {
        let injector = FaultInjector::new(DeterministicRng::new(42));

        for _ in 0..100 {
            assert!(injector.should_inject("store").is_none());
        }
        assert!(!injector.has_faults());
    }

    #[test]
    fn test_always_inject() {
        let injector = FaultInjectorBuilder::new(DeterministicRng::new(42))
            .with_fault(FaultConfig::new(FaultType::StorageWriteFail, 1.0))
            .build();

        for _ in 0..10 {
            assert_eq!(
                injector.should_inject("store"),
                Some(FaultType::StorageWriteFail)
            );
        }
        assert_eq!(injector.total_injections(), 10);
    }

    #[test]
    fn test_operation_filter() {
        let injector = FaultInjectorBuilder::new(DeterministicRng::new(42))
            .with_fault(FaultConfig::new(FaultType::StorageReadFail, 1.0).with_filter("search"))
            .build();

        assert!(injector.should_inject("retrieve:recent").is_none());
        assert_eq!(
            injector.should_inject("search"),
            Some(FaultType::StorageReadFail)
        );
    }

    #[test]
    fn test_matching_skips_foreign_faults() {
        let injector = FaultInjectorBuilder::new(DeterministicRng::new(42))
            .with_fault(FaultConfig::new(FaultType::EmbeddingUnavailable, 1.0))
            .build();

        assert!(injector
            .should_inject_matching("store", |f| f.is_storage())
            .is_none());
        assert_eq!(
            injector.should_inject_matching("embed", |f| f.is_embedding()),
            Some(FaultType::EmbeddingUnavailable)
        );
    }

    #[test]
    fn test_max_injections() {
        let injector = FaultInjectorBuilder::new(DeterministicRng::new(42))
            .with_fault(FaultConfig::new(FaultType::StorageWriteFail, 1.0).with_max_injections(2))
            .build();

        assert!(injector.should_inject("store").is_some());
        assert!(injector.should_inject("store").is_some());
        assert!(injector.should_inject("store").is_none());
        assert_eq!(injector.injection_stats()["storage_write_fail"], 2);
    }

    #[test]
    #[should_panic(expected = "probability must be in")]
    fn test_invalid_probability() {
        let _ = FaultConfig::new(FaultType::StorageWriteFail, 1.5);
    }
}
