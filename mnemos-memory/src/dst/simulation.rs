//! Simulation - DST Test Harness
//!
//! `TigerStyle`: Simulation harness that provides a deterministic environment.

use std::future::Future;
use std::sync::Arc;

use super::clock::SimClock;
use super::config::SimConfig;
use super::fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType};
use super::rng::DeterministicRng;
use crate::config::MemoryConfig;
use crate::embedding::SimEmbeddingProvider;
use crate::provider::TieredMemoryProvider;
use crate::storage::SimStorageBackend;

/// Environment provided to simulation tests.
///
/// The storage backend and embedding provider share `faults` and `clock`,
/// so a fault registered on the [`Simulation`] reaches every component.
pub struct SimEnvironment {
    /// Simulation configuration
    pub config: SimConfig,
    /// Simulated clock
    pub clock: SimClock,
    /// Deterministic RNG for test-driven choices
    pub rng: DeterministicRng,
    /// Shared fault injector
    pub faults: Arc<FaultInjector>,
    /// Simulated storage backend
    pub storage: SimStorageBackend,
    /// Simulated embedding provider
    pub embedding: SimEmbeddingProvider,
}

impl SimEnvironment {
    /// Advance simulated time in milliseconds.
    pub fn advance_time_ms(&self, ms: u64) -> i64 {
        self.clock.advance_ms(ms)
    }

    /// Advance simulated time in whole days.
    pub fn advance_days(&self, days: u32) -> i64 {
        self.clock.advance_days(days)
    }

    /// Current simulated time in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Build a memory provider wired to this environment's storage,
    /// embedding provider and clock.
    #[must_use]
    pub fn provider(&self, config: MemoryConfig) -> TieredMemoryProvider<SimStorageBackend> {
        TieredMemoryProvider::new(Arc::new(self.storage.clone()), config)
            .with_embedding(Arc::new(self.embedding.clone()))
            .with_clock(self.clock.clone())
    }
}

/// DST simulation harness.
///
/// `TigerStyle`:
/// - Single seed controls all randomness
/// - Faults are registered explicitly
/// - Environment is handed to the test closure
pub struct Simulation {
    config: SimConfig,
    fault_configs: Vec<FaultConfig>,
    start_ms: i64,
}

impl Simulation {
    /// Create a new simulation with the given configuration.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            fault_configs: Vec::new(),
            start_ms: 0,
        }
    }

    /// Register a fault to inject during simulation.
    #[must_use]
    pub fn with_fault(mut self, fault_config: FaultConfig) -> Self {
        self.fault_configs.push(fault_config);
        self
    }

    /// Add read and write storage faults.
    #[must_use]
    pub fn with_storage_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::StorageWriteFail, probability))
            .with_fault(FaultConfig::new(FaultType::StorageReadFail, probability))
    }

    /// Add embedding timeouts and outages.
    #[must_use]
    pub fn with_embedding_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::EmbeddingTimeout, probability))
            .with_fault(FaultConfig::new(FaultType::EmbeddingUnavailable, probability))
    }

    /// Start the simulated clock at the given millisecond timestamp.
    #[must_use]
    pub fn starting_at_ms(mut self, start_ms: i64) -> Self {
        self.start_ms = start_ms;
        self
    }

    /// Build the environment without running a test.
    #[must_use]
    pub fn build(self) -> SimEnvironment {
        let mut rng = DeterministicRng::new(self.config.seed());
        let clock = SimClock::at_ms(self.start_ms);

        let mut fault_builder = FaultInjectorBuilder::new(rng.fork());
        for fault_config in self.fault_configs {
            fault_builder = fault_builder.with_fault(fault_config);
        }
        let faults = Arc::new(fault_builder.build());

        let storage =
            SimStorageBackend::with_fault_injector(Arc::clone(&faults)).with_clock(clock.clone());
        let embedding = SimEmbeddingProvider::with_faults(self.config.seed(), Arc::clone(&faults));

        SimEnvironment {
            config: self.config,
            clock,
            rng,
            faults,
            storage,
            embedding,
        }
    }

    /// Run the simulation with the given test function.
    ///
    /// # Errors
    /// Returns any error from the test function.
    pub async fn run<F, Fut, E>(self, test_fn: F) -> Result<(), E>
    where
        F: FnOnce(SimEnvironment) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let seed = self.config.seed();
        let env = self.build();
        let faults = Arc::clone(&env.faults);

        let result = test_fn(env).await;

        if faults.has_faults() {
            tracing::debug!(
                seed,
                injections = faults.total_injections(),
                "simulation finished"
            );
        }
        result
    }
}
