//! Property-Based Testing for DST
//!
//! `TigerStyle`: Random operation sequences with invariant checking.
//!
//! A [`PropertyTestable`] state generates operations from a seeded RNG,
//! applies them against a [`SimClock`], and checks its invariants after every
//! step. A failure reports the seed and the offending operation so the run
//! can be replayed exactly.

use std::fmt::Debug;

use super::clock::SimClock;
use super::rng::DeterministicRng;
use crate::constants::{DST_SIMULATION_STEPS_MAX, DST_TIME_ADVANCE_MS_MAX};

/// Systems that can be property-tested.
pub trait PropertyTestable {
    /// Operations that can be performed on the state.
    type Operation: Debug + Clone;

    /// Generate a random operation valid for the current state.
    fn generate_operation(&self, rng: &mut DeterministicRng) -> Self::Operation;

    /// Apply an operation, reading time from `clock` where needed.
    fn apply_operation(&mut self, op: &Self::Operation, clock: &SimClock);

    /// Check that all invariants hold.
    ///
    /// # Errors
    /// Returns a description of the first violated invariant.
    fn check_invariants(&self) -> Result<(), String>;

    /// Describe the current state for failure reports.
    fn describe_state(&self) -> String {
        String::from("(no state description)")
    }
}

/// Result of a property test run.
#[derive(Debug)]
pub struct PropertyTestResult {
    /// Number of operations executed
    pub operations_executed: u64,
    /// Seed used for reproduction
    pub seed: u64,
    /// Failure details, if any
    pub failure: Option<PropertyTestFailure>,
}

impl PropertyTestResult {
    /// Whether every invariant held.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Whether an invariant was violated.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// Panic with reproduction details if the run failed.
    ///
    /// # Panics
    /// Panics if the test failed.
    pub fn assert_success(self) {
        if let Some(failure) = self.failure {
            panic!(
                "property test failed\n\
                 seed: {} (replay with DST_SEED)\n\
                 operation #{}: {}\n\
                 violation: {}\n\
                 state: {}",
                self.seed,
                failure.operation_index,
                failure.operation,
                failure.message,
                failure.state_description
            );
        }
    }
}

/// Details of a property test failure.
#[derive(Debug)]
pub struct PropertyTestFailure {
    /// Index of the failing operation (0-based)
    pub operation_index: u64,
    /// Debug rendering of the failing operation
    pub operation: String,
    /// The invariant violation message
    pub message: String,
    /// Description of the state at failure
    pub state_description: String,
}

/// Time advancement between property test operations.
#[derive(Debug, Clone)]
pub struct TimeAdvanceConfig {
    /// Minimum advance per operation (ms)
    pub min_ms: u64,
    /// Maximum advance per operation (ms)
    pub max_ms: u64,
    /// Probability of advancing before an operation
    pub probability: f64,
}

impl Default for TimeAdvanceConfig {
    fn default() -> Self {
        Self {
            min_ms: 0,
            max_ms: 1_000,
            probability: 0.5,
        }
    }
}

impl TimeAdvanceConfig {
    /// Never advance time.
    #[must_use]
    pub fn none() -> Self {
        Self {
            min_ms: 0,
            max_ms: 0,
            probability: 0.0,
        }
    }

    /// Always advance by a fixed amount.
    #[must_use]
    pub fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms,
            probability: 1.0,
        }
    }

    /// Advance by a random amount in `[min_ms, max_ms]` with `probability`.
    ///
    /// # Panics
    /// Panics if the range is inverted, too large, or probability is outside [0, 1].
    #[must_use]
    pub fn random(min_ms: u64, max_ms: u64, probability: f64) -> Self {
        assert!((0.0..=1.0).contains(&probability), "probability must be in [0, 1]");
        assert!(min_ms <= max_ms, "min_ms must be <= max_ms");
        assert!(max_ms <= DST_TIME_ADVANCE_MS_MAX, "max_ms exceeds limit");
        Self {
            min_ms,
            max_ms,
            probability,
        }
    }
}

/// Property-based test runner.
///
/// `TigerStyle`:
/// - Deterministic via seed
/// - Explicit operation count limits
/// - Invariant checking after each operation
#[derive(Debug)]
pub struct PropertyTest {
    seed: u64,
    max_operations: u64,
    time_config: TimeAdvanceConfig,
    check_invariants_before: bool,
}

impl PropertyTest {
    /// Create a new property test with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            max_operations: 100,
            time_config: TimeAdvanceConfig::default(),
            check_invariants_before: true,
        }
    }

    /// Set the maximum number of operations.
    ///
    /// # Panics
    /// Panics if max exceeds `DST_SIMULATION_STEPS_MAX`.
    #[must_use]
    pub fn with_max_operations(mut self, max: u64) -> Self {
        assert!(
            max <= DST_SIMULATION_STEPS_MAX,
            "max_operations {max} exceeds DST_SIMULATION_STEPS_MAX {DST_SIMULATION_STEPS_MAX}"
        );
        self.max_operations = max;
        self
    }

    /// Configure time advancement between operations.
    #[must_use]
    pub fn with_time_advance(mut self, config: TimeAdvanceConfig) -> Self {
        self.time_config = config;
        self
    }

    /// Skip the invariant check on the initial state.
    #[must_use]
    pub fn skip_initial_invariant_check(mut self) -> Self {
        self.check_invariants_before = false;
        self
    }

    /// Run the property test.
    #[must_use]
    pub fn run<T: PropertyTestable>(self, mut state: T) -> PropertyTestResult {
        let mut rng = DeterministicRng::new(self.seed);
        let clock = SimClock::new();

        if self.check_invariants_before {
            if let Err(msg) = state.check_invariants() {
                return PropertyTestResult {
                    operations_executed: 0,
                    seed: self.seed,
                    failure: Some(PropertyTestFailure {
                        operation_index: 0,
                        operation: "(initial state)".to_string(),
                        message: format!("initial state violates invariants: {msg}"),
                        state_description: state.describe_state(),
                    }),
                };
            }
        }

        for i in 0..self.max_operations {
            self.maybe_advance(&mut rng, &clock);

            let op = state.generate_operation(&mut rng);
            state.apply_operation(&op, &clock);

            if let Err(message) = state.check_invariants() {
                return PropertyTestResult {
                    operations_executed: i + 1,
                    seed: self.seed,
                    failure: Some(PropertyTestFailure {
                        operation_index: i,
                        operation: format!("{op:?}"),
                        message,
                        state_description: state.describe_state(),
                    }),
                };
            }
        }

        PropertyTestResult {
            operations_executed: self.max_operations,
            seed: self.seed,
            failure: None,
        }
    }

    /// Run the property test, panicking on failure.
    ///
    /// # Panics
    /// Panics if any invariant is violated.
    pub fn run_and_assert<T: PropertyTestable>(self, state: T) {
        self.run(state).assert_success();
    }

    fn maybe_advance(&self, rng: &mut DeterministicRng, clock: &SimClock) {
        let config = &self.time_config;
        if config.probability <= 0.0 || !rng.next_bool(config.probability) {
            return;
        }
        let advance = if config.min_ms == config.max_ms {
            config.min_ms
        } else {
            let min = usize::try_from(config.min_ms).unwrap_or(usize::MAX);
            let max = usize::try_from(config.max_ms).unwrap_or(usize::MAX);
            rng.next_usize(min, max) as u64
        };
        clock.advance_ms(advance);
    }
}

/// Run the same property against several seeds.
///
/// # Panics
/// Panics if any run fails.
pub fn run_property_tests<T, F>(seeds: &[u64], max_operations: u64, state_factory: F)
where
    T: PropertyTestable,
    F: Fn() -> T,
{
    for &seed in seeds {
        PropertyTest::new(seed)
            .with_max_operations(max_operations)
            .run_and_assert(state_factory());
    }
}
