//! DST - Deterministic Simulation Testing
//!
//! TigerBeetle/FoundationDB-style deterministic simulation testing.
//!
//! One seed drives every source of randomness, time only moves when the test
//! moves it, and faults are injected by name into the storage backend and
//! the embedding provider.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mnemos_memory::dst::{FaultConfig, FaultType, SimConfig, Simulation};
//!
//! #[tokio::test]
//! async fn search_degrades_to_recency() {
//!     let env = Simulation::new(SimConfig::with_seed(42))
//!         .with_fault(FaultConfig::new(FaultType::StorageReadFail, 1.0).with_filter("search"))
//!         .build();
//!     let memory = env.provider(MemoryConfig::default());
//!     // ...
//! }
//! ```
//!
//! Run with an explicit seed for reproducibility:
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

mod clock;
mod config;
mod fault;
mod property;
mod rng;
mod simulation;

pub use clock::{Clock, SimClock};
pub use config::{SimConfig, DST_SEED_ENV};
pub use fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType};
pub use property::{
    run_property_tests, PropertyTest, PropertyTestFailure, PropertyTestResult, PropertyTestable,
    TimeAdvanceConfig,
};
pub use rng::DeterministicRng;
pub use simulation::{SimEnvironment, Simulation};
