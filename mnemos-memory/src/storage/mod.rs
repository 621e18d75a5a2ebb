//! Storage - Backend Trait and Simulation Backend
//!
//! `TigerStyle`: Abstract storage with simulation-first testing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               StorageBackend Trait           │
//! └──────────────────────────────────────────────┘
//!          ↑                          ↑
//! ┌────────┴────────┐      ┌──────────┴─────────┐
//! │SimStorageBackend│      │ external backends  │
//! │   (testing)     │      │ (relational/vector)│
//! └─────────────────┘      └────────────────────┘
//! ```
//!
//! The provider reaches any backend through [`GatedBackend`], which bounds
//! concurrency and per-call latency.

mod backend;
mod error;
mod gate;
mod query;
mod record;
mod sim;

pub use backend::{HealthState, HealthStatus, StorageBackend, StorageStats};
pub use error::{StorageError, StorageResult};
pub use gate::GatedBackend;
pub use query::{significant_tokens, RetrievalQuery};
pub use record::{DurationClass, MemoryRecord, MemoryRecordBuilder, MemoryType, RecordMetadata};
pub use sim::SimStorageBackend;
