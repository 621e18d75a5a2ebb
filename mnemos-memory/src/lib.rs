//! # Mnemos Memory
//!
//! Tiered memory and multi-agent retrieval for AI agents, built for
//! deterministic simulation testing.
//!
//! ## Features
//!
//! - **Tiered Storage**: Bounded working memory with attention decay, then
//!   episodic, semantic and procedural tiers driven by consolidation rules
//! - **Graceful Degradation**: Backend and embedding failures fall back to
//!   recency or keyword retrieval instead of failing the caller
//! - **Context-Aware Ranking**: Situational fingerprints boost memories
//!   formed under similar conditions
//! - **Multi-Agent Retrieval**: Social, knowledge and experience agents run
//!   concurrently and their results are synthesised with weighted learning
//! - **Deterministic Testing**: Seeded simulation of clocks, storage,
//!   embeddings and faults
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use mnemos_memory::{MemoryConfig, MemoryRecord, MemoryType, TieredMemoryProvider};
//! use mnemos_memory::dst::SimConfig;
//! use mnemos_memory::storage::SimStorageBackend;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(SimStorageBackend::new(SimConfig::with_seed(42)));
//! let memory = TieredMemoryProvider::new(storage, MemoryConfig::default());
//!
//! let record = MemoryRecord::builder("agent-1", MemoryType::Fact, "Rust has no GC").build();
//! memory.store("agent-1", record).await?;
//!
//! let recent = memory.retrieve("agent-1", "recent", 10).await?;
//! assert_eq!(recent.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │   MemoryOrchestrator  (social │ knowledge │ experience)  │
//! ├─────────────────────────────────────────────────────────┤
//! │   TieredMemoryProvider                                  │
//! │     Working memory (per agent, capacity + decay)        │
//! │     Consolidation engine │ Context-aware ranker         │
//! ├─────────────────────────────────────────────────────────┤
//! │   GatedBackend (permits + timeouts)                     │
//! │   StorageBackend │ EmbeddingProvider                    │
//! ├─────────────────────────────────────────────────────────┤
//! │   DST Framework            │ Fault injection + sim clock│
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! - [`TieredMemoryProvider`] - Public memory surface over a backend
//! - [`MemoryOrchestrator`] - Fans a query out to the retrieval agents
//! - [`ContextAwareRanker`](context::ContextAwareRanker) - Fingerprint-based boosts
//! - [`MaintenanceScheduler`](maintenance::MaintenanceScheduler) - Periodic consolidation and archival
//!
//! ## Simulation-First Testing
//!
//! ```rust
//! use mnemos_memory::dst::{FaultConfig, FaultType, SimConfig, Simulation};
//! use mnemos_memory::MemoryConfig;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let env = Simulation::new(SimConfig::with_seed(42))
//!     .with_fault(FaultConfig::new(FaultType::StorageReadFail, 1.0).with_filter("search"))
//!     .build();
//! let memory = env.provider(MemoryConfig::default());
//! // Searches now degrade to recency retrieval
//! # let _ = memory;
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agents;
pub mod config;
pub mod consolidation;
pub mod constants;
pub mod context;
pub mod dst;
pub mod embedding;
pub mod error;
pub mod maintenance;
pub mod memory;
pub mod orchestration;
pub mod provider;
pub mod storage;
pub mod telemetry;
pub mod tier;

// Re-export common types
pub use agents::{
    AgentError, AgentKind, ExperienceAgent, KnowledgeAgent, MemoryAgent, RetrievalContext,
    SocialAgent,
};
pub use config::{ConfigError, MemoryConfig};
pub use consolidation::{ConsolidationEngine, ConsolidationReport, SmartConsolidationReport};
pub use context::{ContextFingerprint, ExecutionContext};
pub use dst::{FaultConfig, FaultType, SimClock, SimConfig, SimEnvironment, Simulation};
pub use embedding::{EmbeddingError, EmbeddingProvider, SimEmbeddingProvider};
pub use error::{MemoryError, MemoryResult};
pub use maintenance::{MaintenanceHandle, MaintenanceReport, MaintenanceScheduler};
pub use memory::{WorkingMemoryItem, WorkingMemoryStore};
pub use orchestration::{MemoryOrchestrator, OrchestratedResult};
pub use provider::{MemoryStats, RetrievalOutcome, RetrievalReason, TieredMemoryProvider};
pub use storage::{
    GatedBackend, MemoryRecord, MemoryType, SimStorageBackend, StorageBackend, StorageError,
};
pub use telemetry::{init_telemetry, TelemetryConfig};
pub use tier::{TierKind, TierRegistry};
