//! Storage Backend Trait
//!
//! `TigerStyle`: Abstract interface for agent-scoped memory storage.
//!
//! # Simulation-First
//!
//! Tests are written against `SimStorageBackend`. Real persistence backends
//! (relational or vector stores) implement the same contract outside this
//! crate.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::StorageResult;
use super::record::MemoryRecord;

/// Per-agent record counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    /// Total records for the agent
    pub total: usize,
    /// Counts keyed by memory type name
    pub by_type: BTreeMap<String, usize>,
    /// Counts keyed by tier name (`untiered` when absent)
    pub by_tier: BTreeMap<String, usize>,
}

/// Coarse health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Fully operational
    Healthy,
    /// Operational with reduced capability
    Degraded,
    /// Not operational
    Unhealthy,
}

/// Result of a health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall state
    pub status: HealthState,
    /// Free-form diagnostic details
    pub details: BTreeMap<String, String>,
}

impl HealthStatus {
    /// Healthy status without details.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            status: HealthState::Healthy,
            details: BTreeMap::new(),
        }
    }

    /// Unhealthy status with a reason.
    #[must_use]
    pub fn unhealthy(reason: impl Into<String>) -> Self {
        let mut details = BTreeMap::new();
        details.insert("reason".to_string(), reason.into());
        Self {
            status: HealthState::Unhealthy,
            details,
        }
    }

    /// Add a detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }
}

/// Abstract storage backend for memory records.
///
/// Records are keyed by `(agent_id, record.id)`. Storing an existing key
/// replaces the previous row, which is what makes a tier move a single write.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store or replace a record. Returns the record id.
    async fn store(&self, agent_id: &str, record: &MemoryRecord) -> StorageResult<String>;

    /// Get one record by id.
    async fn get(&self, agent_id: &str, id: &str) -> StorageResult<Option<MemoryRecord>>;

    /// Retrieve records for a query.
    ///
    /// `query` is interpreted by [`super::RetrievalQuery::parse`].
    async fn retrieve(
        &self,
        agent_id: &str,
        query: &str,
        limit: usize,
    ) -> StorageResult<Vec<MemoryRecord>>;

    /// Nearest records to an embedding, most similar first.
    async fn search(
        &self,
        agent_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> StorageResult<Vec<MemoryRecord>>;

    /// Delete one record. Returns true if it existed.
    async fn delete(&self, agent_id: &str, id: &str) -> StorageResult<bool>;

    /// Delete all records of an agent. Returns the number removed.
    async fn clear(&self, agent_id: &str) -> StorageResult<usize>;

    /// Record counts for an agent.
    async fn get_stats(&self, agent_id: &str) -> StorageResult<StorageStats>;

    /// Remove expired records and non-consolidated records older than the
    /// retention window. Returns the number removed.
    async fn cleanup(&self, agent_id: &str, retention_days: u32) -> StorageResult<usize>;

    /// Probe backend health.
    async fn health_check(&self) -> StorageResult<HealthStatus>;
}
