//! `SimStorageBackend` - In-Memory Storage for Testing
//!
//! `TigerStyle`: Deterministic testing with fault injection.
//!
//! Ordering is fully deterministic (ties broken by id), time comes from the
//! injected [`Clock`], and every operation consults the shared
//! [`FaultInjector`] under a stable operation name (`store`, `get`,
//! `retrieve:recent`, `retrieve:text`, `search`, `delete`, `clear`, `stats`,
//! `cleanup`, `health`).

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::backend::{HealthStatus, StorageBackend, StorageStats};
use super::error::{StorageError, StorageResult};
use super::query::{significant_tokens, RetrievalQuery};
use super::record::{DurationClass, MemoryRecord};
use crate::constants::DST_LATENCY_MS_MAX;
use crate::dst::{Clock, DeterministicRng, FaultConfig, FaultInjector, FaultType, SimConfig};
use crate::tier::TierKind;

type AgentRecords = BTreeMap<String, MemoryRecord>;

// =============================================================================
// SimStorageBackend
// =============================================================================

/// In-memory storage backend for testing.
///
/// Clones share the same records and fault injector.
#[derive(Debug, Clone)]
pub struct SimStorageBackend {
    records: Arc<RwLock<HashMap<String, AgentRecords>>>,
    fault_injector: Arc<FaultInjector>,
    clock: Clock,
    latency: Option<Duration>,
}

impl SimStorageBackend {
    /// Create a backend with its own (empty) fault injector.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let mut rng = DeterministicRng::new(config.seed());
        Self::with_fault_injector(Arc::new(FaultInjector::new(rng.fork())))
    }

    /// Create a backend sharing a simulation's fault injector.
    #[must_use]
    pub fn with_fault_injector(fault_injector: Arc<FaultInjector>) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            fault_injector,
            clock: Clock::System,
            latency: None,
        }
    }

    /// Register a fault.
    ///
    /// # Panics
    /// Panics if the fault injector is already shared.
    #[must_use]
    pub fn with_faults(mut self, config: FaultConfig) -> Self {
        match Arc::get_mut(&mut self.fault_injector) {
            Some(injector) => injector.register(config),
            None => panic!("cannot add faults after the fault injector is shared"),
        }
        self
    }

    /// Use the given clock for retention sweeps.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Into<Clock>) -> Self {
        self.clock = clock.into();
        self
    }

    /// Delay every operation by `latency`.
    ///
    /// # Panics
    /// Panics if latency exceeds `DST_LATENCY_MS_MAX`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        assert!(
            latency.as_millis() <= u128::from(DST_LATENCY_MS_MAX),
            "latency exceeds DST_LATENCY_MS_MAX"
        );
        self.latency = Some(latency);
        self
    }

    /// Get fault injector for inspection.
    #[must_use]
    pub fn fault_injector(&self) -> &Arc<FaultInjector> {
        &self.fault_injector
    }

    /// Number of records held for an agent.
    #[must_use]
    pub fn record_count(&self, agent_id: &str) -> usize {
        self.read().get(agent_id).map_or(0, BTreeMap::len)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, AgentRecords>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, AgentRecords>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply configured latency and consult the fault injector.
    async fn before_operation(&self, operation: &str, is_write: bool) -> StorageResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let fault = self
            .fault_injector
            .should_inject_matching(operation, |fault| match fault {
                FaultType::StorageWriteFail => is_write,
                FaultType::StorageReadFail => !is_write,
                FaultType::StorageDeleteFail => operation == "delete",
                FaultType::StorageUnavailable | FaultType::StorageLatency => true,
                _ => false,
            });

        match fault {
            None => Ok(()),
            Some(FaultType::StorageLatency) => {
                tokio::time::sleep(Duration::from_millis(DST_LATENCY_MS_MAX)).await;
                Ok(())
            }
            Some(FaultType::StorageUnavailable) => Err(StorageError::connection(format!(
                "backend unavailable during {operation}"
            ))),
            Some(fault_type) => Err(StorageError::simulated_fault(format!(
                "{} during {operation}",
                fault_type.as_str()
            ))),
        }
    }
}

/// Newest first, ties broken by id.
fn sort_recent(records: &mut [MemoryRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn text_matches(record: &MemoryRecord, tokens: &[String]) -> usize {
    let content = record.content.to_lowercase();
    tokens
        .iter()
        .filter(|token| {
            content.contains(token.as_str())
                || record.tags.iter().any(|tag| tag.to_lowercase().contains(token.as_str()))
        })
        .count()
}

#[async_trait]
impl StorageBackend for SimStorageBackend {
    #[tracing::instrument(skip(self, record), fields(record_id = %record.id))]
    async fn store(&self, agent_id: &str, record: &MemoryRecord) -> StorageResult<String> {
        self.before_operation("store", true).await?;
        record.validate()?;
        if record.agent_id != agent_id {
            return Err(StorageError::validation(format!(
                "record belongs to agent {}, not {agent_id}",
                record.agent_id
            )));
        }

        self.write()
            .entry(agent_id.to_string())
            .or_default()
            .insert(record.id.clone(), record.clone());

        Ok(record.id.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, agent_id: &str, id: &str) -> StorageResult<Option<MemoryRecord>> {
        self.before_operation("get", false).await?;
        Ok(self.read().get(agent_id).and_then(|records| records.get(id).cloned()))
    }

    #[tracing::instrument(skip(self), fields(query_len = query.len()))]
    async fn retrieve(
        &self,
        agent_id: &str,
        query: &str,
        limit: usize,
    ) -> StorageResult<Vec<MemoryRecord>> {
        let parsed = RetrievalQuery::parse(query);
        self.before_operation(parsed.operation_name(), false).await?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let all: Vec<MemoryRecord> = self
            .read()
            .get(agent_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();

        let mut results = match parsed {
            RetrievalQuery::Recent => {
                let mut results = all;
                sort_recent(&mut results);
                results
            }
            RetrievalQuery::Important => {
                let mut results = all;
                results.sort_by(|a, b| {
                    b.importance
                        .total_cmp(&a.importance)
                        .then_with(|| b.timestamp.cmp(&a.timestamp))
                        .then_with(|| a.id.cmp(&b.id))
                });
                results
            }
            RetrievalQuery::ShortTerm | RetrievalQuery::LongTerm => {
                let wanted = if parsed == RetrievalQuery::ShortTerm {
                    DurationClass::Short
                } else {
                    DurationClass::Long
                };
                let mut results: Vec<MemoryRecord> =
                    all.into_iter().filter(|r| r.duration == wanted).collect();
                sort_recent(&mut results);
                results
            }
            RetrievalQuery::Tier(tier) => {
                let mut results: Vec<MemoryRecord> =
                    all.into_iter().filter(|r| r.tier == Some(tier)).collect();
                sort_recent(&mut results);
                results
            }
            RetrievalQuery::Text(text) => {
                let mut tokens = significant_tokens(&text);
                if tokens.is_empty() && !text.is_empty() {
                    tokens.push(text.to_lowercase());
                }
                let mut scored: Vec<(usize, MemoryRecord)> = all
                    .into_iter()
                    .map(|r| (text_matches(&r, &tokens), r))
                    .filter(|(matches, _)| *matches > 0)
                    .collect();
                scored.sort_by(|(ma, a), (mb, b)| {
                    mb.cmp(ma)
                        .then_with(|| b.timestamp.cmp(&a.timestamp))
                        .then_with(|| a.id.cmp(&b.id))
                });
                scored.into_iter().map(|(_, r)| r).collect()
            }
        };

        results.truncate(limit);
        Ok(results)
    }

    #[tracing::instrument(skip(self, embedding), fields(dims = embedding.len()))]
    async fn search(
        &self,
        agent_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> StorageResult<Vec<MemoryRecord>> {
        self.before_operation("search", false).await?;
        if embedding.is_empty() {
            return Err(StorageError::validation("query embedding must not be empty"));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f64, MemoryRecord)> = self
            .read()
            .get(agent_id)
            .map(|records| {
                records
                    .values()
                    .filter_map(|r| {
                        let stored = r.embedding.as_deref()?;
                        (stored.len() == embedding.len())
                            .then(|| (cosine_similarity(stored, embedding), r.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        scored.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then_with(|| a.id.cmp(&b.id)));
        Ok(scored.into_iter().take(limit).map(|(_, r)| r).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, agent_id: &str, id: &str) -> StorageResult<bool> {
        self.before_operation("delete", true).await?;
        Ok(self
            .write()
            .get_mut(agent_id)
            .is_some_and(|records| records.remove(id).is_some()))
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self, agent_id: &str) -> StorageResult<usize> {
        self.before_operation("clear", true).await?;
        Ok(self.write().remove(agent_id).map_or(0, |records| records.len()))
    }

    async fn get_stats(&self, agent_id: &str) -> StorageResult<StorageStats> {
        self.before_operation("stats", false).await?;
        let guard = self.read();
        let mut stats = StorageStats::default();
        if let Some(records) = guard.get(agent_id) {
            for record in records.values() {
                stats.total += 1;
                *stats
                    .by_type
                    .entry(record.memory_type.as_str().to_string())
                    .or_insert(0) += 1;
                let tier = record.tier.map_or("untiered", |t| t.as_str());
                *stats.by_tier.entry(tier.to_string()).or_insert(0) += 1;
            }
        }
        Ok(stats)
    }

    #[tracing::instrument(skip(self))]
    async fn cleanup(&self, agent_id: &str, retention_days: u32) -> StorageResult<usize> {
        self.before_operation("cleanup", true).await?;
        let now = self.clock.now();
        let retention = f64::from(retention_days);

        let mut guard = self.write();
        let Some(records) = guard.get_mut(agent_id) else {
            return Ok(0);
        };
        let before = records.len();
        records.retain(|_, record| {
            let consolidated = matches!(
                record.tier,
                Some(TierKind::Semantic | TierKind::Procedural)
            );
            let stale = !consolidated && record.age_days(now) > retention;
            !(record.is_expired(now) || stale)
        });
        Ok(before - records.len())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.before_operation("health", false).await?;
        let guard = self.read();
        let total: usize = guard.values().map(BTreeMap::len).sum();
        Ok(HealthStatus::healthy()
            .with_detail("backend", "sim")
            .with_detail("agents", guard.len())
            .with_detail("records", total))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dst::SimClock;
    use crate::storage::{HealthState, MemoryType};
    use chrono::Duration as ChronoDuration;

    fn backend() -> SimStorageBackend {
        SimStorageBackend::new(SimConfig::with_seed(42))
    }

    fn record(id: &str, content: &str, clock: &SimClock) -> MemoryRecord {
        MemoryRecord::builder("agent", MemoryType::Experience, content)
            .id(id)
            .timestamp(clock.now())
            .build()
    }

    // =========================================================================
    // Basic CRUD Tests
    // =========================================================================

    #[tokio::test]
    async fn test_store_and_get() {
        let backend = backend();
        let clock = SimClock::new();
        backend
            .store("agent", &record("m1", "hello", &clock))
            .await
            .unwrap();

        let fetched = backend.get("agent", "m1").await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello");
        assert!(backend.get("other", "m1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_replaces_same_key() {
        let backend = backend();
        let clock = SimClock::new();
        backend.store("agent", &record("m1", "v1", &clock)).await.unwrap();
        backend.store("agent", &record("m1", "v2", &clock)).await.unwrap();

        assert_eq!(backend.record_count("agent"), 1);
        let fetched = backend.get("agent", "m1").await.unwrap().unwrap();
        assert_eq!(fetched.content, "v2");
    }

    #[tokio::test]
    async fn test_store_rejects_foreign_agent() {
        let backend = backend();
        let clock = SimClock::new();
        let err = backend
            .store("someone-else", &record("m1", "x", &clock))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let backend = backend();
        let clock = SimClock::new();
        backend.store("agent", &record("m1", "a", &clock)).await.unwrap();
        backend.store("agent", &record("m2", "b", &clock)).await.unwrap();

        assert!(backend.delete("agent", "m1").await.unwrap());
        assert!(!backend.delete("agent", "m1").await.unwrap());
        assert_eq!(backend.clear("agent").await.unwrap(), 1);
        assert_eq!(backend.record_count("agent"), 0);
    }

    // =========================================================================
    // Retrieval Tests
    // =========================================================================

    #[tokio::test]
    async fn test_retrieve_recent_orders_newest_first() {
        let backend = backend();
        let clock = SimClock::new();
        for id in ["m1", "m2", "m3"] {
            backend.store("agent", &record(id, id, &clock)).await.unwrap();
            clock.advance_ms(1_000);
        }

        let results = backend.retrieve("agent", "recent", 2).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m3", "m2"]);
    }

    #[tokio::test]
    async fn test_retrieve_limit_bounds() {
        let backend = backend();
        let clock = SimClock::new();
        backend.store("agent", &record("m1", "a", &clock)).await.unwrap();

        assert!(backend.retrieve("agent", "recent", 0).await.unwrap().is_empty());
        assert_eq!(backend.retrieve("agent", "recent", 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_important_and_duration() {
        let backend = backend();
        let clock = SimClock::new();
        let low = MemoryRecord::builder("agent", MemoryType::Fact, "low")
            .id("low")
            .importance(0.1)
            .duration(DurationClass::Short)
            .timestamp(clock.now())
            .build();
        let high = MemoryRecord::builder("agent", MemoryType::Fact, "high")
            .id("high")
            .importance(0.9)
            .timestamp(clock.now())
            .build();
        backend.store("agent", &low).await.unwrap();
        backend.store("agent", &high).await.unwrap();

        let important = backend.retrieve("agent", "important", 1).await.unwrap();
        assert_eq!(important[0].id, "high");

        let short = backend.retrieve("agent", "short_term", 10).await.unwrap();
        assert_eq!(short.len(), 1);
        assert_eq!(short[0].id, "low");
    }

    #[tokio::test]
    async fn test_retrieve_tier_and_text() {
        let backend = backend();
        let clock = SimClock::new();
        let mut semantic = record("s1", "Rust ownership rules", &clock);
        semantic.tier = Some(TierKind::Semantic);
        backend.store("agent", &semantic).await.unwrap();
        backend
            .store("agent", &record("e1", "Walked the dog in the park", &clock))
            .await
            .unwrap();

        let tiered = backend.retrieve("agent", "tier:semantic", 10).await.unwrap();
        assert_eq!(tiered.len(), 1);
        assert_eq!(tiered[0].id, "s1");

        let text = backend.retrieve("agent", "ownership in rust", 10).await.unwrap();
        assert_eq!(text.len(), 1);
        assert_eq!(text[0].id, "s1");
    }

    #[tokio::test]
    async fn test_search_cosine() {
        let backend = backend();
        let clock = SimClock::new();
        let mut a = record("a", "a", &clock);
        a.embedding = Some(vec![1.0, 0.0]);
        let mut b = record("b", "b", &clock);
        b.embedding = Some(vec![0.0, 1.0]);
        backend.store("agent", &a).await.unwrap();
        backend.store("agent", &b).await.unwrap();
        backend.store("agent", &record("c", "no embedding", &clock)).await.unwrap();

        let results = backend.search("agent", &[0.9, 0.1], 10).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    // =========================================================================
    // Stats / Cleanup / Health
    // =========================================================================

    #[tokio::test]
    async fn test_stats() {
        let backend = backend();
        let clock = SimClock::new();
        backend.store("agent", &record("m1", "a", &clock)).await.unwrap();
        let mut semantic = record("m2", "b", &clock);
        semantic.tier = Some(TierKind::Semantic);
        backend.store("agent", &semantic).await.unwrap();

        let stats = backend.get_stats("agent").await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_type["experience"], 2);
        assert_eq!(stats.by_tier["semantic"], 1);
        assert_eq!(stats.by_tier["untiered"], 1);
    }

    #[tokio::test]
    async fn test_cleanup_respects_retention_and_tier() {
        let clock = SimClock::new();
        let backend = backend().with_clock(clock.clone());

        let mut old_episodic = record("old", "old", &clock);
        old_episodic.tier = Some(TierKind::Episodic);
        let mut old_semantic = record("kept", "kept", &clock);
        old_semantic.tier = Some(TierKind::Semantic);
        backend.store("agent", &old_episodic).await.unwrap();
        backend.store("agent", &old_semantic).await.unwrap();

        clock.advance_days(10);
        let fresh = MemoryRecord::builder("agent", MemoryType::Goal, "fresh")
            .id("fresh")
            .timestamp(clock.now())
            .expires_at(clock.now() + ChronoDuration::days(1))
            .build();
        backend.store("agent", &fresh).await.unwrap();

        assert_eq!(backend.cleanup("agent", 5).await.unwrap(), 1);
        assert!(backend.get("agent", "old").await.unwrap().is_none());
        assert!(backend.get("agent", "kept").await.unwrap().is_some());

        clock.advance_days(2);
        assert_eq!(backend.cleanup("agent", 5).await.unwrap(), 1);
        assert!(backend.get("agent", "fresh").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_health_check() {
        let health = backend().health_check().await.unwrap();
        assert_eq!(health.status, HealthState::Healthy);
        assert_eq!(health.details["backend"], "sim");
    }

    // =========================================================================
    // Fault Injection Tests
    // =========================================================================

    #[tokio::test]
    async fn test_write_fault() {
        let backend = backend().with_faults(FaultConfig::new(FaultType::StorageWriteFail, 1.0));
        let clock = SimClock::new();

        let err = backend.store("agent", &record("m1", "a", &clock)).await.unwrap_err();
        assert!(err.is_transient());
        // Reads are unaffected by write faults
        assert!(backend.retrieve("agent", "recent", 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_filtered_read_fault() {
        let backend = backend().with_faults(
            FaultConfig::new(FaultType::StorageReadFail, 1.0).with_filter("retrieve:text"),
        );

        assert!(backend.retrieve("agent", "hello world", 1).await.is_err());
        assert!(backend.retrieve("agent", "recent", 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_unavailable_is_connection_error() {
        let backend = backend().with_faults(FaultConfig::new(FaultType::StorageUnavailable, 1.0));
        let err = backend.health_check().await.unwrap_err();
        assert!(matches!(err, StorageError::Connection { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_fault_delays() {
        let backend = backend().with_faults(
            FaultConfig::new(FaultType::StorageLatency, 1.0).with_filter("search"),
        );
        let started = tokio::time::Instant::now();
        backend.search("agent", &[1.0], 1).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(DST_LATENCY_MS_MAX));
    }
}
