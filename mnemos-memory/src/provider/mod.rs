//! Tiered Memory Provider - The Facade
//!
//! `TigerStyle`: One entry point, every backend call gated, every degraded
//! path visible.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TieredMemoryProvider                      │
//! │  store ─► TierRegistry::placement_for ─┬─► WorkingMemoryStore│
//! │                                        └─► GatedBackend<S>  │
//! │  retrieve / search ─► GatedBackend<S> ─(error)─► recency    │
//! │  orchestrate ─► MemoryOrchestrator ─► agents ─► GatedBackend│
//! │  consolidate ─► ConsolidationEngine (decide) ─► backend     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Working memory never touches the backend until an item is promoted.
//! Every other tier is persisted through [`GatedBackend`], so concurrency
//! and latency stay bounded no matter which path issues the call.

mod consolidation;

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::agents::RetrievalContext;
use crate::config::MemoryConfig;
use crate::consolidation::ConsolidationEngine;
use crate::constants::{
    RECORD_CONTENT_BYTES_MAX, RECORD_ID_BYTES_MAX, RETRIEVAL_QUERY_BYTES_MAX,
    RETRIEVAL_RESULTS_COUNT_MAX,
};
use crate::context::{ContextAwareRanker, ExecutionContext, ScoredMemory};
use crate::dst::Clock;
use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, MemoryResult};
use crate::memory::{WorkingMemoryItem, WorkingMemoryStore};
use crate::orchestration::{MemoryOrchestrator, OrchestratedResult};
use crate::storage::{
    GatedBackend, HealthStatus, MemoryRecord, RetrievalQuery, StorageBackend, StorageError,
    StorageStats,
};
use crate::tier::{TierKind, TierRegistry};

// =============================================================================
// Result Types
// =============================================================================

/// How a retrieval was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalReason {
    /// The backend answered the query as asked
    Direct,
    /// The query failed and the newest records were returned instead
    RecencyFallback,
    /// No usable embedding; keyword retrieval was used instead of vectors
    KeywordFallback,
}

/// Records plus how they were obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    /// The records
    pub records: Vec<MemoryRecord>,
    /// Path that produced them
    pub reason: RetrievalReason,
}

impl RetrievalOutcome {
    fn direct(records: Vec<MemoryRecord>) -> Self {
        Self {
            records,
            reason: RetrievalReason::Direct,
        }
    }

    /// Whether a fallback path was taken.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.reason != RetrievalReason::Direct
    }
}

/// Outcome of inserting into working memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingInsert {
    /// Item that had to leave to make room
    pub evicted: Option<WorkingMemoryItem>,
    /// Whether the evicted item was promoted to Episodic
    pub promoted: bool,
}

/// Counts for one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Persisted records
    pub persisted: StorageStats,
    /// Items held in working memory
    pub working_items: usize,
}

impl MemoryStats {
    /// Persisted records plus working memory items.
    #[must_use]
    pub fn total(&self) -> usize {
        self.persisted.total + self.working_items
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_id(what: &str, id: &str) -> MemoryResult<()> {
    if id.trim().is_empty() {
        return Err(MemoryError::validation(format!("{what} must not be empty")));
    }
    if id.len() > RECORD_ID_BYTES_MAX {
        return Err(MemoryError::validation(format!(
            "{what} {} bytes exceeds max {RECORD_ID_BYTES_MAX}",
            id.len()
        )));
    }
    Ok(())
}

fn validate_query(query: &str) -> MemoryResult<()> {
    if query.len() > RETRIEVAL_QUERY_BYTES_MAX {
        return Err(MemoryError::validation(format!(
            "query {} bytes exceeds max {RETRIEVAL_QUERY_BYTES_MAX}",
            query.len()
        )));
    }
    Ok(())
}

fn tier_query(tier: TierKind) -> String {
    format!("tier:{}", tier.as_str())
}

// =============================================================================
// TieredMemoryProvider
// =============================================================================

/// Tiered memory for many agents over one storage backend.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use mnemos_memory::config::MemoryConfig;
/// use mnemos_memory::dst::SimConfig;
/// use mnemos_memory::provider::TieredMemoryProvider;
/// use mnemos_memory::storage::{MemoryRecord, MemoryType, SimStorageBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let storage = Arc::new(SimStorageBackend::new(SimConfig::with_seed(42)));
/// let provider = TieredMemoryProvider::new(storage, MemoryConfig::default());
///
/// let record = MemoryRecord::builder("agent-1", MemoryType::Fact, "Paris is in France").build();
/// provider.store("agent-1", record).await.unwrap();
///
/// let recent = provider.retrieve("agent-1", "recent", 5).await.unwrap();
/// assert_eq!(recent.len(), 1);
/// # }
/// ```
pub struct TieredMemoryProvider<S: StorageBackend + ?Sized + 'static> {
    storage: Arc<GatedBackend<S>>,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
    working: WorkingMemoryStore,
    engine: ConsolidationEngine,
    ranker: ContextAwareRanker,
    orchestrator: MemoryOrchestrator,
    config: MemoryConfig,
    clock: Clock,
    known_agents: RwLock<BTreeSet<String>>,
}

impl<S: StorageBackend + ?Sized + 'static> TieredMemoryProvider<S> {
    /// Create a provider over a backend.
    ///
    /// # Panics
    /// Panics if the config does not validate; use [`Self::try_new`] for
    /// configs that come from outside the program.
    #[must_use]
    pub fn new(storage: Arc<S>, config: MemoryConfig) -> Self {
        match Self::try_new(storage, config) {
            Ok(provider) => provider,
            Err(error) => panic!("invalid memory config: {error}"),
        }
    }

    /// Create a provider, rejecting an invalid config.
    ///
    /// # Errors
    /// Returns `MemoryError::Validation` naming the first invalid field.
    pub fn try_new(storage: Arc<S>, config: MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;

        let registry = TierRegistry::new()
            .with_working_capacity(config.working_capacity)
            .with_working_decay_rate(config.working_decay_rate);
        let gated = Arc::new(GatedBackend::new(
            storage,
            config.backend_permits,
            config.backend_acquire_timeout(),
            config.backend_timeout(),
        ));

        let shared: Arc<dyn StorageBackend> = gated.clone();
        let mut orchestrator = MemoryOrchestrator::with_default_agents(shared);
        if let Some(timeout) = config.agent_timeout() {
            orchestrator = orchestrator.with_agent_timeout(timeout);
        }

        Ok(Self {
            storage: gated,
            embedding: None,
            working: WorkingMemoryStore::new(config.working_capacity, config.working_decay_rate),
            engine: ConsolidationEngine::new(registry),
            ranker: ContextAwareRanker::new(config.context_weight),
            orchestrator,
            config,
            clock: Clock::System,
            known_agents: RwLock::new(BTreeSet::new()),
        })
    }

    /// Attach an embedding provider.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Use the given clock for decay, ages and history.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Into<Clock>) -> Self {
        self.clock = clock.into();
        self
    }

    /// Replace the orchestrator (custom agents).
    #[must_use]
    pub fn with_orchestrator(mut self, orchestrator: MemoryOrchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// The tier registry.
    #[must_use]
    pub fn registry(&self) -> &TierRegistry {
        self.engine.registry()
    }

    /// The gated backend as a trait object.
    #[must_use]
    pub fn storage(&self) -> Arc<dyn StorageBackend> {
        self.storage.clone()
    }

    /// The multi-agent orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &MemoryOrchestrator {
        &self.orchestrator
    }

    /// Agents seen by this provider, sorted.
    #[must_use]
    pub fn known_agents(&self) -> Vec<String> {
        let mut agents = self
            .known_agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        agents.extend(self.working.agent_ids());
        agents.into_iter().collect()
    }

    fn remember_agent(&self, agent_id: &str) {
        let mut agents = self.known_agents.write().unwrap_or_else(PoisonError::into_inner);
        if !agents.contains(agent_id) {
            agents.insert(agent_id.to_string());
        }
    }

    fn forget_agent(&self, agent_id: &str) {
        self.known_agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(agent_id);
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store a record in the tier the registry picks for it.
    ///
    /// # Errors
    /// Returns `MemoryError::Validation` for malformed records and
    /// `MemoryError::BackendUnavailable` when the backend cannot be reached.
    pub async fn store(&self, agent_id: &str, record: MemoryRecord) -> MemoryResult<String> {
        let tier = self.registry().placement_for(record.memory_type, record.tier);
        self.store_tier(agent_id, record, tier).await
    }

    /// Store a record in an explicit tier.
    ///
    /// Working routes the content into working memory; Procedural evicts the
    /// least important records beyond its capacity.
    ///
    /// # Errors
    /// Returns `MemoryError::Validation` for malformed records and
    /// `MemoryError::BackendUnavailable` when the backend cannot be reached.
    #[tracing::instrument(skip(self, record), fields(memory_id = %record.id))]
    pub async fn store_tier(
        &self,
        agent_id: &str,
        mut record: MemoryRecord,
        tier: TierKind,
    ) -> MemoryResult<String> {
        validate_id("agent id", agent_id)?;
        if record.agent_id != agent_id {
            return Err(MemoryError::validation(format!(
                "record belongs to agent {}, not {agent_id}",
                record.agent_id
            )));
        }
        record.validate()?;

        if tier == TierKind::Working {
            self.add_to_working_memory(agent_id, &record.id, &record.content)
                .await?;
            return Ok(record.id);
        }

        record.tier = Some(tier);
        if record.embedding.is_none() && self.config.embed_on_store {
            if let Some(embedding) = &self.embedding {
                match embedding.embed(&record.content).await {
                    Ok(vector) => record.embedding = Some(vector),
                    Err(error) => {
                        tracing::warn!(%error, provider = embedding.name(), "embedding failed, storing without vector");
                    }
                }
            }
        }

        let id = self.storage.store(agent_id, &record).await?;
        self.remember_agent(agent_id);

        if self.registry().capacity(tier).is_some() {
            self.enforce_capacity(agent_id, tier).await?;
        }
        Ok(id)
    }

    /// Store a record stamped with the fingerprint of `context`.
    ///
    /// # Errors
    /// See [`Self::store`].
    pub async fn store_in_context(
        &self,
        agent_id: &str,
        mut record: MemoryRecord,
        context: &ExecutionContext,
    ) -> MemoryResult<String> {
        record.metadata.fingerprint = Some(context.fingerprint().into_string());
        self.store(agent_id, record).await
    }

    /// Delete least important, then oldest, records beyond a tier's capacity.
    async fn enforce_capacity(&self, agent_id: &str, tier: TierKind) -> MemoryResult<usize> {
        let Some(capacity) = self.registry().capacity(tier) else {
            return Ok(0);
        };
        let mut records = self
            .storage
            .retrieve(agent_id, &tier_query(tier), RETRIEVAL_RESULTS_COUNT_MAX)
            .await?;
        if records.len() <= capacity {
            return Ok(0);
        }

        records.sort_by(|a, b| {
            a.importance
                .total_cmp(&b.importance)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
                .then_with(|| a.id.cmp(&b.id))
        });
        let excess = records.len() - capacity;
        let mut removed = 0;
        for victim in records.iter().take(excess) {
            if self.storage.delete(agent_id, &victim.id).await? {
                removed += 1;
                tracing::debug!(agent_id, memory_id = %victim.id, %tier, "evicted over tier capacity");
            }
        }
        Ok(removed)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Records matching a query, falling back to the newest records if the
    /// backend fails.
    ///
    /// # Errors
    /// See [`Self::retrieve_detailed`].
    pub async fn retrieve(
        &self,
        agent_id: &str,
        query: &str,
        limit: usize,
    ) -> MemoryResult<Vec<MemoryRecord>> {
        Ok(self.retrieve_detailed(agent_id, query, limit).await?.records)
    }

    /// Records matching a query, with the path that produced them.
    ///
    /// `query` accepts the sentinels of [`RetrievalQuery`]; `tier:working`
    /// reads working memory. `limit` is clamped to
    /// `RETRIEVAL_RESULTS_COUNT_MAX`; zero returns nothing.
    ///
    /// # Errors
    /// Returns `MemoryError::Validation` for malformed input, or the backend
    /// error when the recency fallback fails too.
    #[tracing::instrument(skip(self))]
    pub async fn retrieve_detailed(
        &self,
        agent_id: &str,
        query: &str,
        limit: usize,
    ) -> MemoryResult<RetrievalOutcome> {
        validate_id("agent id", agent_id)?;
        validate_query(query)?;
        let limit = limit.min(RETRIEVAL_RESULTS_COUNT_MAX);
        if limit == 0 {
            return Ok(RetrievalOutcome::direct(Vec::new()));
        }

        let parsed = RetrievalQuery::parse(query);
        if parsed == RetrievalQuery::Tier(TierKind::Working) {
            return Ok(RetrievalOutcome::direct(
                self.working_records(agent_id, limit).await,
            ));
        }

        match self.storage.retrieve(agent_id, query, limit).await {
            Ok(records) => Ok(RetrievalOutcome::direct(records)),
            Err(error) if parsed != RetrievalQuery::Recent && !is_validation(&error) => {
                tracing::warn!(%error, "retrieval failed, falling back to recent memories");
                self.recency_fallback(agent_id, limit).await
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Records of one tier, newest first.
    ///
    /// # Errors
    /// See [`Self::retrieve_detailed`].
    pub async fn retrieve_tier(
        &self,
        agent_id: &str,
        tier: TierKind,
        limit: usize,
    ) -> MemoryResult<Vec<MemoryRecord>> {
        self.retrieve(agent_id, &tier_query(tier), limit).await
    }

    /// Retrieve, then rank by similarity of each record's fingerprint to the
    /// current context plus recency and importance boosts.
    ///
    /// # Errors
    /// See [`Self::retrieve_detailed`].
    pub async fn retrieve_in_context(
        &self,
        agent_id: &str,
        query: &str,
        limit: usize,
        context: &ExecutionContext,
    ) -> MemoryResult<Vec<ScoredMemory>> {
        let outcome = self.retrieve_detailed(agent_id, query, limit).await?;
        let scored = outcome
            .records
            .into_iter()
            .map(|record| {
                let score = record.importance;
                ScoredMemory::new(record, score)
            })
            .collect();
        Ok(self.ranker.rank(scored, context, self.clock.now()))
    }

    /// Nearest records to an embedding, falling back to the newest records
    /// if the backend fails.
    ///
    /// # Errors
    /// See [`Self::search_detailed`].
    pub async fn search(
        &self,
        agent_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> MemoryResult<Vec<MemoryRecord>> {
        Ok(self.search_detailed(agent_id, embedding, limit).await?.records)
    }

    /// Nearest records to an embedding, with the path that produced them.
    ///
    /// # Errors
    /// Returns `MemoryError::Validation` for an empty embedding, or the
    /// backend error when the recency fallback fails too.
    #[tracing::instrument(skip(self, embedding), fields(dimensions = embedding.len()))]
    pub async fn search_detailed(
        &self,
        agent_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> MemoryResult<RetrievalOutcome> {
        validate_id("agent id", agent_id)?;
        if embedding.is_empty() {
            return Err(MemoryError::validation("embedding must not be empty"));
        }
        let limit = limit.min(RETRIEVAL_RESULTS_COUNT_MAX);
        if limit == 0 {
            return Ok(RetrievalOutcome::direct(Vec::new()));
        }

        match self.storage.search(agent_id, embedding, limit).await {
            Ok(records) => Ok(RetrievalOutcome::direct(records)),
            Err(error) if !is_validation(&error) => {
                tracing::warn!(%error, "vector search failed, falling back to recent memories");
                self.recency_fallback(agent_id, limit).await
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Embed `text` and search by vector; keyword retrieval when no provider
    /// is attached or the provider is temporarily unavailable.
    ///
    /// # Errors
    /// Returns `MemoryError::Embedding` for non-retryable provider errors and
    /// `MemoryError::Validation` for empty or oversized text.
    pub async fn search_text(
        &self,
        agent_id: &str,
        text: &str,
        limit: usize,
    ) -> MemoryResult<RetrievalOutcome> {
        validate_query(text)?;
        if text.trim().is_empty() {
            return Err(MemoryError::validation("search text must not be empty"));
        }

        let Some(provider) = &self.embedding else {
            return self.keyword_fallback(agent_id, text, limit).await;
        };
        match provider.embed(text).await {
            Ok(vector) => self.search_detailed(agent_id, &vector, limit).await,
            Err(error) if error.is_retryable() => {
                tracing::warn!(%error, provider = provider.name(), "embedding unavailable, using keyword retrieval");
                self.keyword_fallback(agent_id, text, limit).await
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn keyword_fallback(
        &self,
        agent_id: &str,
        text: &str,
        limit: usize,
    ) -> MemoryResult<RetrievalOutcome> {
        let mut outcome = self.retrieve_detailed(agent_id, text, limit).await?;
        if outcome.reason == RetrievalReason::Direct {
            outcome.reason = RetrievalReason::KeywordFallback;
        }
        Ok(outcome)
    }

    async fn recency_fallback(&self, agent_id: &str, limit: usize) -> MemoryResult<RetrievalOutcome> {
        let records = self.storage.retrieve(agent_id, "recent", limit).await?;
        Ok(RetrievalOutcome {
            records,
            reason: RetrievalReason::RecencyFallback,
        })
    }

    async fn working_records(&self, agent_id: &str, limit: usize) -> Vec<MemoryRecord> {
        self.working
            .snapshot(agent_id)
            .await
            .iter()
            .take(limit)
            .map(|item| {
                let mut record = item.to_record(agent_id);
                record.tier = Some(TierKind::Working);
                record
            })
            .collect()
    }

    // =========================================================================
    // Orchestrated Retrieval
    // =========================================================================

    /// Multi-agent retrieval over this provider's backend.
    ///
    /// # Errors
    /// Returns `MemoryError::Validation` if the context is rejected. Agent
    /// failures degrade the result instead of failing the call.
    pub async fn orchestrate(
        &self,
        query: &str,
        context: &RetrievalContext,
    ) -> MemoryResult<OrchestratedResult> {
        let result = self.orchestrator.orchestrate(query, context).await?;
        self.remember_agent(&context.agent_id);
        Ok(result)
    }

    /// Feed a caller score in [0, 1] back to the contributing agents.
    ///
    /// # Errors
    /// Returns `MemoryError::Validation` if score is outside [0, 1].
    pub fn feedback(&self, result: &OrchestratedResult, score: f64) -> MemoryResult<()> {
        Ok(self.orchestrator.feedback(result, score)?)
    }

    // =========================================================================
    // Maintenance Surface
    // =========================================================================

    /// Delete one memory from the backend and working memory.
    ///
    /// # Errors
    /// Returns `MemoryError::Validation` for malformed ids or a backend error.
    pub async fn delete(&self, agent_id: &str, memory_id: &str) -> MemoryResult<bool> {
        validate_id("agent id", agent_id)?;
        validate_id("memory id", memory_id)?;

        let persisted = self.storage.delete(agent_id, memory_id).await?;
        let working = match self.working.existing_slot(agent_id) {
            Some(slot) => slot.lock().await.remove(memory_id).is_some(),
            None => false,
        };
        Ok(persisted || working)
    }

    /// Delete everything an agent remembers. Returns the number removed.
    ///
    /// # Errors
    /// Returns a backend error; working memory is kept if the backend fails.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, agent_id: &str) -> MemoryResult<usize> {
        validate_id("agent id", agent_id)?;
        let persisted = self.storage.clear(agent_id).await?;
        let working = self.working.clear(agent_id).await;
        self.forget_agent(agent_id);
        tracing::info!(persisted, working, "agent memory cleared");
        Ok(persisted + working)
    }

    /// Archive expired records and non-consolidated records older than
    /// `retention_days`. Returns the number removed.
    ///
    /// # Errors
    /// Returns a backend error.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup(&self, agent_id: &str, retention_days: u32) -> MemoryResult<usize> {
        validate_id("agent id", agent_id)?;
        Ok(self.storage.cleanup(agent_id, retention_days).await?)
    }

    /// Persisted and working memory counts.
    ///
    /// # Errors
    /// Returns a backend error.
    pub async fn get_stats(&self, agent_id: &str) -> MemoryResult<MemoryStats> {
        validate_id("agent id", agent_id)?;
        let persisted = self.storage.get_stats(agent_id).await?;
        let working_items = self.working.snapshot(agent_id).await.len();
        Ok(MemoryStats {
            persisted,
            working_items,
        })
    }

    /// Probe the backend. Never fails: an unreachable backend is reported
    /// as unhealthy.
    pub async fn health_check(&self) -> HealthStatus {
        let status = match self.storage.health_check().await {
            Ok(status) => status,
            Err(error) => {
                tracing::warn!(%error, "backend health check failed");
                HealthStatus::unhealthy(error.to_string())
            }
        };
        status
            .with_detail("working_agents", self.working.agent_ids().len())
            .with_detail(
                "embedding",
                self.embedding.as_ref().map_or("none", |provider| provider.name()),
            )
    }

    // =========================================================================
    // Working Memory
    // =========================================================================

    /// Insert into an agent's working memory at full attention.
    ///
    /// When full, the lowest-attention item leaves. If its attention is
    /// above 0.5 it is stored in Episodic before the insert; if that store
    /// fails the insert is abandoned and working memory is unchanged.
    ///
    /// # Errors
    /// Returns `MemoryError::Validation` for malformed input and
    /// `MemoryError::Consolidation` if the promotion write fails.
    #[tracing::instrument(skip(self, content))]
    pub async fn add_to_working_memory(
        &self,
        agent_id: &str,
        memory_id: &str,
        content: &str,
    ) -> MemoryResult<WorkingInsert> {
        validate_id("agent id", agent_id)?;
        validate_id("memory id", memory_id)?;
        if content.trim().is_empty() {
            return Err(MemoryError::validation("content must not be empty"));
        }
        if content.len() > RECORD_CONTENT_BYTES_MAX {
            return Err(MemoryError::validation(format!(
                "content {} bytes exceeds max {RECORD_CONTENT_BYTES_MAX}",
                content.len()
            )));
        }

        let slot = self.working.slot(agent_id);
        let mut memory = slot.lock().await;

        let candidate = memory.eviction_candidate(memory_id).cloned();
        let mut promoted = false;
        if let Some(item) = candidate.as_ref().filter(|item| item.deserves_promotion()) {
            let reason = format!("evicted with attention {:.2}", item.attention);
            self.persist_working_item(agent_id, item, TierKind::Episodic, reason)
                .await?;
            promoted = true;
        }

        let evicted = memory.insert(memory_id, content, self.clock.now());
        debug_assert_eq!(
            evicted.as_ref().map(|item| &item.id),
            candidate.as_ref().map(|item| &item.id),
            "evicted item differs from the promotion candidate"
        );
        drop(memory);

        if let Some(item) = &evicted {
            tracing::debug!(
                memory_id = %item.id,
                attention = item.attention,
                promoted,
                "working memory eviction"
            );
        }
        self.remember_agent(agent_id);
        Ok(WorkingInsert { evicted, promoted })
    }

    /// Access a working memory item, restoring its attention.
    ///
    /// # Errors
    /// Returns `MemoryError::Validation` for malformed ids.
    pub async fn access_working_memory(
        &self,
        agent_id: &str,
        memory_id: &str,
    ) -> MemoryResult<Option<WorkingMemoryItem>> {
        validate_id("agent id", agent_id)?;
        validate_id("memory id", memory_id)?;
        Ok(match self.working.existing_slot(agent_id) {
            Some(slot) => slot.lock().await.access(memory_id, self.clock.now()),
            None => None,
        })
    }

    /// Working memory items, highest attention first.
    pub async fn working_memory(&self, agent_id: &str) -> Vec<WorkingMemoryItem> {
        self.working.snapshot(agent_id).await
    }
}

fn is_validation(error: &StorageError) -> bool {
    matches!(error, StorageError::Validation { .. })
}
