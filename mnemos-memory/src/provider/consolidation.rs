//! Tier moves performed by the provider.
//!
//! The engine decides, the provider writes. Every move is a single store of
//! the same key, so a record is never in two tiers at once.

use std::collections::HashSet;

use super::{tier_query, validate_id, TieredMemoryProvider};
use crate::consolidation::{ConsolidationEvent, ConsolidationReport, SmartConsolidationReport};
use crate::constants::CONSOLIDATION_BATCH_COUNT_MAX;
use crate::error::{MemoryError, MemoryResult};
use crate::memory::WorkingMemoryItem;
use crate::storage::{MemoryRecord, StorageBackend};
use crate::tier::TierKind;

impl<S: StorageBackend + ?Sized + 'static> TieredMemoryProvider<S> {
    /// Move one memory from `from` to `to`.
    ///
    /// Returns false, changing nothing, if the memory is not in `from`
    /// (including when it was already moved), so repeating a call is safe.
    ///
    /// # Errors
    /// Returns `MemoryError::Validation` if the tiers are equal or `to` is
    /// Working, and `MemoryError::Consolidation` if a backend call fails.
    #[tracing::instrument(skip(self))]
    pub async fn consolidate_memory(
        &self,
        agent_id: &str,
        memory_id: &str,
        from: TierKind,
        to: TierKind,
    ) -> MemoryResult<bool> {
        validate_id("agent id", agent_id)?;
        validate_id("memory id", memory_id)?;
        if from == to {
            return Err(MemoryError::validation(format!(
                "cannot consolidate {memory_id} from {from} into itself"
            )));
        }
        if !to.is_persisted() {
            return Err(MemoryError::validation(
                "cannot consolidate into working memory",
            ));
        }

        if from == TierKind::Working {
            let Some(slot) = self.working.existing_slot(agent_id) else {
                return Ok(false);
            };
            let mut memory = slot.lock().await;
            let Some(item) = memory.get(memory_id).cloned() else {
                return Ok(false);
            };
            self.persist_working_item(agent_id, &item, to, "requested".to_string())
                .await?;
            memory.remove(memory_id);
            return Ok(true);
        }

        let record = self
            .storage
            .get(agent_id, memory_id)
            .await
            .map_err(|e| MemoryError::consolidation(memory_id, e))?;
        match record {
            Some(record) if record.tier == Some(from) => {
                self.move_record(agent_id, record, from, to, "requested".to_string())
                    .await?;
                Ok(true)
            }
            _ => {
                tracing::debug!("memory not in source tier, nothing to move");
                Ok(false)
            }
        }
    }

    /// Evaluate every persisted tier's consolidation rules and apply the moves.
    ///
    /// Working memory is left alone: its items leave only by eviction or an
    /// explicit `consolidate_memory`. A memory moves at most once per pass.
    /// No lock is held between records. Failures are counted and logged;
    /// they never abort the pass.
    ///
    /// # Errors
    /// Returns `MemoryError::Validation` for a malformed agent id.
    #[tracing::instrument(skip(self))]
    pub async fn run_consolidation(&self, agent_id: &str) -> MemoryResult<ConsolidationReport> {
        validate_id("agent id", agent_id)?;
        let now = self.clock.now();
        let mut report = ConsolidationReport::default();
        let mut moved: HashSet<String> = HashSet::new();

        let tiers: Vec<TierKind> = self
            .registry()
            .persisted_tiers_with_rules()
            .map(|tier| tier.kind)
            .collect();
        for tier in tiers {
            let records = match self
                .storage
                .retrieve(agent_id, &tier_query(tier), CONSOLIDATION_BATCH_COUNT_MAX)
                .await
            {
                Ok(records) => records,
                Err(error) => {
                    tracing::warn!(%error, %tier, "could not list tier, skipping");
                    continue;
                }
            };

            for record in records {
                if moved.contains(&record.id) {
                    continue;
                }
                report.examined += 1;
                let Some(rule) = self.engine.rule_for(&record, tier, now) else {
                    continue;
                };
                let (to, reason) = (rule.to, rule.reason());
                let memory_id = record.id.clone();
                match self.move_record(agent_id, record, tier, to, reason).await {
                    Ok(()) => {
                        moved.insert(memory_id);
                        report.consolidated += 1;
                    }
                    Err(error) => {
                        tracing::warn!(%error, %memory_id, "consolidation failed");
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::debug!(
            examined = report.examined,
            consolidated = report.consolidated,
            failed = report.failed,
            "consolidation pass complete"
        );
        Ok(report)
    }

    /// Merge records whose fingerprints are within the configured
    /// `consolidation_similarity_threshold`.
    ///
    /// # Errors
    /// Same as [`Self::smart_consolidate`].
    pub async fn smart_consolidate_default(
        &self,
        agent_id: &str,
    ) -> MemoryResult<SmartConsolidationReport> {
        self.smart_consolidate(agent_id, self.config.consolidation_similarity_threshold)
            .await
    }

    /// Merge records whose context fingerprints are similar.
    ///
    /// Each group of two or more is stored as one Episodic record, then its
    /// members are deleted. The merged record is written before anything is
    /// deleted. A failed delete leaves the member in place; its group is
    /// reported in `partial` rather than `created`.
    ///
    /// # Errors
    /// Returns `MemoryError::Validation` for a threshold outside [0, 1], a
    /// backend error if listing fails, and `MemoryError::Consolidation` if a
    /// merged record cannot be stored.
    #[tracing::instrument(skip(self))]
    pub async fn smart_consolidate(
        &self,
        agent_id: &str,
        threshold: f64,
    ) -> MemoryResult<SmartConsolidationReport> {
        validate_id("agent id", agent_id)?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(MemoryError::validation(format!(
                "similarity threshold {threshold} outside [0, 1]"
            )));
        }

        let records = self
            .storage
            .retrieve(agent_id, "recent", CONSOLIDATION_BATCH_COUNT_MAX)
            .await?;
        let now = self.clock.now();
        let mut report = SmartConsolidationReport::default();

        let groups = self.engine.group_by_fingerprint(records, threshold);
        for group in groups.into_iter().filter(|group| group.len() > 1) {
            let merged = self.engine.merge_group(&group);
            self.storage
                .store(agent_id, &merged)
                .await
                .map_err(|e| MemoryError::consolidation(merged.id.clone(), e))?;

            let mut left = 0;
            for original in &group {
                match self.storage.delete(agent_id, &original.id).await {
                    Ok(_) => {
                        report.records_merged += 1;
                        self.engine.record_event(ConsolidationEvent {
                            agent_id: agent_id.to_string(),
                            memory_id: original.id.clone(),
                            from: original.tier.unwrap_or(TierKind::Episodic),
                            to: TierKind::Episodic,
                            reason: format!("merged into {}", merged.id),
                            at: now,
                        });
                    }
                    Err(error) => {
                        tracing::warn!(%error, memory_id = %original.id, "could not delete merged member");
                        left += 1;
                    }
                }
            }
            if left == 0 {
                report.groups_merged += 1;
                report.created.push(merged.id);
            } else {
                report.members_left += left;
                report.partial.push(merged.id);
            }
        }
        Ok(report)
    }

    /// Audit history, oldest first, optionally for one agent.
    #[must_use]
    pub fn consolidation_history(&self, agent_id: Option<&str>) -> Vec<ConsolidationEvent> {
        self.engine.history(agent_id)
    }

    /// Store a working memory item in a persisted tier.
    pub(super) async fn persist_working_item(
        &self,
        agent_id: &str,
        item: &WorkingMemoryItem,
        to: TierKind,
        reason: String,
    ) -> MemoryResult<()> {
        let record = item.to_record(agent_id);
        self.move_record(agent_id, record, TierKind::Working, to, reason)
            .await?;
        self.remember_agent(agent_id);
        Ok(())
    }

    /// Store `record` in `to` (replacing its row) and log the event.
    async fn move_record(
        &self,
        agent_id: &str,
        record: MemoryRecord,
        from: TierKind,
        to: TierKind,
        reason: String,
    ) -> MemoryResult<()> {
        let memory_id = record.id.clone();
        let moved = self.engine.prepare_move(record, from, to);
        self.storage
            .store(agent_id, &moved)
            .await
            .map_err(|e| MemoryError::consolidation(memory_id.clone(), e))?;

        self.engine.record_event(ConsolidationEvent {
            agent_id: agent_id.to_string(),
            memory_id,
            from,
            to,
            reason,
            at: self.clock.now(),
        });

        if self.registry().capacity(to).is_some() {
            self.enforce_capacity(agent_id, to).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::MemoryConfig;
    use crate::context::ExecutionContext;
    use crate::dst::{FaultConfig, FaultType, SimClock, SimConfig};
    use crate::error::MemoryError;
    use crate::provider::TieredMemoryProvider;
    use crate::storage::{MemoryRecord, MemoryType, SimStorageBackend};
    use crate::tier::TierKind;

    fn provider(config: MemoryConfig) -> TieredMemoryProvider<SimStorageBackend> {
        provider_over(SimStorageBackend::new(SimConfig::with_seed(42)), config)
    }

    fn provider_over(
        storage: SimStorageBackend,
        config: MemoryConfig,
    ) -> TieredMemoryProvider<SimStorageBackend> {
        let clock = SimClock::at_ms(1_700_000_000_000);
        TieredMemoryProvider::new(Arc::new(storage.with_clock(clock.clone())), config)
            .with_clock(clock)
    }

    async fn store_in(
        provider: &TieredMemoryProvider<SimStorageBackend>,
        id: &str,
        content: &str,
        context: Option<&ExecutionContext>,
    ) {
        let record = MemoryRecord::builder("a1", MemoryType::Observation, content)
            .id(id)
            .build();
        let stored = match context {
            Some(context) => provider.store_in_context("a1", record, context).await,
            None => provider.store("a1", record).await,
        };
        assert_eq!(stored.unwrap(), id);
    }

    #[tokio::test]
    async fn test_consolidate_working_is_idempotent() {
        let provider = provider(MemoryConfig::default());
        provider.add_to_working_memory("a1", "w1", "saw a heron").await.unwrap();

        let first = provider
            .consolidate_memory("a1", "w1", TierKind::Working, TierKind::Episodic)
            .await
            .unwrap();
        let stats_after_first = provider.get_stats("a1").await.unwrap();
        let second = provider
            .consolidate_memory("a1", "w1", TierKind::Working, TierKind::Episodic)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(provider.get_stats("a1").await.unwrap(), stats_after_first);
        assert!(provider.working_memory("a1").await.is_empty());
        assert_eq!(provider.consolidation_history(Some("a1")).len(), 1);
    }

    #[tokio::test]
    async fn test_consolidate_persisted_requires_source_tier() {
        let provider = provider(MemoryConfig::default());
        let record = MemoryRecord::builder("a1", MemoryType::Experience, "Deployed the billing service")
            .id("e1")
            .build();
        provider.store("a1", record).await.unwrap();

        // Not in Semantic, so nothing moves
        assert!(!provider
            .consolidate_memory("a1", "e1", TierKind::Semantic, TierKind::Procedural)
            .await
            .unwrap());

        assert!(provider
            .consolidate_memory("a1", "e1", TierKind::Episodic, TierKind::Semantic)
            .await
            .unwrap());
        let semantic = provider.retrieve_tier("a1", TierKind::Semantic, 5).await.unwrap();
        assert_eq!(semantic[0].id, "e1");
        assert_eq!(semantic[0].memory_type, MemoryType::Knowledge);
        assert!(semantic[0].has_tag("billing"));
        assert!(provider.retrieve_tier("a1", TierKind::Episodic, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_consolidate_rejects_bad_tiers() {
        let provider = provider(MemoryConfig::default());
        let same = provider
            .consolidate_memory("a1", "m1", TierKind::Episodic, TierKind::Episodic)
            .await;
        assert!(matches!(same, Err(MemoryError::Validation { .. })));

        let into_working = provider
            .consolidate_memory("a1", "m1", TierKind::Episodic, TierKind::Working)
            .await;
        assert!(matches!(into_working, Err(MemoryError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_run_consolidation_applies_rules_once() {
        let provider = provider(MemoryConfig::default());
        let important = MemoryRecord::builder("a1", MemoryType::Experience, "Learned borrow checking")
            .id("e1")
            .importance(0.9)
            .build();
        let routine = MemoryRecord::builder("a1", MemoryType::Experience, "Had coffee")
            .id("e2")
            .importance(0.2)
            .build();
        // Would cascade to Procedural if moves were chained within a pass
        let practiced = MemoryRecord::builder("a1", MemoryType::Experience, "Ran the release checklist")
            .id("e3")
            .access_count(12)
            .build();
        for record in [important, routine, practiced] {
            provider.store("a1", record).await.unwrap();
        }

        let report = provider.run_consolidation("a1").await.unwrap();
        assert_eq!(report.consolidated, 2);
        assert_eq!(report.failed, 0);

        let semantic = provider.retrieve_tier("a1", TierKind::Semantic, 10).await.unwrap();
        let ids: Vec<&str> = semantic.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"e1"));
        assert!(ids.contains(&"e3"));
        assert_eq!(provider.retrieve_tier("a1", TierKind::Episodic, 10).await.unwrap().len(), 1);

        // Next pass carries e3 on to Procedural
        let second = provider.run_consolidation("a1").await.unwrap();
        assert_eq!(second.consolidated, 1);
        assert_eq!(
            provider.retrieve_tier("a1", TierKind::Procedural, 10).await.unwrap()[0].id,
            "e3"
        );
    }

    #[tokio::test]
    async fn test_smart_consolidate_merges_same_context() {
        let provider = provider(MemoryConfig::default());
        let chat = ExecutionContext::new().with_scope("chat").with_agent("a1").with_session("s1");
        let build = ExecutionContext::new().with_scope("build").with_extension("ci");

        for (id, content, context) in [
            ("m1", "Asked about the weather", &chat),
            ("m2", "Asked about the forecast", &chat),
            ("m3", "Compiled the project", &build),
        ] {
            let record = MemoryRecord::builder("a1", MemoryType::Observation, content)
                .id(id)
                .build();
            provider.store_in_context("a1", record, context).await.unwrap();
        }

        let report = provider.smart_consolidate("a1", 1.0).await.unwrap();
        assert_eq!(report.groups_merged, 1);
        assert_eq!(report.records_merged, 2);

        let remaining = provider.retrieve("a1", "recent", 10).await.unwrap();
        assert_eq!(remaining.len(), 2);
        let merged = remaining.iter().find(|r| r.id == report.created[0]).unwrap();
        assert!(merged.content.contains("weather"));
        assert!(merged.content.contains("forecast"));
        assert_eq!(merged.tier, Some(TierKind::Episodic));

        assert!(provider.smart_consolidate("a1", 1.5).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_run_consolidation_leaves_working_memory() {
        let provider = provider(MemoryConfig::default().with_working_decay_rate(0.0));
        provider.add_to_working_memory("a1", "w1", "saw a heron").await.unwrap();
        provider.add_to_working_memory("a1", "w2", "heard thunder").await.unwrap();

        let report = provider.run_consolidation("a1").await.unwrap();

        assert_eq!(report.consolidated, 0);
        assert_eq!(provider.working_memory("a1").await.len(), 2);
        assert_eq!(provider.get_stats("a1").await.unwrap().persisted.total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_consolidation_does_not_block_working_inserts() {
        let storage = SimStorageBackend::new(SimConfig::with_seed(42))
            .with_latency(Duration::from_millis(100));
        let provider = provider_over(storage, MemoryConfig::default().with_working_decay_rate(0.0));
        for n in 0..5 {
            let record = MemoryRecord::builder("a1", MemoryType::Experience, format!("milestone {n}"))
                .id(format!("e{n}"))
                .importance(0.9)
                .build();
            provider.store("a1", record).await.unwrap();
            provider
                .add_to_working_memory("a1", &format!("w{n}"), "note")
                .await
                .unwrap();
        }

        let foreground = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let started = tokio::time::Instant::now();
            provider.add_to_working_memory("a1", "fresh", "late note").await.unwrap();
            started.elapsed()
        };
        let (report, waited) = tokio::join!(provider.run_consolidation("a1"), foreground);

        assert_eq!(report.unwrap().consolidated, 5);
        assert!(waited <= Duration::from_millis(150), "insert waited {waited:?}");
        assert_eq!(provider.working_memory("a1").await.len(), 6);
    }

    #[tokio::test]
    async fn test_smart_consolidate_default_uses_configured_threshold() {
        let provider = provider(MemoryConfig::default());
        assert!((provider.config().consolidation_similarity_threshold - 0.7).abs() < f64::EPSILON);

        // Fingerprints differ by one character of the session id
        let monday = ExecutionContext::new().with_scope("chat").with_agent("a1").with_session("s1");
        let tuesday = ExecutionContext::new().with_scope("chat").with_agent("a1").with_session("s2");
        store_in(&provider, "m1", "Asked about the weather", Some(&monday)).await;
        store_in(&provider, "m2", "Asked about the forecast", Some(&tuesday)).await;
        store_in(&provider, "m3", "No context recorded", None).await;

        let report = provider.smart_consolidate_default("a1").await.unwrap();

        assert_eq!(report.groups_merged, 1);
        assert_eq!(report.records_merged, 2);
        let remaining = provider.retrieve("a1", "recent", 10).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().any(|r| r.id == "m3"));
    }

    #[tokio::test]
    async fn test_smart_consolidate_reports_partial_group() {
        let storage = SimStorageBackend::new(SimConfig::with_seed(42)).with_faults(
            FaultConfig::new(FaultType::StorageDeleteFail, 1.0).with_max_injections(1),
        );
        let provider = provider_over(storage, MemoryConfig::default());
        let chat = ExecutionContext::new().with_scope("chat").with_agent("a1");
        store_in(&provider, "m1", "Asked about the weather", Some(&chat)).await;
        store_in(&provider, "m2", "Asked about the forecast", Some(&chat)).await;

        let report = provider.smart_consolidate("a1", 1.0).await.unwrap();

        assert_eq!(report.groups_merged, 0);
        assert!(report.created.is_empty());
        assert_eq!(report.partial.len(), 1);
        assert_eq!(report.members_left, 1);
        assert_eq!(report.records_merged, 1);
        assert_eq!(provider.retrieve("a1", "recent", 10).await.unwrap().len(), 2);
    }
}
