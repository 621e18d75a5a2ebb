//! Consolidation - Rule-Driven Tier Movement
//!
//! `TigerStyle`: Pure decisions here, I/O in the provider.
//!
//! The engine decides *whether* and *how* a memory moves between tiers and
//! keeps the audit history. The provider performs the backend writes so
//! every call still goes through its bounded gate.
//!
//! # Moves
//!
//! ```text
//! from Working:     RAM item ──► record(importance = attention) ──► store(target) ──► remove item
//! from persisted:   get ──► still in `from`? ──► store(target)   (same key, replaces source row)
//! ```

mod concepts;
mod rules;

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use concepts::extract_concepts;
pub use rules::{first_satisfied, is_satisfied, signal};

use crate::constants::CONSOLIDATION_HISTORY_COUNT_MAX;
use crate::context::similarity;
use crate::storage::{MemoryRecord, MemoryType};
use crate::tier::{ConsolidationRule, TierKind, TierRegistry};

/// Namespace for ids of records produced by merging.
const MERGE_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x3f, 0x8e, 0x51, 0x0a, 0x6c, 0x2d, 0x4b, 0x97, 0xa1, 0x0e, 0x5c, 0x44, 0xd2, 0x19, 0x7b, 0x63,
]);

// =============================================================================
// Events and Reports
// =============================================================================

/// One successful tier move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationEvent {
    /// Owning agent
    pub agent_id: String,
    /// Moved memory
    pub memory_id: String,
    /// Source tier
    pub from: TierKind,
    /// Target tier
    pub to: TierKind,
    /// Why it moved
    pub reason: String,
    /// When it moved
    pub at: DateTime<Utc>,
}

/// Outcome of a rule-driven consolidation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationReport {
    /// Records evaluated
    pub examined: usize,
    /// Records moved
    pub consolidated: usize,
    /// Records whose move failed
    pub failed: usize,
}

impl ConsolidationReport {
    /// Fold another report into this one.
    pub fn absorb(&mut self, other: ConsolidationReport) {
        self.examined += other.examined;
        self.consolidated += other.consolidated;
        self.failed += other.failed;
    }
}

/// Outcome of fingerprint-grouped consolidation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartConsolidationReport {
    /// Groups with more than one member whose originals were all deleted
    pub groups_merged: usize,
    /// Original records deleted by merging
    pub records_merged: usize,
    /// Ids of the merged records of fully merged groups
    pub created: Vec<String>,
    /// Ids of merged records whose group still has undeleted originals
    pub partial: Vec<String>,
    /// Originals that could not be deleted and now sit beside a merged record
    pub members_left: usize,
}

// =============================================================================
// ConsolidationEngine
// =============================================================================

/// Consolidation decisions and audit history.
#[derive(Debug)]
pub struct ConsolidationEngine {
    registry: TierRegistry,
    history: Mutex<VecDeque<ConsolidationEvent>>,
}

impl ConsolidationEngine {
    /// Create an engine over a tier registry.
    #[must_use]
    pub fn new(registry: TierRegistry) -> Self {
        Self {
            registry,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// The tier registry.
    #[must_use]
    pub fn registry(&self) -> &TierRegistry {
        &self.registry
    }

    /// First outgoing rule of `tier` the record satisfies.
    #[must_use]
    pub fn rule_for(
        &self,
        record: &MemoryRecord,
        tier: TierKind,
        now: DateTime<Utc>,
    ) -> Option<&ConsolidationRule> {
        first_satisfied(self.registry.rules_from(tier), record, now)
    }

    /// The record as it will be stored in `to`.
    ///
    /// Episodic → Semantic appends extracted concepts as tags and turns the
    /// record into knowledge.
    #[must_use]
    pub fn prepare_move(&self, mut record: MemoryRecord, from: TierKind, to: TierKind) -> MemoryRecord {
        if from == TierKind::Episodic && to == TierKind::Semantic {
            let concepts = extract_concepts(&record.content);
            record.tags.extend(concepts);
            record.memory_type = MemoryType::Knowledge;
        }
        record.tier = Some(to);
        record
    }

    /// Append to the audit history, dropping the oldest beyond the cap.
    pub fn record_event(&self, event: ConsolidationEvent) {
        tracing::debug!(
            agent_id = %event.agent_id,
            memory_id = %event.memory_id,
            from = %event.from,
            to = %event.to,
            reason = %event.reason,
            "memory consolidated"
        );
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if history.len() == CONSOLIDATION_HISTORY_COUNT_MAX {
            history.pop_front();
        }
        history.push_back(event);
    }

    /// History, oldest first, optionally for one agent.
    #[must_use]
    pub fn history(&self, agent_id: Option<&str>) -> Vec<ConsolidationEvent> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| agent_id.map_or(true, |id| event.agent_id == id))
            .cloned()
            .collect()
    }

    /// Group records whose fingerprints are similar.
    ///
    /// Records are visited in timestamp order; each joins the first group
    /// whose seed (first member) it matches with similarity ≥ `threshold`,
    /// or seeds a new group. Records without a fingerprint stay alone.
    #[must_use]
    pub fn group_by_fingerprint(
        &self,
        mut records: Vec<MemoryRecord>,
        threshold: f64,
    ) -> Vec<Vec<MemoryRecord>> {
        assert!((0.0..=1.0).contains(&threshold), "threshold must be in [0, 1]");
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        let mut groups: Vec<Vec<MemoryRecord>> = Vec::new();
        for record in records {
            let joined = record.metadata.fingerprint.as_deref().and_then(|fp| {
                groups.iter().position(|group| {
                    group[0]
                        .metadata
                        .fingerprint
                        .as_deref()
                        .is_some_and(|seed| similarity(seed, fp) >= threshold)
                })
            });
            match joined {
                Some(index) => groups[index].push(record),
                None => groups.push(vec![record]),
            }
        }
        groups
    }

    /// Merge a group into one Episodic record.
    ///
    /// Content is joined with newlines, importance is the maximum, tags are
    /// the union and the timestamp is the newest. The id is derived from the
    /// member ids so merging the same group twice yields the same id.
    ///
    /// # Panics
    /// Panics if the group is empty.
    #[must_use]
    pub fn merge_group(&self, group: &[MemoryRecord]) -> MemoryRecord {
        assert!(!group.is_empty(), "cannot merge an empty group");
        let seed = &group[0];

        let mut member_ids: Vec<&str> = group.iter().map(|r| r.id.as_str()).collect();
        member_ids.sort_unstable();
        let id = uuid::Uuid::new_v5(&MERGE_NAMESPACE, member_ids.join("\n").as_bytes()).to_string();

        let content = group
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let importance = group.iter().map(|r| r.importance).fold(0.0, f64::max);
        let tags: BTreeSet<String> = group.iter().flat_map(|r| r.tags.iter().cloned()).collect();
        let timestamp = group.iter().map(|r| r.timestamp).max().unwrap_or(seed.timestamp);

        let mut merged = seed.clone();
        merged.id = id;
        merged.content = content;
        merged.importance = importance;
        merged.tags = tags;
        merged.timestamp = timestamp;
        merged.tier = Some(TierKind::Episodic);
        merged.embedding = None;
        merged.metadata.access_count = group.iter().map(|r| r.metadata.access_count).sum();
        merged.metadata.emotional_valence = group
            .iter()
            .filter_map(|r| r.metadata.emotional_valence)
            .reduce(f64::max);
        merged
    }
}

impl Default for ConsolidationEngine {
    fn default() -> Self {
        Self::new(TierRegistry::new())
    }
}
