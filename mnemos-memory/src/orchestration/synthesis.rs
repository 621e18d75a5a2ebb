//! Result synthesis.
//!
//! Pure functions of the per-agent results: merging, ranking, bucketing,
//! confidence and quality.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::agents::{AgentKind, RelevantMemory};
use crate::constants::{
    ORCHESTRATOR_BUCKET_COUNT, ORCHESTRATOR_QUALITY_ANY_BONUS, ORCHESTRATOR_QUALITY_BASE,
    ORCHESTRATOR_QUALITY_RESULTS_COUNT_HIGH, ORCHESTRATOR_QUALITY_RESULTS_COUNT_LOW,
    ORCHESTRATOR_QUALITY_STEP_BONUS,
};
use crate::storage::MemoryRecord;

/// A memory merged across agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedMemory {
    /// The record
    pub memory: MemoryRecord,
    /// Sum of relevance over agents that returned it
    pub total_score: f64,
    /// Number of agents that returned it
    pub hits: usize,
    /// Agents that returned it
    pub agents: Vec<AgentKind>,
    /// Retrieval reasons, one per agent
    pub reasons: Vec<String>,
}

impl SynthesizedMemory {
    /// Mean relevance across the agents that returned it.
    #[must_use]
    pub fn average_score(&self) -> f64 {
        debug_assert!(self.hits > 0, "synthesized memory without hits");
        self.total_score / self.hits as f64
    }
}

/// Ranked results split into buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    /// Best results
    pub primary: Vec<SynthesizedMemory>,
    /// Next best
    pub contextual: Vec<SynthesizedMemory>,
    /// Tail
    pub related: Vec<SynthesizedMemory>,
}

impl Synthesis {
    /// All bucketed results in rank order.
    pub fn iter(&self) -> impl Iterator<Item = &SynthesizedMemory> {
        self.primary
            .iter()
            .chain(&self.contextual)
            .chain(&self.related)
    }

    /// Number of bucketed results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.primary.len() + self.contextual.len() + self.related.len()
    }

    /// Whether nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Merge per-agent results by memory id and rank them.
///
/// Ranking: hit count descending, then average score descending, then id.
/// The top five become primary, the next five contextual, the next five
/// related; the rest are dropped.
#[must_use]
pub fn synthesize(per_agent: &[(AgentKind, Vec<RelevantMemory>)]) -> Synthesis {
    let mut merged: BTreeMap<&str, SynthesizedMemory> = BTreeMap::new();
    for (agent, results) in per_agent {
        for result in results {
            let entry = merged
                .entry(result.memory.id.as_str())
                .or_insert_with(|| SynthesizedMemory {
                    memory: result.memory.clone(),
                    total_score: 0.0,
                    hits: 0,
                    agents: Vec::new(),
                    reasons: Vec::new(),
                });
            entry.total_score += result.relevance_score;
            entry.hits += 1;
            entry.agents.push(*agent);
            entry.reasons.push(result.retrieval_reason.clone());
        }
    }

    let mut ranked: Vec<SynthesizedMemory> = merged.into_values().collect();
    ranked.sort_by(|a, b| {
        b.hits
            .cmp(&a.hits)
            .then_with(|| b.average_score().total_cmp(&a.average_score()))
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });

    let mut buckets = ranked.into_iter();
    let primary: Vec<_> = buckets.by_ref().take(ORCHESTRATOR_BUCKET_COUNT).collect();
    let contextual: Vec<_> = buckets.by_ref().take(ORCHESTRATOR_BUCKET_COUNT).collect();
    let related: Vec<_> = buckets.take(ORCHESTRATOR_BUCKET_COUNT).collect();

    Synthesis {
        primary,
        contextual,
        related,
    }
}

/// Mean relevance of one agent's results (0 when empty).
#[must_use]
pub fn mean_relevance(results: &[RelevantMemory]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(|r| r.relevance_score).sum::<f64>() / results.len() as f64
}

/// Mean of per-agent mean relevances (0 when no agent ran).
#[must_use]
pub fn confidence(agent_means: &[f64]) -> f64 {
    if agent_means.is_empty() {
        return 0.0;
    }
    agent_means.iter().sum::<f64>() / agent_means.len() as f64
}

/// Heuristic quality of a synthesis in [0.5, 1.0].
#[must_use]
pub fn quality(synthesis: &Synthesis) -> f64 {
    let count = synthesis.len();
    let mut quality = ORCHESTRATOR_QUALITY_BASE;
    if count > 0 {
        quality += ORCHESTRATOR_QUALITY_ANY_BONUS;
    }
    if count >= ORCHESTRATOR_QUALITY_RESULTS_COUNT_LOW {
        quality += ORCHESTRATOR_QUALITY_STEP_BONUS;
    }
    if count >= ORCHESTRATOR_QUALITY_RESULTS_COUNT_HIGH {
        quality += ORCHESTRATOR_QUALITY_STEP_BONUS;
    }
    let types: BTreeSet<_> = synthesis.iter().map(|m| m.memory.memory_type).collect();
    if types.len() > 1 {
        quality += ORCHESTRATOR_QUALITY_STEP_BONUS;
    }
    quality.min(1.0)
}
