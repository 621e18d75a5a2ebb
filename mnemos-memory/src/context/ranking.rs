//! Context-aware ranking and score boosts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fingerprint::generate_fingerprint;
use super::similarity::similarity;
use super::ExecutionContext;
use crate::constants::{
    CONTEXT_IMPORTANCE_FACTOR_DEFAULT, CONTEXT_RANKING_WEIGHT_DEFAULT, CONTEXT_RECENCY_DECAY_DAYS,
    CONTEXT_RECENCY_FACTOR_DEFAULT,
};
use crate::storage::MemoryRecord;

/// A record with a ranking score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMemory {
    /// The record
    pub record: MemoryRecord,
    /// Score in [0, 1]
    pub score: f64,
}

impl ScoredMemory {
    /// Pair a record with a score.
    #[must_use]
    pub fn new(record: MemoryRecord, score: f64) -> Self {
        Self { record, score }
    }
}

/// Additive boost factors applied after contextual ranking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostFactors {
    /// Multiplier of `exp(-age_days / 30)`
    pub recency_factor: f64,
    /// Multiplier of record importance
    pub importance_factor: f64,
}

impl Default for BoostFactors {
    fn default() -> Self {
        Self {
            recency_factor: CONTEXT_RECENCY_FACTOR_DEFAULT,
            importance_factor: CONTEXT_IMPORTANCE_FACTOR_DEFAULT,
        }
    }
}

fn sort_descending(results: &mut [ScoredMemory]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Blend each score with context similarity: `score × (1 − w) + sim × w`.
///
/// Records without a stored fingerprint have similarity 0. Results are
/// re-sorted by the blended score, ties keeping their incoming order.
///
/// # Panics
/// Panics if weight is outside [0, 1].
#[must_use]
pub fn apply_contextual_ranking(
    mut results: Vec<ScoredMemory>,
    context: &ExecutionContext,
    weight: f64,
) -> Vec<ScoredMemory> {
    assert!((0.0..=1.0).contains(&weight), "weight must be in [0, 1], got {weight}");

    let current = generate_fingerprint(context);
    for result in &mut results {
        let context_similarity = result
            .record
            .metadata
            .fingerprint
            .as_deref()
            .map_or(0.0, |stored| similarity(stored, current.as_str()));
        result.score = result.score * (1.0 - weight) + context_similarity * weight;
    }

    sort_descending(&mut results);
    results
}

/// Add recency and importance boosts, clamp to 1.0 and re-sort.
#[must_use]
pub fn apply_boosts(
    mut results: Vec<ScoredMemory>,
    factors: &BoostFactors,
    now: DateTime<Utc>,
) -> Vec<ScoredMemory> {
    for result in &mut results {
        let age_days = result.record.age_days(now);
        let recency = (-age_days / CONTEXT_RECENCY_DECAY_DAYS).exp() * factors.recency_factor;
        let importance = result.record.importance * factors.importance_factor;
        result.score = (result.score + recency + importance).min(1.0);
    }

    sort_descending(&mut results);
    results
}

/// Contextual ranking followed by boosts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextAwareRanker {
    weight: f64,
    boosts: BoostFactors,
}

impl ContextAwareRanker {
    /// Ranker with the given context weight and default boosts.
    ///
    /// # Panics
    /// Panics if weight is outside [0, 1].
    #[must_use]
    pub fn new(weight: f64) -> Self {
        assert!((0.0..=1.0).contains(&weight), "weight must be in [0, 1]");
        Self {
            weight,
            boosts: BoostFactors::default(),
        }
    }

    /// Override the boost factors.
    #[must_use]
    pub fn with_boosts(mut self, boosts: BoostFactors) -> Self {
        self.boosts = boosts;
        self
    }

    /// Context weight.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Rank results for a context.
    #[must_use]
    pub fn rank(
        &self,
        results: Vec<ScoredMemory>,
        context: &ExecutionContext,
        now: DateTime<Utc>,
    ) -> Vec<ScoredMemory> {
        let ranked = apply_contextual_ranking(results, context, self.weight);
        apply_boosts(ranked, &self.boosts, now)
    }
}

impl Default for ContextAwareRanker {
    fn default() -> Self {
        Self::new(CONTEXT_RANKING_WEIGHT_DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryType;
    use chrono::Duration;

    fn scored(id: &str, score: f64, fingerprint: Option<&str>) -> ScoredMemory {
        let mut builder = MemoryRecord::builder("agent", MemoryType::Fact, id)
            .id(id)
            .importance(0.0)
            .timestamp(DateTime::UNIX_EPOCH);
        if let Some(fp) = fingerprint {
            builder = builder.fingerprint(fp);
        }
        ScoredMemory::new(builder.build(), score)
    }

    #[test]
    fn test_contextual_ranking_promotes_matching_context() {
        let context = ExecutionContext::new().with_scope("chat");
        let fp = generate_fingerprint(&context).into_string();

        let results = vec![scored("plain", 0.6, None), scored("matching", 0.5, Some(&fp))];
        let ranked = apply_contextual_ranking(results, &context, 0.3);

        assert_eq!(ranked[0].record.id, "matching");
        // 0.5 * 0.7 + 1.0 * 0.3
        assert!((ranked[0].score - 0.65).abs() < 1e-9);
        // 0.6 * 0.7 + 0
        assert!((ranked[1].score - 0.42).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_keeps_scores() {
        let context = ExecutionContext::new();
        let ranked = apply_contextual_ranking(vec![scored("a", 0.4, None)], &context, 0.0);
        assert!((ranked[0].score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_boosts() {
        let now = DateTime::UNIX_EPOCH;
        let mut fresh = scored("fresh", 0.5, None);
        fresh.record.importance = 1.0;
        let mut old = scored("old", 0.55, None);
        old.record.timestamp = now - Duration::days(300);

        let boosted = apply_boosts(vec![old, fresh], &BoostFactors::default(), now);

        assert_eq!(boosted[0].record.id, "fresh");
        // 0.5 + exp(0) * 0.1 + 1.0 * 0.1
        assert!((boosted[0].score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_boosts_clamped() {
        let mut high = scored("high", 0.99, None);
        high.record.importance = 1.0;
        let boosted = apply_boosts(vec![high], &BoostFactors::default(), DateTime::UNIX_EPOCH);
        assert!((boosted[0].score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ranker_combines() {
        let context = ExecutionContext::new().with_scope("chat");
        let ranker = ContextAwareRanker::default();
        let ranked = ranker.rank(vec![scored("a", 0.5, None)], &context, DateTime::UNIX_EPOCH);
        // 0.5 * 0.7 = 0.35, + recency 0.1
        assert!((ranked[0].score - 0.45).abs() < 1e-9);
    }
}
