//! Shared scoring core for the memory agents.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use super::{AgentError, AgentKind, RelevantMemory, RetrievalContext, RetrievalPerformance, StrategyWeights};
use crate::constants::{
    AGENT_ADAPT_RELEVANCE_THRESHOLD, AGENT_ADAPT_SATISFACTION_THRESHOLD, AGENT_ADAPT_STEP,
    AGENT_CANDIDATE_POOL_COUNT, AGENT_CONTEXT_BONUS_MAX, AGENT_DOMAIN_TYPE_BONUS,
    AGENT_KEYWORD_BONUS_MIN, AGENT_KEYWORD_BONUS_SPAN, AGENT_LEARNING_FEEDBACK_WEIGHT,
    AGENT_LEARNING_RETAIN_WEIGHT, AGENT_PATTERN_EFFECTIVENESS_DEFAULT, AGENT_RELEVANCE_BASE,
    AGENT_STRATEGY_WEIGHT_MAX,
};
use crate::context::similarity;
use crate::storage::{significant_tokens, MemoryRecord, StorageBackend};

/// Words of a text with surrounding punctuation trimmed; `@` and `_` kept.
pub(super) fn words(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '@' && c != '_'))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Entities shared by every set, and `|shared| / |union|`.
pub(super) fn coherence(sets: &[&Vec<String>]) -> (Vec<String>, f64) {
    let union: BTreeSet<&String> = sets.iter().flat_map(|set| set.iter()).collect();
    if union.is_empty() {
        return (Vec::new(), 0.0);
    }
    let shared: Vec<String> = union
        .iter()
        .filter(|entity| sets.iter().all(|set| set.contains(entity)))
        .map(|entity| (*entity).clone())
        .collect();
    let coherence = shared.len() as f64 / union.len() as f64;
    (shared, coherence)
}

// =============================================================================
// Scorecard
// =============================================================================

/// Additive relevance score for one candidate.
///
/// Signals count toward keeping the candidate; modifiers only adjust the
/// score of a candidate that is already kept.
#[derive(Debug)]
pub(super) struct Scorecard {
    score: f64,
    reasons: Vec<String>,
    signals: usize,
}

impl Scorecard {
    pub(super) fn new() -> Self {
        Self {
            score: AGENT_RELEVANCE_BASE,
            reasons: Vec::new(),
            signals: 0,
        }
    }

    pub(super) fn signal(&mut self, reason: impl Into<String>, bonus: f64) {
        debug_assert!(bonus >= 0.0, "bonus must be non-negative");
        self.score += bonus;
        self.reasons.push(reason.into());
        self.signals += 1;
    }

    pub(super) fn modifier(&mut self, reason: impl Into<String>, bonus: f64) {
        debug_assert!(bonus >= 0.0, "bonus must be non-negative");
        self.score += bonus;
        self.reasons.push(reason.into());
    }

    /// The scored candidate, or `None` if no signal fired.
    pub(super) fn finish(self, memory: MemoryRecord, context_match: f64) -> Option<RelevantMemory> {
        if self.signals == 0 {
            return None;
        }
        let relevance_score = self.score.min(1.0);

        // Postcondition
        assert!((0.0..=1.0).contains(&relevance_score), "relevance out of range");

        Some(RelevantMemory {
            memory,
            relevance_score,
            retrieval_reason: self.reasons.join(", "),
            context_match,
        })
    }
}

// =============================================================================
// AgentCore
// =============================================================================

#[derive(Debug, Default)]
struct LearningState {
    patterns: HashMap<String, f64>,
    weights: StrategyWeights,
}

/// Candidate access, keyword scoring and learning shared by every agent.
pub(super) struct AgentCore {
    storage: Arc<dyn StorageBackend>,
    learning: RwLock<LearningState>,
}

impl AgentCore {
    pub(super) fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            learning: RwLock::new(LearningState::default()),
        }
    }

    /// Validate the request and read the candidate pool.
    pub(super) async fn candidates(
        &self,
        query: &str,
        context: &RetrievalContext,
    ) -> Result<Vec<MemoryRecord>, AgentError> {
        context.validate(query)?;
        let pool = self
            .storage
            .retrieve(&context.agent_id, "recent", AGENT_CANDIDATE_POOL_COUNT)
            .await?;
        Ok(pool)
    }

    pub(super) fn effectiveness(&self, pattern: &str) -> f64 {
        self.learning
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .patterns
            .get(pattern)
            .copied()
            .unwrap_or(AGENT_PATTERN_EFFECTIVENESS_DEFAULT)
    }

    pub(super) fn weights(&self) -> StrategyWeights {
        self.learning.read().unwrap_or_else(PoisonError::into_inner).weights
    }

    /// Add a signal per query keyword found in the record's content or tags.
    pub(super) fn score_keywords(&self, card: &mut Scorecard, keywords: &[String], record: &MemoryRecord) {
        if keywords.is_empty() {
            return;
        }
        let mut vocabulary: HashSet<String> = significant_tokens(&record.content).into_iter().collect();
        for tag in &record.tags {
            vocabulary.extend(tag.split(':').map(str::to_lowercase));
        }

        let weight = self.weights().keyword;
        for keyword in keywords {
            if vocabulary.contains(keyword) {
                let effectiveness = self.effectiveness(keyword);
                let bonus = (AGENT_KEYWORD_BONUS_MIN + AGENT_KEYWORD_BONUS_SPAN * effectiveness) * weight;
                card.signal(format!("keyword:{keyword}"), bonus);
            }
        }
    }

    /// Domain-type and context-similarity modifiers; returns the context match.
    pub(super) fn score_common(
        &self,
        card: &mut Scorecard,
        kind: AgentKind,
        record: &MemoryRecord,
        context: &RetrievalContext,
    ) -> f64 {
        if record.memory_type == kind.domain_type() {
            card.modifier("domain_type", AGENT_DOMAIN_TYPE_BONUS);
        }
        let context_match = match (&record.metadata.fingerprint, &context.fingerprint) {
            (Some(stored), Some(current)) => similarity(stored, current),
            _ => 0.0,
        };
        if context_match > 0.0 {
            let bonus = context_match * AGENT_CONTEXT_BONUS_MAX * self.weights().context;
            card.modifier("context", bonus);
        }
        context_match
    }

    /// Exponential smoothing of every query pattern toward `feedback`.
    ///
    /// Nothing is learned from an empty result set.
    ///
    /// # Panics
    /// Panics if feedback is outside [0, 1].
    pub(super) fn learn(&self, query: &str, results: &[RelevantMemory], feedback: f64) {
        assert!((0.0..=1.0).contains(&feedback), "feedback must be in [0, 1]");
        if results.is_empty() {
            return;
        }
        let mut learning = self.learning.write().unwrap_or_else(PoisonError::into_inner);
        for pattern in significant_tokens(query) {
            let entry = learning
                .patterns
                .entry(pattern)
                .or_insert(AGENT_PATTERN_EFFECTIVENESS_DEFAULT);
            *entry = *entry * AGENT_LEARNING_RETAIN_WEIGHT + feedback * AGENT_LEARNING_FEEDBACK_WEIGHT;
        }
    }

    pub(super) fn adapt(&self, kind: AgentKind, performance: &RetrievalPerformance) {
        let mut learning = self.learning.write().unwrap_or_else(PoisonError::into_inner);
        let weights = &mut learning.weights;
        if performance.average_relevance < AGENT_ADAPT_RELEVANCE_THRESHOLD {
            weights.keyword = (weights.keyword + AGENT_ADAPT_STEP).min(AGENT_STRATEGY_WEIGHT_MAX);
        }
        if performance.user_satisfaction < AGENT_ADAPT_SATISFACTION_THRESHOLD {
            weights.context = (weights.context + AGENT_ADAPT_STEP).min(AGENT_STRATEGY_WEIGHT_MAX);
        }
        tracing::debug!(
            agent = %kind,
            keyword_weight = weights.keyword,
            context_weight = weights.context,
            "retrieval strategy adapted"
        );
    }
}

/// Sort by relevance descending then id, and truncate.
pub(super) fn rank(mut results: Vec<RelevantMemory>, limit: usize) -> Vec<RelevantMemory> {
    results.sort_by(|a, b| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dst::SimConfig;
    use crate::storage::{MemoryType, SimStorageBackend};

    fn core() -> AgentCore {
        AgentCore::new(Arc::new(SimStorageBackend::new(SimConfig::with_seed(42))))
    }

    fn relevant(id: &str, score: f64) -> RelevantMemory {
        RelevantMemory {
            memory: MemoryRecord::builder("agent", MemoryType::Fact, "x").id(id).build(),
            relevance_score: score,
            retrieval_reason: String::new(),
            context_match: 0.0,
        }
    }

    #[test]
    fn test_words_trim_punctuation() {
        assert_eq!(words("Met @alice, (yesterday)!"), vec!["Met", "@alice", "yesterday"]);
    }

    #[test]
    fn test_coherence() {
        let a = vec!["alice".to_string(), "paris".to_string()];
        let b = vec!["alice".to_string()];
        let (shared, ratio) = coherence(&[&a, &b]);
        assert_eq!(shared, vec!["alice"]);
        assert!((ratio - 0.5).abs() < f64::EPSILON);

        let empty: Vec<String> = Vec::new();
        assert!(coherence(&[&empty]).1.abs() < f64::EPSILON);
    }

    #[test]
    fn test_scorecard_requires_signal() {
        let record = MemoryRecord::builder("agent", MemoryType::Fact, "x").build();
        let mut card = Scorecard::new();
        card.modifier("domain_type", 0.1);
        assert!(card.finish(record.clone(), 0.0).is_none());

        let mut card = Scorecard::new();
        card.signal("keyword:x", 0.3);
        card.signal("same_user", 0.3);
        let scored = card.finish(record, 0.0).unwrap();
        assert!((scored.relevance_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(scored.retrieval_reason, "keyword:x, same_user");
    }

    #[test]
    fn test_keyword_bonus_uses_effectiveness() {
        let core = core();
        let record = MemoryRecord::builder("agent", MemoryType::Fact, "Rust borrow checker")
            .tag("lang:rust")
            .build();

        let mut card = Scorecard::new();
        core.score_keywords(&mut card, &["borrow".to_string(), "python".to_string()], &record);
        let scored = card.finish(record, 0.0).unwrap();
        // 0.5 + (0.1 + 0.2 * 0.5)
        assert!((scored.relevance_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_learning_smoothing() {
        let core = core();
        assert!((core.effectiveness("friend") - 0.5).abs() < f64::EPSILON);

        core.learn("friend", &[relevant("m1", 0.8)], 1.0);
        assert!((core.effectiveness("friend") - 0.55).abs() < 1e-9);

        core.learn("friend", &[relevant("m1", 0.8)], 0.0);
        assert!((core.effectiveness("friend") - 0.495).abs() < 1e-9);
    }

    #[test]
    fn test_learning_ignores_empty_results() {
        let core = core();
        core.learn("friend", &[], 1.0);
        assert!((core.effectiveness("friend") - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_adapt_raises_and_clamps() {
        let core = core();
        let poor = RetrievalPerformance {
            average_relevance: 0.2,
            user_satisfaction: 0.9,
        };
        core.adapt(AgentKind::Social, &poor);
        assert!((core.weights().keyword - 1.05).abs() < 1e-9);
        assert!((core.weights().context - 1.0).abs() < f64::EPSILON);

        let unhappy = RetrievalPerformance {
            average_relevance: 0.2,
            user_satisfaction: 0.1,
        };
        for _ in 0..100 {
            core.adapt(AgentKind::Social, &unhappy);
        }
        assert!((core.weights().keyword - AGENT_STRATEGY_WEIGHT_MAX).abs() < f64::EPSILON);
        assert!((core.weights().context - AGENT_STRATEGY_WEIGHT_MAX).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let ranked = rank(vec![relevant("b", 0.7), relevant("a", 0.7), relevant("c", 0.9)], 2);
        let ids: Vec<&str> = ranked.iter().map(|r| r.memory.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }
}
