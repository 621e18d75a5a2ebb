//! Experience agent: events, actions and their outcomes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use super::scoring::{rank, words, AgentCore, Scorecard};
use super::{
    build_clusters, build_relationships, frequent_entity_insights, AgentError, AgentKind, Insight,
    MemoryAgent, OrganizedMemory, ProcessedMemory, RelevantMemory, RetrievalContext,
    RetrievalPerformance, StrategyWeights,
};
use crate::constants::{AGENT_SIGNAL_BONUS, AGENT_TEMPORAL_ADJACENCY_MS, AGENT_TEMPORAL_WINDOW_BONUS};
use crate::storage::{significant_tokens, MemoryRecord, StorageBackend};

const ACTION_VERBS: &[&str] = &[
    "tried", "built", "deployed", "fixed", "learned", "visited", "went", "finished", "started",
    "failed", "completed", "broke", "shipped", "wrote", "ran", "made", "did", "attempted",
];

const TEMPORAL_MARKERS: &[&str] = &[
    "yesterday", "today", "tonight", "tomorrow", "morning", "afternoon", "evening", "night",
    "week", "month", "year", "ago", "last", "earlier", "later", "before", "after", "during",
    "when", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];

const OUTCOME_WORDS: &[&str] = &[
    "success", "succeeded", "successful", "worked", "failed", "failure", "broke", "won", "lost",
    "solved", "fixed", "result", "outcome",
];

const SUCCESS_WORDS: &[&str] = &["success", "succeeded", "successful", "worked", "won", "solved", "fixed"];

const OUTCOME_TAG_PREFIX: &str = "outcome:";

/// `-ed` words at least this long count as actions.
const PAST_TENSE_CHARS_MIN: usize = 5;

struct ExperienceSignals {
    entities: Vec<String>,
    outcome_word: Option<String>,
    has_temporal: bool,
}

fn analyze(content: &str) -> ExperienceSignals {
    let mut signals = ExperienceSignals {
        entities: Vec::new(),
        outcome_word: None,
        has_temporal: false,
    };

    for word in words(content) {
        let lower = word.to_lowercase();
        let is_action = ACTION_VERBS.contains(&lower.as_str())
            || (lower.ends_with("ed") && lower.chars().count() >= PAST_TENSE_CHARS_MIN);
        let is_temporal = TEMPORAL_MARKERS.contains(&lower.as_str());

        if signals.outcome_word.is_none() && OUTCOME_WORDS.contains(&lower.as_str()) {
            signals.outcome_word = Some(lower.clone());
        }
        signals.has_temporal |= is_temporal;
        if (is_action || is_temporal) && !signals.entities.contains(&lower) {
            signals.entities.push(lower);
        }
    }
    signals
}

/// Recorded outcome from metadata or an `outcome:*` tag.
fn recorded_outcome(record: &MemoryRecord) -> Option<String> {
    record.metadata.outcome.clone().or_else(|| {
        record
            .tags
            .iter()
            .find_map(|tag| tag.strip_prefix(OUTCOME_TAG_PREFIX).map(str::to_string))
    })
}

/// Events, actions and their outcomes.
pub struct ExperienceAgent {
    core: AgentCore,
}

impl ExperienceAgent {
    /// Create an agent reading candidates from `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            core: AgentCore::new(storage),
        }
    }

    /// Outcome cluster when recorded, otherwise a window of memories each
    /// within an hour of the previous one.
    fn cluster_keys(records: &[MemoryRecord]) -> Vec<Option<String>> {
        let mut keys: Vec<Option<String>> = vec![None; records.len()];
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&a, &b| {
            records[a]
                .timestamp
                .cmp(&records[b].timestamp)
                .then_with(|| records[a].id.cmp(&records[b].id))
        });

        let adjacency = Duration::milliseconds(AGENT_TEMPORAL_ADJACENCY_MS);
        let mut window: Option<(String, usize)> = None;
        for index in order {
            let record = &records[index];
            if let Some(outcome) = recorded_outcome(record) {
                keys[index] = Some(format!("{OUTCOME_TAG_PREFIX}{outcome}"));
                continue;
            }
            let key = match &window {
                Some((key, previous)) if record.timestamp - records[*previous].timestamp <= adjacency => {
                    key.clone()
                }
                _ => format!("window:{}", record.timestamp.to_rfc3339()),
            };
            keys[index] = Some(key.clone());
            window = Some((key, index));
        }
        keys
    }
}

#[async_trait]
impl MemoryAgent for ExperienceAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Experience
    }

    fn process_memory(&self, mut record: MemoryRecord) -> ProcessedMemory {
        let signals = analyze(&record.content);

        let mut boost = 0.0;
        let mut semantic_tags = Vec::new();
        if signals.outcome_word.is_some() {
            boost += AGENT_SIGNAL_BONUS;
            semantic_tags.push("experience:outcome".to_string());
        }
        if signals.has_temporal {
            boost += AGENT_SIGNAL_BONUS;
            semantic_tags.push("experience:temporal".to_string());
        }
        record.importance = (record.importance + boost).min(1.0);
        semantic_tags.extend(
            signals
                .entities
                .iter()
                .filter(|e| !TEMPORAL_MARKERS.contains(&e.as_str()))
                .map(|e| format!("action:{e}")),
        );

        let relationship_hints = recorded_outcome(&record)
            .or(signals.outcome_word)
            .map(|outcome| vec![format!("{OUTCOME_TAG_PREFIX}{outcome}")])
            .unwrap_or_default();

        ProcessedMemory {
            record,
            entities: signals.entities,
            semantic_tags,
            relationship_hints,
            importance_boost: boost,
        }
    }

    #[tracing::instrument(skip(self, context), fields(agent = "experience", agent_id = %context.agent_id))]
    async fn retrieve_relevant(
        &self,
        query: &str,
        context: &RetrievalContext,
    ) -> Result<Vec<RelevantMemory>, AgentError> {
        let pool = self.core.candidates(query, context).await?;
        let keywords = significant_tokens(query);

        let mut results = Vec::new();
        for record in pool {
            let mut card = Scorecard::new();
            self.core.score_keywords(&mut card, &keywords, &record);

            if let Some((start, end)) = context.time_window {
                if (start..=end).contains(&record.timestamp) {
                    card.signal("time_window", AGENT_TEMPORAL_WINDOW_BONUS);
                }
            }
            if recorded_outcome(&record).is_some() {
                card.modifier("outcome", AGENT_SIGNAL_BONUS);
            }

            let context_match = self.core.score_common(&mut card, self.kind(), &record, context);
            results.extend(card.finish(record, context_match));
        }

        let ranked = rank(results, context.limit);
        tracing::debug!(results = ranked.len(), "experience retrieval complete");
        Ok(ranked)
    }

    fn organize_memories(&self, records: &[MemoryRecord]) -> OrganizedMemory {
        let entities: Vec<Vec<String>> = records.iter().map(|r| analyze(&r.content).entities).collect();
        let keys = Self::cluster_keys(records);

        OrganizedMemory {
            clusters: build_clusters(records, &keys, &entities),
            relationships: build_relationships(records, &entities),
            insights: self.generate_insights(records),
        }
    }

    fn generate_insights(&self, records: &[MemoryRecord]) -> Vec<Insight> {
        let mut insights = Vec::new();

        let with_outcome: Vec<(&MemoryRecord, String)> = records
            .iter()
            .filter_map(|r| recorded_outcome(r).map(|o| (r, o.to_lowercase())))
            .collect();
        if !with_outcome.is_empty() {
            let successes = with_outcome
                .iter()
                .filter(|(_, outcome)| SUCCESS_WORDS.contains(&outcome.as_str()))
                .count();
            insights.push(Insight {
                agent: AgentKind::Experience,
                description: format!(
                    "{successes} of {} recorded outcomes were successful",
                    with_outcome.len()
                ),
                evidence: with_outcome.iter().map(|(r, _)| r.id.clone()).collect(),
                confidence: with_outcome.len() as f64 / records.len() as f64,
            });
        }

        let entities: Vec<Vec<String>> = records.iter().map(|r| analyze(&r.content).entities).collect();
        insights.extend(frequent_entity_insights(
            AgentKind::Experience,
            records,
            &entities,
            |action, count| format!("'{action}' recurs across {count} experiences"),
        ));
        insights
    }

    fn learn_from_retrieval(&self, query: &str, results: &[RelevantMemory], feedback: f64) {
        self.core.learn(query, results, feedback);
    }

    fn adapt_retrieval_strategy(&self, performance: &RetrievalPerformance) {
        self.core.adapt(self.kind(), performance);
    }

    fn strategy(&self) -> StrategyWeights {
        self.core.weights()
    }

    fn pattern_effectiveness(&self, pattern: &str) -> f64 {
        self.core.effectiveness(pattern)
    }
}
