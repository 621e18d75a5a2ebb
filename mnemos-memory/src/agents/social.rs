//! Social agent: people, conversations and relationships.

use std::sync::Arc;

use async_trait::async_trait;

use super::scoring::{rank, words, AgentCore, Scorecard};
use super::{
    build_clusters, build_relationships, frequent_entity_insights, AgentError, AgentKind, Insight,
    MemoryAgent, OrganizedMemory, ProcessedMemory, RelevantMemory, RetrievalContext,
    RetrievalPerformance, StrategyWeights,
};
use crate::constants::{AGENT_MENTION_BOOST_MAX, AGENT_SAME_USER_BONUS, AGENT_SIGNAL_BONUS};
use crate::storage::{significant_tokens, MemoryRecord, StorageBackend};

/// Words after which a capitalised name is a person.
const RELATIONSHIP_MARKERS: &[&str] = &[
    "friend", "friends", "colleague", "coworker", "partner", "wife", "husband", "brother",
    "sister", "mother", "father", "mom", "dad", "boss", "teammate", "neighbor", "with", "told",
    "met", "called", "asked", "said",
];

struct SocialSignals {
    entities: Vec<String>,
    mentions: usize,
    has_marker: bool,
    hints: Vec<String>,
}

fn analyze(content: &str) -> SocialSignals {
    let tokens = words(content);
    let mut signals = SocialSignals {
        entities: Vec::new(),
        mentions: 0,
        has_marker: false,
        hints: Vec::new(),
    };

    for (index, word) in tokens.iter().enumerate() {
        if let Some(handle) = word.strip_prefix('@') {
            let handle = handle.to_lowercase();
            if !handle.is_empty() && !signals.entities.contains(&handle) {
                signals.mentions += 1;
                signals.entities.push(handle);
            }
            continue;
        }

        let lower = word.to_lowercase();
        if !RELATIONSHIP_MARKERS.contains(&lower.as_str()) {
            continue;
        }
        signals.has_marker = true;
        let Some(next) = tokens.get(index + 1) else {
            continue;
        };
        if next.chars().next().is_some_and(char::is_uppercase) {
            let name = next.trim_end_matches("'s").to_lowercase();
            signals.hints.push(format!("{lower}:{name}"));
            if !signals.entities.contains(&name) {
                signals.entities.push(name);
            }
        }
    }
    signals
}

/// People, conversations and relationships.
pub struct SocialAgent {
    core: AgentCore,
}

impl SocialAgent {
    /// Create an agent reading candidates from `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            core: AgentCore::new(storage),
        }
    }

    fn cluster_key(record: &MemoryRecord, entities: &[String]) -> Option<String> {
        record
            .metadata
            .user_id
            .clone()
            .or_else(|| entities.first().cloned())
            .map(|user| format!("user:{user}"))
    }
}

#[async_trait]
impl MemoryAgent for SocialAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Social
    }

    fn process_memory(&self, mut record: MemoryRecord) -> ProcessedMemory {
        let signals = analyze(&record.content);

        let mut boost = (signals.mentions as f64 * AGENT_SIGNAL_BONUS).min(AGENT_MENTION_BOOST_MAX);
        if signals.has_marker {
            boost += AGENT_SIGNAL_BONUS;
        }
        record.importance = (record.importance + boost).min(1.0);

        let mut semantic_tags = Vec::new();
        if signals.mentions > 0 {
            semantic_tags.push("social:mention".to_string());
        }
        if signals.has_marker {
            semantic_tags.push("social:relationship".to_string());
        }
        semantic_tags.extend(signals.entities.iter().map(|e| format!("person:{e}")));

        ProcessedMemory {
            record,
            entities: signals.entities,
            semantic_tags,
            relationship_hints: signals.hints,
            importance_boost: boost,
        }
    }

    #[tracing::instrument(skip(self, context), fields(agent = "social", agent_id = %context.agent_id))]
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

            if let (Some(user), Some(wanted)) = (&record.metadata.user_id, &context.user_id) {
                if user == wanted {
                    card.signal("same_user", AGENT_SAME_USER_BONUS);
                }
            }
            if let (Some(platform), Some(wanted)) = (&record.metadata.platform, &context.platform) {
                if platform == wanted {
                    card.signal("same_platform", AGENT_SIGNAL_BONUS);
                }
            }

            let context_match = self.core.score_common(&mut card, self.kind(), &record, context);
            results.extend(card.finish(record, context_match));
        }

        let ranked = rank(results, context.limit);
        tracing::debug!(results = ranked.len(), "social retrieval complete");
        Ok(ranked)
    }

    fn organize_memories(&self, records: &[MemoryRecord]) -> OrganizedMemory {
        let entities: Vec<Vec<String>> = records.iter().map(|r| analyze(&r.content).entities).collect();
        let keys: Vec<Option<String>> = records
            .iter()
            .zip(&entities)
            .map(|(record, found)| Self::cluster_key(record, found))
            .collect();

        OrganizedMemory {
            clusters: build_clusters(records, &keys, &entities),
            relationships: build_relationships(records, &entities),
            insights: self.generate_insights(records),
        }
    }

    fn generate_insights(&self, records: &[MemoryRecord]) -> Vec<Insight> {
        let entities: Vec<Vec<String>> = records.iter().map(|r| analyze(&r.content).entities).collect();
        frequent_entity_insights(AgentKind::Social, records, &entities, |person, count| {
            format!("{person} comes up in {count} memories")
        })
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
