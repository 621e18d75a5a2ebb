//! Knowledge agent: facts, definitions and technical terms.

use std::sync::Arc;

use async_trait::async_trait;

use super::scoring::{rank, AgentCore, Scorecard};
use super::{
    build_clusters, build_relationships, frequent_entity_insights, AgentError, AgentKind, Insight,
    MemoryAgent, OrganizedMemory, ProcessedMemory, RelevantMemory, RetrievalContext,
    RetrievalPerformance, StrategyWeights,
};
use crate::constants::AGENT_SIGNAL_BONUS;
use crate::storage::{significant_tokens, MemoryRecord, StorageBackend};

const DEFINITION_MARKERS: &[&str] = &[" is a ", " is an ", " is the ", " means ", " refers to ", " defined as "];

struct KnowledgeSignals {
    entities: Vec<String>,
    numerics: usize,
    is_definition: bool,
}

fn is_numeric(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_digit())
        && word.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '%' | '-'))
}

fn is_technical(word: &str) -> bool {
    let has_letter = word.chars().any(char::is_alphabetic);
    word.contains('_')
        || word.contains("::")
        || (word.contains('.') && has_letter)
        || (has_letter && word.chars().any(|c| c.is_ascii_digit()))
        || word.chars().skip(1).any(char::is_uppercase)
}

fn push_unique(entities: &mut Vec<String>, entity: String) {
    if !entities.contains(&entity) {
        entities.push(entity);
    }
}

fn analyze(content: &str) -> KnowledgeSignals {
    let mut signals = KnowledgeSignals {
        entities: Vec::new(),
        numerics: 0,
        is_definition: false,
    };
    let mut sentence_start = true;
    for raw in content.split_whitespace() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
        if !word.is_empty() {
            if is_numeric(word) {
                signals.numerics += 1;
                push_unique(&mut signals.entities, word.to_string());
            } else if is_technical(word) {
                push_unique(&mut signals.entities, word.to_lowercase());
            } else if !sentence_start && word.chars().next().is_some_and(char::is_uppercase) {
                push_unique(&mut signals.entities, word.to_lowercase());
            }
        }
        sentence_start = raw.ends_with(['.', '!', '?']);
    }

    let padded = format!(" {} ", content.to_lowercase());
    signals.is_definition = DEFINITION_MARKERS.iter().any(|marker| padded.contains(marker));
    signals
}

fn tag_matches(tag: &str, keyword: &str) -> bool {
    tag.split(':').any(|part| part.eq_ignore_ascii_case(keyword))
}

/// Facts, definitions and technical terms.
pub struct KnowledgeAgent {
    core: AgentCore,
}

impl KnowledgeAgent {
    /// Create an agent reading candidates from `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            core: AgentCore::new(storage),
        }
    }

    fn cluster_key(record: &MemoryRecord) -> Option<String> {
        record.tags.iter().next().map(|tag| {
            let domain = tag.split(':').next().unwrap_or(tag);
            format!("domain:{domain}")
        })
    }
}

#[async_trait]
impl MemoryAgent for KnowledgeAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Knowledge
    }

    fn process_memory(&self, mut record: MemoryRecord) -> ProcessedMemory {
        let signals = analyze(&record.content);

        let mut boost = 0.0;
        let mut semantic_tags = Vec::new();
        if signals.numerics > 0 {
            boost += AGENT_SIGNAL_BONUS;
            semantic_tags.push("knowledge:numeric".to_string());
        }
        if signals.is_definition {
            boost += AGENT_SIGNAL_BONUS;
            semantic_tags.push("knowledge:definition".to_string());
        }
        record.importance = (record.importance + boost).min(1.0);
        semantic_tags.extend(signals.entities.iter().map(|e| format!("concept:{e}")));

        let relationship_hints = match (signals.is_definition, signals.entities.first()) {
            (true, Some(subject)) => vec![format!("defines:{subject}")],
            _ => Vec::new(),
        };

        ProcessedMemory {
            record,
            entities: signals.entities,
            semantic_tags,
            relationship_hints,
            importance_boost: boost,
        }
    }

    #[tracing::instrument(skip(self, context), fields(agent = "knowledge", agent_id = %context.agent_id))]
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

            for tag in &record.tags {
                if keywords.iter().any(|keyword| tag_matches(tag, keyword)) {
                    card.signal(format!("tag:{tag}"), AGENT_SIGNAL_BONUS);
                }
            }

            let context_match = self.core.score_common(&mut card, self.kind(), &record, context);
            results.extend(card.finish(record, context_match));
        }

        let ranked = rank(results, context.limit);
        tracing::debug!(results = ranked.len(), "knowledge retrieval complete");
        Ok(ranked)
    }

    fn organize_memories(&self, records: &[MemoryRecord]) -> OrganizedMemory {
        let entities: Vec<Vec<String>> = records.iter().map(|r| analyze(&r.content).entities).collect();
        let keys: Vec<Option<String>> = records.iter().map(Self::cluster_key).collect();

        OrganizedMemory {
            clusters: build_clusters(records, &keys, &entities),
            relationships: build_relationships(records, &entities),
            insights: self.generate_insights(records),
        }
    }

    fn generate_insights(&self, records: &[MemoryRecord]) -> Vec<Insight> {
        let entities: Vec<Vec<String>> = records.iter().map(|r| analyze(&r.content).entities).collect();
        frequent_entity_insights(AgentKind::Knowledge, records, &entities, |concept, count| {
            format!("{concept} is referenced by {count} memories")
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
