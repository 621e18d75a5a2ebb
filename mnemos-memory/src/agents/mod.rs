//! Memory Agents - Domain-Specialised Retrieval
//!
//! `TigerStyle`: One contract, three specialisations, shared scoring core.
//!
//! Each agent reads a candidate pool of recent records from the backend and
//! scores it with the same additive scheme:
//!
//! ```text
//! score = 0.5                                   base
//!       + Σ (0.1 + 0.2 × effectiveness) × kw    per matching query keyword
//!       + domain signals                        user/platform, tags, time window
//!       + 0.1                                   memory type is the agent's domain
//!       + similarity × 0.1 × ctx                context fingerprint match
//!       (clamped to 1.0)
//! ```
//!
//! Candidates where neither a keyword nor a domain signal fired are dropped.
//! Specialisation only changes entity extraction, importance boosts, the
//! domain signals and the clustering key.

mod experience;
mod knowledge;
mod scoring;
mod social;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use experience::ExperienceAgent;
pub use knowledge::KnowledgeAgent;
pub use social::SocialAgent;

use crate::constants::{
    AGENT_INSIGHT_SUPPORT_MIN, AGENT_RELATIONSHIPS_COUNT_MAX, AGENT_STRATEGY_WEIGHT_DEFAULT,
    ORCHESTRATOR_BUCKET_COUNT, RETRIEVAL_QUERY_BYTES_MAX, RETRIEVAL_RESULTS_COUNT_MAX,
};
use crate::storage::{MemoryRecord, MemoryType, StorageError};

// =============================================================================
// AgentKind
// =============================================================================

/// The retrieval specialisations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// People, conversations and relationships
    Social,
    /// Facts, definitions and technical knowledge
    Knowledge,
    /// Events, actions and their outcomes
    Experience,
}

impl AgentKind {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Social => "social",
            Self::Knowledge => "knowledge",
            Self::Experience => "experience",
        }
    }

    /// The memory type this agent specialises in.
    #[must_use]
    pub fn domain_type(&self) -> MemoryType {
        match self {
            Self::Social => MemoryType::Social,
            Self::Knowledge => MemoryType::Knowledge,
            Self::Experience => MemoryType::Experience,
        }
    }

    /// All kinds in selection order.
    #[must_use]
    pub fn all() -> &'static [AgentKind] {
        &[Self::Social, Self::Knowledge, Self::Experience]
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors from memory agents.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    /// Candidate pool could not be read
    #[error("agent storage error: {0}")]
    Storage(#[from] StorageError),

    /// Query or context rejected before scoring
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// What was wrong
        message: String,
    },

    /// Feedback score outside [0, 1]
    #[error("feedback score {score} outside [0, 1]")]
    InvalidFeedback {
        /// Rejected score
        score: f64,
    },
}

impl AgentError {
    /// Create an invalid query error.
    #[must_use]
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }
}

// =============================================================================
// Retrieval Types
// =============================================================================

/// Who is asking, and from where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalContext {
    /// Agent whose memories are searched
    pub agent_id: String,
    /// Querying user
    pub user_id: Option<String>,
    /// Querying platform
    pub platform: Option<String>,
    /// Fingerprint of the current execution context
    pub fingerprint: Option<String>,
    /// Inclusive time window of interest
    pub time_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Maximum results per agent
    pub limit: usize,
}

impl RetrievalContext {
    /// Context for an agent with the default result limit.
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            user_id: None,
            platform: None,
            fingerprint: None,
            time_window: None,
            limit: ORCHESTRATOR_BUCKET_COUNT * 3,
        }
    }

    /// Set the querying user.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the querying platform.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Set the current context fingerprint.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Restrict experience matching to a time window.
    ///
    /// # Panics
    /// Panics if `start` is after `end`.
    #[must_use]
    pub fn with_time_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "time window start must not be after end");
        self.time_window = Some((start, end));
        self
    }

    /// Set the per-agent result limit.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Reject contexts no agent can serve.
    ///
    /// # Errors
    /// Returns `AgentError::InvalidQuery` on an empty agent id, an oversized
    /// query or limit.
    pub fn validate(&self, query: &str) -> Result<(), AgentError> {
        if self.agent_id.is_empty() {
            return Err(AgentError::invalid_query("agent id must not be empty"));
        }
        if query.len() > RETRIEVAL_QUERY_BYTES_MAX {
            return Err(AgentError::invalid_query(format!(
                "query {} bytes exceeds max {RETRIEVAL_QUERY_BYTES_MAX}",
                query.len()
            )));
        }
        if self.limit > RETRIEVAL_RESULTS_COUNT_MAX {
            return Err(AgentError::invalid_query(format!(
                "limit {} exceeds max {RETRIEVAL_RESULTS_COUNT_MAX}",
                self.limit
            )));
        }
        Ok(())
    }
}

/// A candidate scored by one agent. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevantMemory {
    /// The record
    pub memory: MemoryRecord,
    /// Relevance in [0, 1]
    pub relevance_score: f64,
    /// Signals that fired, comma separated
    pub retrieval_reason: String,
    /// Fingerprint similarity in [0, 1]
    pub context_match: f64,
}

/// A record annotated by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMemory {
    /// The record, importance recomputed for the agent's domain
    pub record: MemoryRecord,
    /// Extracted entities (lowercase)
    pub entities: Vec<String>,
    /// Domain tags describing what was found
    pub semantic_tags: Vec<String>,
    /// Hints about relationships to people, concepts or outcomes
    pub relationship_hints: Vec<String>,
    /// Importance added by the agent
    pub importance_boost: f64,
}

/// A group of memories sharing a clustering key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryCluster {
    /// Clustering key (user, tag domain, outcome or time window)
    pub key: String,
    /// Member ids in input order
    pub memory_ids: Vec<String>,
    /// Entities present in every member
    pub shared_entities: Vec<String>,
    /// `|shared entities| / |all entities|`
    pub coherence: f64,
}

/// Two memories that mention the same entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRelationship {
    /// Earlier memory in input order
    pub source_id: String,
    /// Later memory in input order
    pub target_id: String,
    /// Entities both mention
    pub shared_entities: Vec<String>,
}

/// Something an agent noticed across memories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Agent that produced it
    pub agent: AgentKind,
    /// Human-readable finding
    pub description: String,
    /// Supporting memory ids
    pub evidence: Vec<String>,
    /// Fraction of the examined memories supporting it
    pub confidence: f64,
}

/// Result of organizing a set of memories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizedMemory {
    /// Clusters, ordered by key
    pub clusters: Vec<MemoryCluster>,
    /// Entity-sharing pairs
    pub relationships: Vec<MemoryRelationship>,
    /// Insights over the whole set
    pub insights: Vec<Insight>,
}

/// Aggregate retrieval performance fed back to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalPerformance {
    /// Mean relevance of recent results
    pub average_relevance: f64,
    /// Caller satisfaction in [0, 1]
    pub user_satisfaction: f64,
}

/// Multipliers applied by the scoring core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyWeights {
    /// Scales keyword bonuses
    pub keyword: f64,
    /// Scales the context-similarity bonus
    pub context: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            keyword: AGENT_STRATEGY_WEIGHT_DEFAULT,
            context: AGENT_STRATEGY_WEIGHT_DEFAULT,
        }
    }
}

// =============================================================================
// MemoryAgent Trait
// =============================================================================

/// A domain-specialised retrieval agent.
///
/// Object safe; the orchestrator holds agents as `Arc<dyn MemoryAgent>`.
#[async_trait]
pub trait MemoryAgent: Send + Sync {
    /// Which specialisation this is.
    fn kind(&self) -> AgentKind;

    /// Extract entities and recompute importance for this domain.
    fn process_memory(&self, record: MemoryRecord) -> ProcessedMemory;

    /// Score the agent's candidate pool against a query.
    ///
    /// Results are sorted by relevance descending, then id, and truncated
    /// to `context.limit`.
    ///
    /// # Errors
    /// Returns `AgentError::InvalidQuery` for a rejected context and
    /// `AgentError::Storage` when the candidate pool cannot be read.
    async fn retrieve_relevant(
        &self,
        query: &str,
        context: &RetrievalContext,
    ) -> Result<Vec<RelevantMemory>, AgentError>;

    /// Cluster memories and find relationships between them.
    fn organize_memories(&self, records: &[MemoryRecord]) -> OrganizedMemory;

    /// Summarise patterns across memories.
    fn generate_insights(&self, records: &[MemoryRecord]) -> Vec<Insight>;

    /// Update pattern effectiveness from caller feedback in [0, 1].
    fn learn_from_retrieval(&self, query: &str, results: &[RelevantMemory], feedback: f64);

    /// Nudge strategy weights when performance falls below thresholds.
    fn adapt_retrieval_strategy(&self, performance: &RetrievalPerformance);

    /// Current strategy weights.
    fn strategy(&self) -> StrategyWeights;

    /// Effectiveness of a query pattern (0.5 if never seen).
    fn pattern_effectiveness(&self, pattern: &str) -> f64;
}

// =============================================================================
// Shared organisation helpers
// =============================================================================

/// Build clusters from `(key, record index)` assignments and entity sets.
fn build_clusters(
    records: &[MemoryRecord],
    keys: &[Option<String>],
    entities: &[Vec<String>],
) -> Vec<MemoryCluster> {
    debug_assert_eq!(records.len(), keys.len());
    debug_assert_eq!(records.len(), entities.len());

    let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, key) in keys.iter().enumerate() {
        if let Some(key) = key {
            members.entry(key.as_str()).or_default().push(index);
        }
    }

    members
        .into_iter()
        .map(|(key, indexes)| {
            let sets: Vec<&Vec<String>> = indexes.iter().map(|&i| &entities[i]).collect();
            let (shared, coherence) = scoring::coherence(&sets);
            MemoryCluster {
                key: key.to_string(),
                memory_ids: indexes.iter().map(|&i| records[i].id.clone()).collect(),
                shared_entities: shared,
                coherence,
            }
        })
        .collect()
}

/// Pairs of records sharing at least one entity, in input order.
fn build_relationships(records: &[MemoryRecord], entities: &[Vec<String>]) -> Vec<MemoryRelationship> {
    let mut relationships = Vec::new();
    'outer: for i in 0..records.len() {
        for j in (i + 1)..records.len() {
            if relationships.len() == AGENT_RELATIONSHIPS_COUNT_MAX {
                break 'outer;
            }
            let shared: Vec<String> = entities[i]
                .iter()
                .filter(|entity| entities[j].contains(entity))
                .cloned()
                .collect();
            if !shared.is_empty() {
                relationships.push(MemoryRelationship {
                    source_id: records[i].id.clone(),
                    target_id: records[j].id.clone(),
                    shared_entities: shared,
                });
            }
        }
    }
    relationships
}

/// Insights for entities mentioned by at least two memories, most frequent
/// first.
fn frequent_entity_insights(
    agent: AgentKind,
    records: &[MemoryRecord],
    entities: &[Vec<String>],
    describe: impl Fn(&str, usize) -> String,
) -> Vec<Insight> {
    if records.is_empty() {
        return Vec::new();
    }
    let mut support: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (record, found) in records.iter().zip(entities) {
        for entity in found {
            let ids = support.entry(entity.as_str()).or_default();
            if !ids.contains(&record.id) {
                ids.push(record.id.clone());
            }
        }
    }

    let mut frequent: Vec<(&str, Vec<String>)> = support
        .into_iter()
        .filter(|(_, ids)| ids.len() >= AGENT_INSIGHT_SUPPORT_MIN)
        .collect();
    frequent.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    frequent
        .into_iter()
        .map(|(entity, evidence)| Insight {
            agent,
            description: describe(entity, evidence.len()),
            confidence: evidence.len() as f64 / records.len() as f64,
            evidence,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_domain_types() {
        assert_eq!(AgentKind::Social.domain_type(), MemoryType::Social);
        assert_eq!(AgentKind::Knowledge.domain_type(), MemoryType::Knowledge);
        assert_eq!(AgentKind::Experience.domain_type(), MemoryType::Experience);
        assert_eq!(AgentKind::all().len(), 3);
    }

    #[test]
    fn test_context_validation() {
        assert!(RetrievalContext::new("a1").validate("hello").is_ok());
        assert!(matches!(
            RetrievalContext::new("").validate("hello"),
            Err(AgentError::InvalidQuery { .. })
        ));
        let long = "x".repeat(RETRIEVAL_QUERY_BYTES_MAX + 1);
        assert!(RetrievalContext::new("a1").validate(&long).is_err());
        assert!(RetrievalContext::new("a1")
            .with_limit(RETRIEVAL_RESULTS_COUNT_MAX + 1)
            .validate("q")
            .is_err());
    }

    #[test]
    fn test_relationships_share_entities() {
        let records: Vec<MemoryRecord> = ["a", "b", "c"]
            .iter()
            .map(|id| MemoryRecord::builder("agent", MemoryType::Social, "x").id(*id).build())
            .collect();
        let entities = vec![
            vec!["alice".to_string()],
            vec!["bob".to_string(), "alice".to_string()],
            vec!["carol".to_string()],
        ];
        let relationships = build_relationships(&records, &entities);
        assert_eq!(relationships.len(), 1);
        assert_eq!(relationships[0].source_id, "a");
        assert_eq!(relationships[0].target_id, "b");
        assert_eq!(relationships[0].shared_entities, vec!["alice"]);
    }

    #[test]
    fn test_frequent_entity_insights() {
        let records: Vec<MemoryRecord> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| MemoryRecord::builder("agent", MemoryType::Social, "x").id(*id).build())
            .collect();
        let entities = vec![
            vec!["alice".to_string()],
            vec!["alice".to_string()],
            vec!["bob".to_string()],
            vec![],
        ];
        let insights =
            frequent_entity_insights(AgentKind::Social, &records, &entities, |e, n| format!("{e}:{n}"));
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].description, "alice:2");
        assert!((insights[0].confidence - 0.5).abs() < f64::EPSILON);
    }
}
