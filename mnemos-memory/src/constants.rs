//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`
//! Example: `WORKING_MEMORY_CAPACITY_COUNT_DEFAULT` (not `DEFAULT_WORKING_CAPACITY`)
//!
//! Every constant includes units in the name:
//! - _`BYTES_MAX` for size limits
//! - _`MS`/_`DAYS` for time durations
//! - _`COUNT_MAX` for quantity limits

// =============================================================================
// Record Limits
// =============================================================================

/// Maximum size of record content
pub const RECORD_CONTENT_BYTES_MAX: usize = 100_000; // 100KB

/// Maximum length of a record or agent id
pub const RECORD_ID_BYTES_MAX: usize = 256;

/// Maximum number of tags per record
pub const RECORD_TAGS_COUNT_MAX: usize = 64;

/// Minimum importance value
pub const RECORD_IMPORTANCE_MIN: f64 = 0.0;

/// Maximum importance value
pub const RECORD_IMPORTANCE_MAX: f64 = 1.0;

/// Default importance for new records
pub const RECORD_IMPORTANCE_DEFAULT: f64 = 0.5;

// =============================================================================
// Working Memory
// =============================================================================

/// Default number of items per agent in working memory (Miller's 7)
pub const WORKING_MEMORY_CAPACITY_COUNT_DEFAULT: usize = 7;

/// Attention lost by every other item on each insert
pub const WORKING_MEMORY_DECAY_RATE_DEFAULT: f64 = 0.1;

/// Evicted items above this attention are promoted instead of dropped
pub const WORKING_MEMORY_PROMOTION_ATTENTION_THRESHOLD: f64 = 0.5;

/// Attention of a freshly inserted or accessed item
pub const WORKING_MEMORY_ATTENTION_MAX: f64 = 1.0;

/// Attention floor
pub const WORKING_MEMORY_ATTENTION_MIN: f64 = 0.0;

// =============================================================================
// Tier Defaults
// =============================================================================

/// Episodic tier decay rate
pub const TIER_EPISODIC_DECAY_RATE: f64 = 0.05;

/// Semantic tier decay rate
pub const TIER_SEMANTIC_DECAY_RATE: f64 = 0.01;

/// Procedural tier capacity
pub const TIER_PROCEDURAL_CAPACITY_COUNT: usize = 100;

/// Working → Episodic importance threshold
pub const RULE_WORKING_TO_EPISODIC_IMPORTANCE: f64 = 0.3;

/// Episodic → Semantic importance threshold
pub const RULE_EPISODIC_TO_SEMANTIC_IMPORTANCE: f64 = 0.7;

/// Episodic → Semantic access count threshold
pub const RULE_EPISODIC_TO_SEMANTIC_ACCESS_COUNT: f64 = 3.0;

/// Episodic → Semantic emotional valence threshold
pub const RULE_EPISODIC_TO_SEMANTIC_EMOTIONAL: f64 = 0.8;

/// Semantic → Procedural access count threshold
pub const RULE_SEMANTIC_TO_PROCEDURAL_ACCESS_COUNT: f64 = 10.0;

// =============================================================================
// Consolidation
// =============================================================================

/// Maximum concepts extracted on promotion to Semantic
pub const CONSOLIDATION_CONCEPTS_COUNT_MAX: usize = 5;

/// Concept tokens must be longer than this many characters
pub const CONSOLIDATION_CONCEPT_CHARS_MIN_EXCLUSIVE: usize = 4;

/// Default fingerprint similarity for grouped consolidation
pub const CONSOLIDATION_SIMILARITY_THRESHOLD_DEFAULT: f64 = 0.7;

/// Maximum records examined per tier in one consolidation pass
pub const CONSOLIDATION_BATCH_COUNT_MAX: usize = 1_000;

/// Maximum retained consolidation history events
pub const CONSOLIDATION_HISTORY_COUNT_MAX: usize = 10_000;

// =============================================================================
// Context Ranking
// =============================================================================

/// Default weight of context similarity in the final score
pub const CONTEXT_RANKING_WEIGHT_DEFAULT: f64 = 0.3;

/// Recency boost decay constant in days
pub const CONTEXT_RECENCY_DECAY_DAYS: f64 = 30.0;

/// Default recency boost factor
pub const CONTEXT_RECENCY_FACTOR_DEFAULT: f64 = 0.1;

/// Default importance boost factor
pub const CONTEXT_IMPORTANCE_FACTOR_DEFAULT: f64 = 0.1;

/// Number of projected fields contributing to richness
pub const CONTEXT_PROJECTED_FIELDS_COUNT: usize = 6;

// =============================================================================
// Memory Agents
// =============================================================================

/// Base relevance score for every candidate
pub const AGENT_RELEVANCE_BASE: f64 = 0.5;

/// Minimum bonus per matching keyword
pub const AGENT_KEYWORD_BONUS_MIN: f64 = 0.1;

/// Bonus span scaled by pattern effectiveness
pub const AGENT_KEYWORD_BONUS_SPAN: f64 = 0.2;

/// Bonus when the memory type is the agent's domain type
pub const AGENT_DOMAIN_TYPE_BONUS: f64 = 0.1;

/// Candidate pool read from the backend per retrieval
pub const AGENT_CANDIDATE_POOL_COUNT: usize = 100;

/// Weight kept from the old effectiveness value on learning
pub const AGENT_LEARNING_RETAIN_WEIGHT: f64 = 0.9;

/// Weight given to new feedback on learning
pub const AGENT_LEARNING_FEEDBACK_WEIGHT: f64 = 0.1;

/// Effectiveness of a pattern never seen before
pub const AGENT_PATTERN_EFFECTIVENESS_DEFAULT: f64 = 0.5;

/// Below this average relevance the strategy is adapted
pub const AGENT_ADAPT_RELEVANCE_THRESHOLD: f64 = 0.7;

/// Below this satisfaction the strategy is adapted
pub const AGENT_ADAPT_SATISFACTION_THRESHOLD: f64 = 0.6;

/// Step applied to strategy weights on adaptation
pub const AGENT_ADAPT_STEP: f64 = 0.05;

/// Maximum strategy weight
pub const AGENT_STRATEGY_WEIGHT_MAX: f64 = 2.0;

/// Experience memories within this gap are temporally adjacent
pub const AGENT_TEMPORAL_ADJACENCY_MS: i64 = 3_600_000; // 1 hour

/// Bonus for a recorded platform, tag, outcome or importance signal
pub const AGENT_SIGNAL_BONUS: f64 = 0.1;

/// Bonus when a social memory is about the querying user
pub const AGENT_SAME_USER_BONUS: f64 = 0.3;

/// Bonus when an experience falls inside the query's time window
pub const AGENT_TEMPORAL_WINDOW_BONUS: f64 = 0.2;

/// Maximum importance boost from @mentions
pub const AGENT_MENTION_BOOST_MAX: f64 = 0.2;

/// Maximum bonus from context similarity (scaled by context weight)
pub const AGENT_CONTEXT_BONUS_MAX: f64 = 0.1;

/// Initial keyword and context strategy weight
pub const AGENT_STRATEGY_WEIGHT_DEFAULT: f64 = 1.0;

/// Maximum relationships reported by one organize pass
pub const AGENT_RELATIONSHIPS_COUNT_MAX: usize = 1_000;

/// Minimum occurrences before an entity is reported as an insight
pub const AGENT_INSIGHT_SUPPORT_MIN: usize = 2;

// =============================================================================
// Orchestrator
// =============================================================================

/// Results per output bucket (primary / contextual / related)
pub const ORCHESTRATOR_BUCKET_COUNT: usize = 5;

/// Base quality score
pub const ORCHESTRATOR_QUALITY_BASE: f64 = 0.5;

/// Quality bonus when any result was found
pub const ORCHESTRATOR_QUALITY_ANY_BONUS: f64 = 0.2;

/// Quality bonus per result-count milestone and for type diversity
pub const ORCHESTRATOR_QUALITY_STEP_BONUS: f64 = 0.1;

/// First result-count milestone
pub const ORCHESTRATOR_QUALITY_RESULTS_COUNT_LOW: usize = 5;

/// Second result-count milestone
pub const ORCHESTRATOR_QUALITY_RESULTS_COUNT_HIGH: usize = 10;

// =============================================================================
// Storage / Backend Gate
// =============================================================================

/// Default timeout for a single backend call
pub const BACKEND_TIMEOUT_MS_DEFAULT: u64 = 5_000;

/// Default bounded wait for a backend permit
pub const BACKEND_ACQUIRE_TIMEOUT_MS_DEFAULT: u64 = 1_000;

/// Default number of concurrent backend calls
pub const BACKEND_PERMITS_COUNT_DEFAULT: usize = 16;

/// Default retention for archival cleanup
pub const RETENTION_DAYS_DEFAULT: u32 = 90;

/// Default interval between maintenance ticks
pub const MAINTENANCE_INTERVAL_MS_DEFAULT: u64 = 300_000; // 5 minutes

/// Maximum number of retrieval results
pub const RETRIEVAL_RESULTS_COUNT_MAX: usize = 1_000;

/// Maximum length of a retrieval query
pub const RETRIEVAL_QUERY_BYTES_MAX: usize = 10_000;

// =============================================================================
// Embedding
// =============================================================================

/// Number of dimensions in simulated embeddings
pub const EMBEDDING_DIMENSIONS_COUNT: usize = 384;

/// Maximum batch size for embedding requests
pub const EMBEDDING_BATCH_SIZE_MAX: usize = 100;

// =============================================================================
// Time
// =============================================================================

/// Milliseconds per second
pub const TIME_MS_PER_SEC: u64 = 1_000;

/// Milliseconds per day
pub const TIME_MS_PER_DAY: i64 = 86_400_000;

// =============================================================================
// DST (Deterministic Simulation Testing) Limits
// =============================================================================

/// Maximum number of simulation steps
pub const DST_SIMULATION_STEPS_MAX: u64 = 1_000_000;

/// Maximum probability for fault injection (1.0 = 100%)
pub const DST_FAULT_PROBABILITY_MAX: f64 = 1.0;

/// Maximum time advance per step in milliseconds
pub const DST_TIME_ADVANCE_MS_MAX: u64 = 365 * 86_400_000; // 1 year

/// Maximum simulated latency in milliseconds
pub const DST_LATENCY_MS_MAX: u64 = 10_000;

// =============================================================================
// Telemetry
// =============================================================================

/// Default log filter when neither `MNEMOS_LOG` nor `RUST_LOG` is set
pub const TELEMETRY_FILTER_DEFAULT: &str = "info";
