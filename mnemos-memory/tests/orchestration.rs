//! Integration Tests for Orchestrated Retrieval
//!
//! Agent selection, cross-agent synthesis and graceful degradation, using
//! the real agents over the simulated backend and scripted agents where
//! exact scores matter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mnemos_memory::agents::{
    AgentError, AgentKind, Insight, MemoryAgent, OrganizedMemory, ProcessedMemory,
    RelevantMemory, RetrievalContext, RetrievalPerformance, StrategyWeights,
};
use mnemos_memory::dst::{SimConfig, Simulation};
use mnemos_memory::{
    MemoryConfig, MemoryError, MemoryOrchestrator, MemoryRecord, MemoryType, StorageError,
};

// =============================================================================
// Scripted Agent
// =============================================================================

enum Script {
    Results(Vec<(&'static str, f64)>),
    Fail,
    Stall(Duration),
}

/// Agent returning fixed scores, counting the feedback it receives.
struct ScriptedAgent {
    kind: AgentKind,
    script: Script,
    learned: AtomicUsize,
}

impl ScriptedAgent {
    fn new(kind: AgentKind, script: Script) -> Arc<Self> {
        Arc::new(Self {
            kind,
            script,
            learned: AtomicUsize::new(0),
        })
    }

    fn results(&self, context: &RetrievalContext) -> Vec<RelevantMemory> {
        let Script::Results(scores) = &self.script else {
            return Vec::new();
        };
        scores
            .iter()
            .map(|(id, score)| RelevantMemory {
                memory: MemoryRecord::builder(
                    context.agent_id.clone(),
                    self.kind.domain_type(),
                    format!("memory {id}"),
                )
                .id(*id)
                .build(),
                relevance_score: *score,
                retrieval_reason: "scripted".to_string(),
                context_match: 0.0,
            })
            .collect()
    }
}

#[async_trait]
impl MemoryAgent for ScriptedAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    fn process_memory(&self, record: MemoryRecord) -> ProcessedMemory {
        ProcessedMemory {
            record,
            entities: Vec::new(),
            semantic_tags: Vec::new(),
            relationship_hints: Vec::new(),
            importance_boost: 0.0,
        }
    }

    async fn retrieve_relevant(
        &self,
        _query: &str,
        context: &RetrievalContext,
    ) -> Result<Vec<RelevantMemory>, AgentError> {
        match &self.script {
            Script::Results(_) => Ok(self.results(context)),
            Script::Fail => Err(StorageError::connection("scripted outage").into()),
            Script::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Vec::new())
            }
        }
    }

    fn organize_memories(&self, _records: &[MemoryRecord]) -> OrganizedMemory {
        OrganizedMemory::default()
    }

    fn generate_insights(&self, _records: &[MemoryRecord]) -> Vec<Insight> {
        Vec::new()
    }

    fn learn_from_retrieval(&self, _query: &str, _results: &[RelevantMemory], _feedback: f64) {
        self.learned.fetch_add(1, Ordering::SeqCst);
    }

    fn adapt_retrieval_strategy(&self, _performance: &RetrievalPerformance) {}

    fn strategy(&self) -> StrategyWeights {
        StrategyWeights::default()
    }

    fn pattern_effectiveness(&self, _pattern: &str) -> f64 {
        0.5
    }
}

fn orchestrator(agents: &[Arc<ScriptedAgent>]) -> MemoryOrchestrator {
    MemoryOrchestrator::new(
        agents
            .iter()
            .map(|agent| Arc::clone(agent) as Arc<dyn MemoryAgent>)
            .collect(),
    )
}

// =============================================================================
// Selection
// =============================================================================

#[tokio::test]
async fn test_friend_conversation_selects_social_only() {
    let env = Simulation::new(SimConfig::with_seed(42)).build();
    let memory = env.provider(MemoryConfig::default());
    let chat = MemoryRecord::builder("a1", MemoryType::Social, "Long conversation with Priya about moving")
        .id("s1")
        .user_id("u1")
        .build();
    let fact = MemoryRecord::builder("a1", MemoryType::Knowledge, "Moving boxes hold 40 litres")
        .id("k1")
        .build();
    memory.store("a1", chat).await.unwrap();
    memory.store("a1", fact).await.unwrap();

    let context = RetrievalContext::new("a1").with_user("u1");
    let result = memory
        .orchestrate("tell me about my friend's conversation", &context)
        .await
        .unwrap();

    assert_eq!(result.agents_used, vec![AgentKind::Social]);
    assert_eq!(result.primary()[0].memory.id, "s1");
    assert!(!result.is_degraded());
}

// =============================================================================
// Synthesis
// =============================================================================

#[tokio::test]
async fn test_agreement_outranks_single_higher_score() {
    let social = ScriptedAgent::new(
        AgentKind::Social,
        Script::Results(vec![("m1", 0.6), ("m2", 0.9)]),
    );
    let knowledge = ScriptedAgent::new(AgentKind::Knowledge, Script::Results(vec![("m1", 0.8)]));
    let orchestrator = orchestrator(&[social, knowledge]);

    let result = orchestrator
        .orchestrate("pizza toppings", &RetrievalContext::new("a1"))
        .await
        .unwrap();

    let order: Vec<&str> = result.primary().iter().map(|m| m.memory.id.as_str()).collect();
    assert_eq!(order, vec!["m1", "m2"]);
    assert_eq!(result.primary()[0].hits, 2);
    assert!((result.primary()[0].average_score() - 0.7).abs() < 1e-9);
}

#[tokio::test]
async fn test_feedback_reaches_only_contributing_agents() {
    let social = ScriptedAgent::new(AgentKind::Social, Script::Results(vec![("m1", 0.7)]));
    let knowledge = ScriptedAgent::new(AgentKind::Knowledge, Script::Results(Vec::new()));
    let orchestrator = orchestrator(&[Arc::clone(&social), Arc::clone(&knowledge)]);

    let result = orchestrator
        .orchestrate("pizza toppings", &RetrievalContext::new("a1"))
        .await
        .unwrap();
    orchestrator.feedback(&result, 0.9).unwrap();

    assert_eq!(social.learned.load(Ordering::SeqCst), 1);
    assert_eq!(knowledge.learned.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_out_of_range_feedback_is_rejected() {
    let social = ScriptedAgent::new(AgentKind::Social, Script::Results(vec![("m1", 0.7)]));
    let orchestrator = orchestrator(&[Arc::clone(&social)]);

    let result = orchestrator
        .orchestrate("pizza toppings", &RetrievalContext::new("a1"))
        .await
        .unwrap();

    for score in [1.5, -0.1, f64::NAN] {
        let err = orchestrator.feedback(&result, score).unwrap_err();
        assert!(MemoryError::from(err).is_validation());
    }
    assert_eq!(social.learned.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Degradation
// =============================================================================

#[tokio::test]
async fn test_failing_agent_degrades_result() {
    let social = ScriptedAgent::new(
        AgentKind::Social,
        Script::Results(vec![("m1", 0.6), ("m2", 0.9)]),
    );
    let broken = ScriptedAgent::new(AgentKind::Knowledge, Script::Fail);
    let orchestrator = orchestrator(&[social, broken]);

    let result = orchestrator
        .orchestrate("pizza toppings", &RetrievalContext::new("a1"))
        .await
        .unwrap();

    assert!(result.is_degraded());
    assert_eq!(result.synthesis.len(), 2);
    // Failed agent counts as zero: (0.75 + 0.0) / 2
    assert!((result.confidence - 0.375).abs() < 1e-9);
    let failed = result
        .agent_reports
        .iter()
        .find(|r| r.agent == AgentKind::Knowledge)
        .unwrap();
    assert!(failed.error.as_deref().unwrap().contains("scripted outage"));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_agent_times_out() {
    let social = ScriptedAgent::new(AgentKind::Social, Script::Results(vec![("m1", 0.8)]));
    let stalled = ScriptedAgent::new(AgentKind::Experience, Script::Stall(Duration::from_secs(30)));
    let orchestrator = orchestrator(&[social, stalled]).with_agent_timeout(Duration::from_millis(200));

    let result = orchestrator
        .orchestrate("pizza toppings", &RetrievalContext::new("a1"))
        .await
        .unwrap();

    assert_eq!(result.primary().len(), 1);
    let timed_out = result
        .agent_reports
        .iter()
        .find(|r| r.agent == AgentKind::Experience)
        .unwrap();
    assert_eq!(timed_out.error.as_deref(), Some("timed out after 200ms"));
}

#[tokio::test]
async fn test_provider_agent_timeout_from_config() {
    let env = Simulation::new(SimConfig::with_seed(42)).build();
    let memory = env.provider(MemoryConfig::default().with_agent_timeout(Duration::from_secs(5)));

    let result = memory
        .orchestrate("what happened", &RetrievalContext::new("a1"))
        .await
        .unwrap();

    assert_eq!(result.agents_used, vec![AgentKind::Knowledge, AgentKind::Experience]);
    assert!(result.synthesis.is_empty());
    assert!(!result.is_degraded());
    assert!(memory.known_agents().contains(&"a1".to_string()));
}
