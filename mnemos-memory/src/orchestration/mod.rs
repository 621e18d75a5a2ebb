//! Orchestration - Multi-Agent Retrieval
//!
//! `TigerStyle`: Structured fan-out, pure synthesis, graceful degradation.
//!
//! # Flow
//!
//! ```text
//! query ──► select_agents ──► join_all(retrieve_relevant × N) ──► synthesize
//!                                   │ (optional per-agent timeout)      │
//!                                   ▼                                   ▼
//!                              AgentReport                 primary / contextual / related
//! ```
//!
//! A failing or timed-out agent contributes zero results and zero to the
//! confidence mean; the remaining agents still produce a result.

mod selection;
mod synthesis;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

pub use selection::select_agents;
pub use synthesis::{confidence, mean_relevance, quality, synthesize, Synthesis, SynthesizedMemory};

use crate::agents::{
    AgentError, AgentKind, ExperienceAgent, KnowledgeAgent, MemoryAgent, RelevantMemory,
    RetrievalContext, RetrievalPerformance, SocialAgent,
};
use crate::storage::StorageBackend;

// =============================================================================
// Result Types
// =============================================================================

/// What one selected agent contributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    /// The agent
    pub agent: AgentKind,
    /// Its results (empty on failure)
    pub results: Vec<RelevantMemory>,
    /// Mean relevance of its results (0 on failure or no results)
    pub mean_relevance: f64,
    /// Failure or timeout, if any
    pub error: Option<String>,
}

/// Outcome of an orchestrated retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratedResult {
    /// The query as asked
    pub query: String,
    /// Agents that were queried, in selection order
    pub agents_used: Vec<AgentKind>,
    /// Ranked, deduplicated results
    pub synthesis: Synthesis,
    /// Mean of per-agent mean relevances
    pub confidence: f64,
    /// Heuristic result quality
    pub quality: f64,
    /// Per-agent contributions
    pub agent_reports: Vec<AgentReport>,
}

impl OrchestratedResult {
    /// Top results.
    #[must_use]
    pub fn primary(&self) -> &[SynthesizedMemory] {
        &self.synthesis.primary
    }

    /// Whether any agent failed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.agent_reports.iter().any(|report| report.error.is_some())
    }
}

// =============================================================================
// MemoryOrchestrator
// =============================================================================

/// Fans a query out to specialised agents and synthesizes one ranking.
pub struct MemoryOrchestrator {
    agents: Vec<Arc<dyn MemoryAgent>>,
    agent_timeout: Option<Duration>,
}

impl MemoryOrchestrator {
    /// Create an orchestrator over the given agents.
    #[must_use]
    pub fn new(agents: Vec<Arc<dyn MemoryAgent>>) -> Self {
        Self {
            agents,
            agent_timeout: None,
        }
    }

    /// Social, knowledge and experience agents over one backend.
    #[must_use]
    pub fn with_default_agents(storage: Arc<dyn StorageBackend>) -> Self {
        Self::new(vec![
            Arc::new(SocialAgent::new(Arc::clone(&storage))),
            Arc::new(KnowledgeAgent::new(Arc::clone(&storage))),
            Arc::new(ExperienceAgent::new(storage)),
        ])
    }

    /// Bound each agent's retrieval; a timed-out agent contributes nothing.
    ///
    /// # Panics
    /// Panics if the timeout is zero.
    #[must_use]
    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        assert!(!timeout.is_zero(), "agent timeout must be positive");
        self.agent_timeout = Some(timeout);
        self
    }

    /// Kinds of the registered agents.
    #[must_use]
    pub fn agent_kinds(&self) -> Vec<AgentKind> {
        self.agents.iter().map(|agent| agent.kind()).collect()
    }

    /// Registered agents selected for a query, falling back to all of them
    /// when none of the selected kinds is registered.
    fn selected(&self, query: &str) -> Vec<Arc<dyn MemoryAgent>> {
        let kinds = select_agents(query);
        let selected: Vec<Arc<dyn MemoryAgent>> = kinds
            .iter()
            .flat_map(|kind| self.agents.iter().filter(move |agent| agent.kind() == *kind))
            .cloned()
            .collect();
        if selected.is_empty() {
            self.agents.clone()
        } else {
            selected
        }
    }

    async fn run_agent(
        &self,
        agent: &dyn MemoryAgent,
        query: &str,
        context: &RetrievalContext,
    ) -> Result<Vec<RelevantMemory>, String> {
        let retrieval = agent.retrieve_relevant(query, context);
        match self.agent_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, retrieval).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("timed out after {}ms", timeout.as_millis())),
            },
            None => retrieval.await.map_err(|e| e.to_string()),
        }
    }

    /// Query the selected agents concurrently and synthesize their results.
    ///
    /// # Errors
    /// Returns `AgentError::InvalidQuery` if the context is rejected. Agent
    /// failures never fail the call; they appear in `agent_reports`.
    #[tracing::instrument(skip(self, context), fields(agent_id = %context.agent_id))]
    pub async fn orchestrate(
        &self,
        query: &str,
        context: &RetrievalContext,
    ) -> Result<OrchestratedResult, AgentError> {
        context.validate(query)?;

        let agents = self.selected(query);
        let outcomes = join_all(
            agents
                .iter()
                .map(|agent| self.run_agent(agent.as_ref(), query, context)),
        )
        .await;

        let mut agent_reports = Vec::with_capacity(agents.len());
        for (agent, outcome) in agents.iter().zip(outcomes) {
            let report = match outcome {
                Ok(results) => AgentReport {
                    agent: agent.kind(),
                    mean_relevance: mean_relevance(&results),
                    results,
                    error: None,
                },
                Err(error) => {
                    tracing::warn!(agent = %agent.kind(), %error, "agent retrieval failed");
                    AgentReport {
                        agent: agent.kind(),
                        results: Vec::new(),
                        mean_relevance: 0.0,
                        error: Some(error),
                    }
                }
            };
            agent_reports.push(report);
        }

        let per_agent: Vec<(AgentKind, Vec<RelevantMemory>)> = agent_reports
            .iter()
            .map(|report| (report.agent, report.results.clone()))
            .collect();
        let synthesis = synthesize(&per_agent);
        let means: Vec<f64> = agent_reports.iter().map(|r| r.mean_relevance).collect();

        let result = OrchestratedResult {
            query: query.to_string(),
            agents_used: agents.iter().map(|agent| agent.kind()).collect(),
            confidence: confidence(&means),
            quality: quality(&synthesis),
            synthesis,
            agent_reports,
        };

        tracing::debug!(
            agents = result.agents_used.len(),
            results = result.synthesis.len(),
            confidence = result.confidence,
            "orchestrated retrieval complete"
        );
        Ok(result)
    }

    /// Forward caller feedback in [0, 1] to the agents that produced results.
    ///
    /// Each contributing agent learns pattern effectiveness from the query
    /// and adapts its strategy from its own mean relevance and the score.
    ///
    /// # Errors
    /// Returns `AgentError::InvalidFeedback` if score is outside [0, 1];
    /// no agent learns anything in that case.
    pub fn feedback(&self, result: &OrchestratedResult, score: f64) -> Result<(), AgentError> {
        if !(0.0..=1.0).contains(&score) {
            return Err(AgentError::InvalidFeedback { score });
        }

        for report in result.agent_reports.iter().filter(|r| !r.results.is_empty()) {
            for agent in self.agents.iter().filter(|a| a.kind() == report.agent) {
                agent.learn_from_retrieval(&result.query, &report.results, score);
                agent.adapt_retrieval_strategy(&RetrievalPerformance {
                    average_relevance: report.mean_relevance,
                    user_satisfaction: score,
                });
            }
        }
        Ok(())
    }
}
