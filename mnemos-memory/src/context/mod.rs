//! Context - Execution Context Fingerprinting and Ranking
//!
//! `TigerStyle`: Pure functions, deterministic output.
//!
//! An [`ExecutionContext`] describes where a memory is formed or recalled
//! (scope, agent, session, environment, extensions, mood). Six of its
//! fields are projected into a canonical JSON string, the fingerprint.
//! Fingerprints are compared by edit distance, never by deep equality, so
//! near-identical contexts still score as similar.

mod fingerprint;
mod ranking;
mod similarity;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use fingerprint::{generate_fingerprint, richness, ContextFingerprint};
pub use ranking::{apply_boosts, apply_contextual_ranking, BoostFactors, ContextAwareRanker, ScoredMemory};
pub use similarity::{levenshtein, similarity};

/// Emotional state attached to a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    /// Dominant emotion label (e.g. "calm", "frustrated")
    pub label: String,
    /// Valence in [-1, 1]
    pub valence: f64,
    /// Arousal in [0, 1]
    pub arousal: f64,
}

/// Where and how a memory operation happens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Logical scope (e.g. "chat", "task:deploy")
    pub scope: Option<String>,
    /// Acting agent
    pub agent_id: Option<String>,
    /// Conversation or run session
    pub session_id: Option<String>,
    /// Environment key/values
    pub environment: BTreeMap<String, String>,
    /// Enabled extensions (order irrelevant)
    pub active_extensions: Vec<String>,
    /// Emotional state
    pub emotional_state: Option<EmotionalState>,
    /// Per-request id, not part of the fingerprint
    pub request_id: Option<String>,
    /// When the operation started, not part of the fingerprint
    pub started_at: Option<DateTime<Utc>>,
}

impl ExecutionContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the agent.
    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Set the session.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Add an environment entry.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Add an active extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.active_extensions.push(extension.into());
        self
    }

    /// Set the emotional state.
    #[must_use]
    pub fn with_emotion(mut self, label: impl Into<String>, valence: f64, arousal: f64) -> Self {
        self.emotional_state = Some(EmotionalState {
            label: label.into(),
            valence,
            arousal,
        });
        self
    }

    /// Set the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Fingerprint of this context.
    #[must_use]
    pub fn fingerprint(&self) -> ContextFingerprint {
        generate_fingerprint(self)
    }
}
