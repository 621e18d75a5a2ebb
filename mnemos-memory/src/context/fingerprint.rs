//! Context fingerprints.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ExecutionContext;
use crate::constants::CONTEXT_PROJECTED_FIELDS_COUNT;

/// Canonical string form of a context projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextFingerprint(String);

impl ContextFingerprint {
    /// Borrow as str.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ContextFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ContextFingerprint> for String {
    fn from(fingerprint: ContextFingerprint) -> Self {
        fingerprint.0
    }
}

/// Fingerprint of the six projected fields.
///
/// Object keys are emitted in sorted order and extensions are sorted and
/// deduplicated, so equal projections always produce equal strings.
#[must_use]
pub fn generate_fingerprint(context: &ExecutionContext) -> ContextFingerprint {
    let mut extensions: Vec<&str> = context.active_extensions.iter().map(String::as_str).collect();
    extensions.sort_unstable();
    extensions.dedup();

    let projection = json!({
        "scope": context.scope,
        "agent_id": context.agent_id,
        "session_id": context.session_id,
        "environment": context.environment,
        "active_extensions": extensions,
        "emotional_state": context.emotional_state,
    });

    ContextFingerprint(projection.to_string())
}

/// Fraction of the six projected fields that are populated.
#[must_use]
pub fn richness(context: &ExecutionContext) -> f64 {
    let populated = [
        context.scope.is_some(),
        context.agent_id.is_some(),
        context.session_id.is_some(),
        !context.environment.is_empty(),
        !context.active_extensions.is_empty(),
        context.emotional_state.is_some(),
    ]
    .into_iter()
    .filter(|populated| *populated)
    .count();

    populated as f64 / CONTEXT_PROJECTED_FIELDS_COUNT as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let context = ExecutionContext::new()
            .with_scope("chat")
            .with_agent("agent-1")
            .with_env("region", "eu")
            .with_env("locale", "en");

        assert_eq!(generate_fingerprint(&context), generate_fingerprint(&context.clone()));
    }

    #[test]
    fn test_extension_order_irrelevant() {
        let a = ExecutionContext::new()
            .with_extension("search")
            .with_extension("calendar");
        let b = ExecutionContext::new()
            .with_extension("calendar")
            .with_extension("search")
            .with_extension("search");

        assert_eq!(generate_fingerprint(&a), generate_fingerprint(&b));
    }

    #[test]
    fn test_non_projected_fields_ignored() {
        let a = ExecutionContext::new().with_scope("chat").with_request_id("r-1");
        let b = ExecutionContext::new().with_scope("chat").with_request_id("r-2");

        assert_eq!(generate_fingerprint(&a), generate_fingerprint(&b));
    }

    #[test]
    fn test_projected_fields_change_fingerprint() {
        let a = ExecutionContext::new().with_session("s-1");
        let b = ExecutionContext::new().with_session("s-2");

        assert_ne!(generate_fingerprint(&a), generate_fingerprint(&b));
    }

    #[test]
    fn test_richness() {
        assert!(richness(&ExecutionContext::new()).abs() < f64::EPSILON);

        let half = ExecutionContext::new()
            .with_scope("chat")
            .with_agent("a")
            .with_env("k", "v");
        assert!((richness(&half) - 0.5).abs() < 1e-9);

        let full = half
            .with_session("s")
            .with_extension("x")
            .with_emotion("calm", 0.2, 0.1);
        assert!((richness(&full) - 1.0).abs() < 1e-9);
    }
}
