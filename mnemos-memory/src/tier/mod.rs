//! Tier Registry - Memory Tiers and Consolidation Rules
//!
//! `TigerStyle`: Static tier table, explicit thresholds.
//!
//! # Tiers
//!
//! ```text
//! Working ──(importance ≥ 0.3)──► Episodic ──(importance ≥ 0.7 | access ≥ 3 | emotional ≥ 0.8)──► Semantic
//!                                                                                                   │
//!                                                                     Procedural ◄──(access ≥ 10)──┘
//! ```
//!
//! Working is RAM only (see [`crate::memory::WorkingMemoryStore`]); the other
//! three tiers live in the storage backend.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    RULE_EPISODIC_TO_SEMANTIC_ACCESS_COUNT, RULE_EPISODIC_TO_SEMANTIC_EMOTIONAL,
    RULE_EPISODIC_TO_SEMANTIC_IMPORTANCE, RULE_SEMANTIC_TO_PROCEDURAL_ACCESS_COUNT,
    RULE_WORKING_TO_EPISODIC_IMPORTANCE, TIER_EPISODIC_DECAY_RATE,
    TIER_PROCEDURAL_CAPACITY_COUNT, TIER_SEMANTIC_DECAY_RATE,
    WORKING_MEMORY_CAPACITY_COUNT_DEFAULT, WORKING_MEMORY_DECAY_RATE_DEFAULT,
};
use crate::storage::MemoryType;

// =============================================================================
// TierKind
// =============================================================================

/// The four memory tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// Short-lived, bounded, RAM-only attention buffer
    Working,
    /// Events and experiences
    Episodic,
    /// Distilled facts and concepts
    Semantic,
    /// Skills and procedures
    Procedural,
}

impl TierKind {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
        }
    }

    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "working" => Some(Self::Working),
            "episodic" => Some(Self::Episodic),
            "semantic" => Some(Self::Semantic),
            "procedural" => Some(Self::Procedural),
            _ => None,
        }
    }

    /// All tiers in promotion order.
    #[must_use]
    pub fn all() -> &'static [TierKind] {
        &[
            Self::Working,
            Self::Episodic,
            Self::Semantic,
            Self::Procedural,
        ]
    }

    /// Whether records of this tier are persisted in the backend.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Self::Working)
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Consolidation Rules
// =============================================================================

/// Signal a consolidation rule compares against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Record importance (attention for working items)
    Importance,
    /// Record age in days
    Age,
    /// Emotional valence (absent counts as 0)
    Emotional,
    /// Number of recorded accesses
    AccessFrequency,
}

impl ConditionType {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Importance => "importance",
            Self::Age => "age",
            Self::Emotional => "emotional",
            Self::AccessFrequency => "access_frequency",
        }
    }
}

/// A rule moving memories from one tier to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationRule {
    /// Source tier
    pub from: TierKind,
    /// Target tier
    pub to: TierKind,
    /// Signal compared
    pub condition: ConditionType,
    /// Inclusive threshold
    pub threshold: f64,
}

impl ConsolidationRule {
    /// Create a rule.
    ///
    /// # Panics
    /// Panics if `from == to` or the threshold is negative or not finite.
    #[must_use]
    pub fn new(from: TierKind, to: TierKind, condition: ConditionType, threshold: f64) -> Self {
        assert_ne!(from, to, "rule must move between distinct tiers");
        assert!(
            threshold.is_finite() && threshold >= 0.0,
            "threshold must be finite and non-negative, got {threshold}"
        );
        Self {
            from,
            to,
            condition,
            threshold,
        }
    }

    /// Human readable reason recorded in the consolidation history.
    #[must_use]
    pub fn reason(&self) -> String {
        format!("{} >= {}", self.condition.as_str(), self.threshold)
    }
}

// =============================================================================
// Tier
// =============================================================================

/// Static description of one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    /// Which tier
    pub kind: TierKind,
    /// Capacity (Working and Procedural only)
    pub capacity: Option<usize>,
    /// Attention or relevance decay per event
    pub decay_rate: f64,
    /// Outgoing consolidation rules, evaluated in order
    pub rules: Vec<ConsolidationRule>,
}

// =============================================================================
// TierRegistry
// =============================================================================

/// Registry of the four tiers and their rules.
#[derive(Debug, Clone)]
pub struct TierRegistry {
    tiers: BTreeMap<TierKind, Tier>,
}

impl TierRegistry {
    /// Registry with the default tier table.
    #[must_use]
    pub fn new() -> Self {
        let working = Tier {
            kind: TierKind::Working,
            capacity: Some(WORKING_MEMORY_CAPACITY_COUNT_DEFAULT),
            decay_rate: WORKING_MEMORY_DECAY_RATE_DEFAULT,
            rules: vec![ConsolidationRule::new(
                TierKind::Working,
                TierKind::Episodic,
                ConditionType::Importance,
                RULE_WORKING_TO_EPISODIC_IMPORTANCE,
            )],
        };
        let episodic = Tier {
            kind: TierKind::Episodic,
            capacity: None,
            decay_rate: TIER_EPISODIC_DECAY_RATE,
            rules: vec![
                ConsolidationRule::new(
                    TierKind::Episodic,
                    TierKind::Semantic,
                    ConditionType::Importance,
                    RULE_EPISODIC_TO_SEMANTIC_IMPORTANCE,
                ),
                ConsolidationRule::new(
                    TierKind::Episodic,
                    TierKind::Semantic,
                    ConditionType::AccessFrequency,
                    RULE_EPISODIC_TO_SEMANTIC_ACCESS_COUNT,
                ),
                ConsolidationRule::new(
                    TierKind::Episodic,
                    TierKind::Semantic,
                    ConditionType::Emotional,
                    RULE_EPISODIC_TO_SEMANTIC_EMOTIONAL,
                ),
            ],
        };
        let semantic = Tier {
            kind: TierKind::Semantic,
            capacity: None,
            decay_rate: TIER_SEMANTIC_DECAY_RATE,
            rules: vec![ConsolidationRule::new(
                TierKind::Semantic,
                TierKind::Procedural,
                ConditionType::AccessFrequency,
                RULE_SEMANTIC_TO_PROCEDURAL_ACCESS_COUNT,
            )],
        };
        let procedural = Tier {
            kind: TierKind::Procedural,
            capacity: Some(TIER_PROCEDURAL_CAPACITY_COUNT),
            decay_rate: 0.0,
            rules: Vec::new(),
        };

        let tiers = [working, episodic, semantic, procedural]
            .into_iter()
            .map(|tier| (tier.kind, tier))
            .collect();

        Self { tiers }
    }

    /// Override working memory capacity.
    ///
    /// # Panics
    /// Panics if capacity is zero.
    #[must_use]
    pub fn with_working_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "working capacity must be positive");
        if let Some(tier) = self.tiers.get_mut(&TierKind::Working) {
            tier.capacity = Some(capacity);
        }
        self
    }

    /// Override working memory decay rate.
    ///
    /// # Panics
    /// Panics if the rate is outside [0, 1].
    #[must_use]
    pub fn with_working_decay_rate(mut self, decay_rate: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&decay_rate),
            "decay rate must be in [0, 1], got {decay_rate}"
        );
        if let Some(tier) = self.tiers.get_mut(&TierKind::Working) {
            tier.decay_rate = decay_rate;
        }
        self
    }

    /// Replace a tier definition.
    #[must_use]
    pub fn with_tier(mut self, tier: Tier) -> Self {
        debug_assert!(
            tier.rules.iter().all(|rule| rule.from == tier.kind),
            "rules must originate from their own tier"
        );
        self.tiers.insert(tier.kind, tier);
        self
    }

    /// Look up a tier.
    #[must_use]
    pub fn get(&self, kind: TierKind) -> Option<&Tier> {
        self.tiers.get(&kind)
    }

    /// Outgoing rules of a tier.
    #[must_use]
    pub fn rules_from(&self, kind: TierKind) -> &[ConsolidationRule] {
        self.tiers.get(&kind).map_or(&[], |tier| tier.rules.as_slice())
    }

    /// Capacity of a tier, if bounded.
    #[must_use]
    pub fn capacity(&self, kind: TierKind) -> Option<usize> {
        self.tiers.get(&kind).and_then(|tier| tier.capacity)
    }

    /// Decay rate of a tier.
    #[must_use]
    pub fn decay_rate(&self, kind: TierKind) -> f64 {
        self.tiers.get(&kind).map_or(0.0, |tier| tier.decay_rate)
    }

    /// Persisted tiers that have outgoing rules, in promotion order.
    pub fn persisted_tiers_with_rules(&self) -> impl Iterator<Item = &Tier> {
        self.tiers
            .values()
            .filter(|tier| tier.kind.is_persisted() && !tier.rules.is_empty())
    }

    /// Decide where a new record is placed.
    ///
    /// An explicit tier always wins. Otherwise procedures go to Procedural,
    /// facts and knowledge to Semantic, and everything else to Episodic.
    /// Records are never auto-placed in Working.
    #[must_use]
    pub fn placement_for(&self, memory_type: MemoryType, explicit: Option<TierKind>) -> TierKind {
        if let Some(tier) = explicit {
            return tier;
        }
        match memory_type {
            MemoryType::Procedure => TierKind::Procedural,
            MemoryType::Fact | MemoryType::Knowledge => TierKind::Semantic,
            MemoryType::Experience
            | MemoryType::Social
            | MemoryType::Observation
            | MemoryType::Goal => TierKind::Episodic,
        }
    }
}

impl Default for TierRegistry {
    fn default() -> Self {
        Self::new()
    }
}
