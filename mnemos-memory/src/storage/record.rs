//! `MemoryRecord` - The Persisted Unit of Memory
//!
//! `TigerStyle`: Explicit types, validation, builder pattern.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};
use crate::constants::{
    RECORD_CONTENT_BYTES_MAX, RECORD_ID_BYTES_MAX, RECORD_IMPORTANCE_DEFAULT,
    RECORD_IMPORTANCE_MAX, RECORD_IMPORTANCE_MIN, RECORD_TAGS_COUNT_MAX, TIME_MS_PER_DAY,
};
use crate::tier::TierKind;

// =============================================================================
// MemoryType
// =============================================================================

/// Semantic type of a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// A stated fact
    Fact,
    /// Something that happened to the agent
    Experience,
    /// An interaction with another person
    Social,
    /// Distilled, general knowledge
    Knowledge,
    /// How to do something
    Procedure,
    /// Something observed
    Observation,
    /// An objective
    Goal,
}

impl MemoryType {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Experience => "experience",
            Self::Social => "social",
            Self::Knowledge => "knowledge",
            Self::Procedure => "procedure",
            Self::Observation => "observation",
            Self::Goal => "goal",
        }
    }

    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fact" => Some(Self::Fact),
            "experience" | "event" => Some(Self::Experience),
            "social" => Some(Self::Social),
            "knowledge" => Some(Self::Knowledge),
            "procedure" | "procedural" => Some(Self::Procedure),
            "observation" => Some(Self::Observation),
            "goal" => Some(Self::Goal),
            _ => None,
        }
    }

    /// All memory types.
    #[must_use]
    pub fn all() -> &'static [MemoryType] {
        &[
            Self::Fact,
            Self::Experience,
            Self::Social,
            Self::Knowledge,
            Self::Procedure,
            Self::Observation,
            Self::Goal,
        ]
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intended lifetime of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationClass {
    /// Short-term
    Short,
    /// Long-term
    #[default]
    Long,
}

// =============================================================================
// RecordMetadata
// =============================================================================

/// Signals read by consolidation rules and retrieval agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Emotional valence in [0, 1]
    pub emotional_valence: Option<f64>,
    /// How often the record has been accessed
    pub access_count: u64,
    /// User the memory is about
    pub user_id: Option<String>,
    /// Platform the memory came from
    pub platform: Option<String>,
    /// Recorded outcome (success, failure, ...)
    pub outcome: Option<String>,
    /// Context fingerprint captured at write time
    pub fingerprint: Option<String>,
}

// =============================================================================
// MemoryRecord
// =============================================================================

/// A memory persisted in the storage backend.
///
/// Records are keyed by `(agent_id, id)`; storing an existing key replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier within the agent
    pub id: String,
    /// Owning agent
    pub agent_id: String,
    /// Semantic type
    pub memory_type: MemoryType,
    /// Text content
    pub content: String,
    /// Embedding vector, if computed
    pub embedding: Option<Vec<f32>>,
    /// Importance in [0, 1]
    pub importance: f64,
    /// When the memory was formed
    pub timestamp: DateTime<Utc>,
    /// Ordered tag set
    pub tags: BTreeSet<String>,
    /// Short or long term
    pub duration: DurationClass,
    /// Hard expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Tier the record currently lives in
    pub tier: Option<TierKind>,
    /// Rule and agent signals
    #[serde(default)]
    pub metadata: RecordMetadata,
}

impl MemoryRecord {
    /// Create a builder.
    #[must_use]
    pub fn builder(
        agent_id: impl Into<String>,
        memory_type: MemoryType,
        content: impl Into<String>,
    ) -> MemoryRecordBuilder {
        MemoryRecordBuilder::new(agent_id.into(), memory_type, content.into())
    }

    /// Check record invariants.
    ///
    /// # Errors
    /// Returns `StorageError::Validation` describing the first violation.
    pub fn validate(&self) -> StorageResult<()> {
        if self.id.is_empty() {
            return Err(StorageError::validation("record id must not be empty"));
        }
        if self.id.len() > RECORD_ID_BYTES_MAX {
            return Err(StorageError::validation(format!(
                "record id {} bytes exceeds max {RECORD_ID_BYTES_MAX}",
                self.id.len()
            )));
        }
        if self.agent_id.is_empty() {
            return Err(StorageError::validation("agent id must not be empty"));
        }
        if self.content.trim().is_empty() {
            return Err(StorageError::validation("content must not be empty"));
        }
        if self.content.len() > RECORD_CONTENT_BYTES_MAX {
            return Err(StorageError::validation(format!(
                "content {} bytes exceeds max {RECORD_CONTENT_BYTES_MAX}",
                self.content.len()
            )));
        }
        if !(RECORD_IMPORTANCE_MIN..=RECORD_IMPORTANCE_MAX).contains(&self.importance) {
            return Err(StorageError::validation(format!(
                "importance {} outside [{RECORD_IMPORTANCE_MIN}, {RECORD_IMPORTANCE_MAX}]",
                self.importance
            )));
        }
        if self.tags.len() > RECORD_TAGS_COUNT_MAX {
            return Err(StorageError::validation(format!(
                "{} tags exceeds max {RECORD_TAGS_COUNT_MAX}",
                self.tags.len()
            )));
        }
        Ok(())
    }

    /// Age in fractional days relative to `now` (never negative).
    #[must_use]
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        let age_ms = (now - self.timestamp).num_milliseconds().max(0);
        age_ms as f64 / TIME_MS_PER_DAY as f64
    }

    /// Whether the record has passed its expiry.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Emotional valence, absent counting as 0.
    #[must_use]
    pub fn emotional_valence(&self) -> f64 {
        self.metadata.emotional_valence.unwrap_or(0.0)
    }

    /// Whether the record carries a tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

// =============================================================================
// MemoryRecordBuilder
// =============================================================================

/// Builder for `MemoryRecord` with fluent API.
#[derive(Debug)]
pub struct MemoryRecordBuilder {
    record: MemoryRecord,
}

impl MemoryRecordBuilder {
    fn new(agent_id: String, memory_type: MemoryType, content: String) -> Self {
        Self {
            record: MemoryRecord {
                id: uuid::Uuid::new_v4().to_string(),
                agent_id,
                memory_type,
                content,
                embedding: None,
                importance: RECORD_IMPORTANCE_DEFAULT,
                timestamp: Utc::now(),
                tags: BTreeSet::new(),
                duration: DurationClass::default(),
                expires_at: None,
                tier: None,
                metadata: RecordMetadata::default(),
            },
        }
    }

    /// Set an explicit id (default: random UUID v4).
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.record.id = id.into();
        self
    }

    /// Set importance.
    #[must_use]
    pub fn importance(mut self, importance: f64) -> Self {
        self.record.importance = importance;
        self
    }

    /// Set the formation time (default: wall clock now).
    #[must_use]
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.record.timestamp = timestamp;
        self
    }

    /// Add one tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.record.tags.insert(tag.into());
        self
    }

    /// Add several tags.
    #[must_use]
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.record.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Set the embedding.
    #[must_use]
    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.record.embedding = Some(embedding);
        self
    }

    /// Set the duration class.
    #[must_use]
    pub fn duration(mut self, duration: DurationClass) -> Self {
        self.record.duration = duration;
        self
    }

    /// Set the expiry.
    #[must_use]
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.record.expires_at = Some(at);
        self
    }

    /// Request an explicit tier.
    #[must_use]
    pub fn tier(mut self, tier: TierKind) -> Self {
        self.record.tier = Some(tier);
        self
    }

    /// Set emotional valence.
    #[must_use]
    pub fn emotional_valence(mut self, valence: f64) -> Self {
        self.record.metadata.emotional_valence = Some(valence);
        self
    }

    /// Set the access count.
    #[must_use]
    pub fn access_count(mut self, count: u64) -> Self {
        self.record.metadata.access_count = count;
        self
    }

    /// Set the user the memory is about.
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.record.metadata.user_id = Some(user_id.into());
        self
    }

    /// Set the source platform.
    #[must_use]
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.record.metadata.platform = Some(platform.into());
        self
    }

    /// Set the recorded outcome.
    #[must_use]
    pub fn outcome(mut self, outcome: impl Into<String>) -> Self {
        self.record.metadata.outcome = Some(outcome.into());
        self
    }

    /// Set the context fingerprint.
    #[must_use]
    pub fn fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.record.metadata.fingerprint = Some(fingerprint.into());
        self
    }

    /// Build the record. Validation happens on store.
    #[must_use]
    pub fn build(self) -> MemoryRecord {
        self.record
    }
}
