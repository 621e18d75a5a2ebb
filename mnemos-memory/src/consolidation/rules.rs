//! Rule evaluation.

use chrono::{DateTime, Utc};

use crate::storage::MemoryRecord;
use crate::tier::{ConditionType, ConsolidationRule};

/// The value a rule condition reads from a record.
#[must_use]
pub fn signal(condition: ConditionType, record: &MemoryRecord, now: DateTime<Utc>) -> f64 {
    match condition {
        ConditionType::Importance => record.importance,
        ConditionType::Age => record.age_days(now),
        ConditionType::Emotional => record.emotional_valence(),
        ConditionType::AccessFrequency => record.metadata.access_count as f64,
    }
}

/// Whether a record satisfies a rule (inclusive threshold).
#[must_use]
pub fn is_satisfied(rule: &ConsolidationRule, record: &MemoryRecord, now: DateTime<Utc>) -> bool {
    signal(rule.condition, record, now) >= rule.threshold
}

/// First rule in `rules` the record satisfies.
#[must_use]
pub fn first_satisfied<'a>(
    rules: &'a [ConsolidationRule],
    record: &MemoryRecord,
    now: DateTime<Utc>,
) -> Option<&'a ConsolidationRule> {
    rules.iter().find(|rule| is_satisfied(rule, record, now))
}
