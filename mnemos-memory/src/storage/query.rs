//! Retrieval query sentinels.

use crate::tier::TierKind;

/// Words too common to count as a match.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "were", "you", "your",
    "about", "into", "have", "has", "had", "not", "but", "all", "any", "can", "our", "out",
];

/// Minimum length of a significant token.
const TOKEN_CHARS_MIN: usize = 3;

/// Parsed form of the `query` string accepted by `StorageBackend::retrieve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalQuery {
    /// Newest first
    Recent,
    /// Highest importance first
    Important,
    /// Short-term records, newest first
    ShortTerm,
    /// Long-term records, newest first
    LongTerm,
    /// Records in one tier, newest first
    Tier(TierKind),
    /// Free-text keyword match
    Text(String),
}

impl RetrievalQuery {
    /// Parse a query string.
    ///
    /// `recent`, `important`, `short_term`, `long_term` and `tier:<name>` are
    /// sentinels; anything else (including an unknown tier name) is free text.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let trimmed = query.trim();
        match trimmed.to_lowercase().as_str() {
            "recent" => return Self::Recent,
            "important" => return Self::Important,
            "short_term" => return Self::ShortTerm,
            "long_term" => return Self::LongTerm,
            _ => {}
        }
        if let Some(name) = trimmed.strip_prefix("tier:") {
            if let Some(tier) = TierKind::parse(name) {
                return Self::Tier(tier);
            }
        }
        Self::Text(trimmed.to_string())
    }

    /// Operation name used for logging and fault injection.
    #[must_use]
    pub fn operation_name(&self) -> &'static str {
        match self {
            Self::Recent => "retrieve:recent",
            Self::Important => "retrieve:important",
            Self::ShortTerm => "retrieve:short_term",
            Self::LongTerm => "retrieve:long_term",
            Self::Tier(_) => "retrieve:tier",
            Self::Text(_) => "retrieve:text",
        }
    }
}

/// Lowercased alphanumeric tokens of at least three characters, minus
/// stopwords, in order of first appearance and without duplicates.
#[must_use]
pub fn significant_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for raw in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        let token = raw.to_lowercase();
        if token.chars().count() < TOKEN_CHARS_MIN || STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}
