//! Concept extraction on promotion to Semantic.

use crate::constants::{CONSOLIDATION_CONCEPTS_COUNT_MAX, CONSOLIDATION_CONCEPT_CHARS_MIN_EXCLUSIVE};

/// Up to five distinct lowercase tokens longer than four characters, in
/// order of first appearance.
#[must_use]
pub fn extract_concepts(content: &str) -> Vec<String> {
    let mut concepts: Vec<String> = Vec::new();
    for raw in content.split(|c: char| !c.is_alphanumeric()) {
        if concepts.len() == CONSOLIDATION_CONCEPTS_COUNT_MAX {
            break;
        }
        let token = raw.to_lowercase();
        if token.chars().count() > CONSOLIDATION_CONCEPT_CHARS_MIN_EXCLUSIVE
            && !concepts.contains(&token)
        {
            concepts.push(token);
        }
    }
    concepts
}
