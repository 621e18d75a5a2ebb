//! Keyword-based agent selection.

use crate::agents::AgentKind;

const SOCIAL_KEYWORDS: &[&str] = &["friend", "talk", "conversation", "chat", "said", "told"];
const KNOWLEDGE_KEYWORDS: &[&str] = &["fact", "how", "what", "definition", "explain", "why"];
const EXPERIENCE_KEYWORDS: &[&str] = &["experience", "happened", "remember", "did", "tried", "when"];

fn keywords(kind: AgentKind) -> &'static [&'static str] {
    match kind {
        AgentKind::Social => SOCIAL_KEYWORDS,
        AgentKind::Knowledge => KNOWLEDGE_KEYWORDS,
        AgentKind::Experience => EXPERIENCE_KEYWORDS,
    }
}

/// Agents whose domain keywords appear as whole words in the query.
///
/// When nothing matches every agent is selected. Order follows
/// [`AgentKind::all`].
#[must_use]
pub fn select_agents(query: &str) -> Vec<AgentKind> {
    let lowered = query.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let selected: Vec<AgentKind> = AgentKind::all()
        .iter()
        .copied()
        .filter(|kind| keywords(*kind).iter().any(|keyword| words.contains(keyword)))
        .collect();

    if selected.is_empty() {
        AgentKind::all().to_vec()
    } else {
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_social_only() {
        assert_eq!(
            select_agents("tell me about my friend's conversation"),
            vec![AgentKind::Social]
        );
    }

    #[test]
    fn test_multiple_domains() {
        assert_eq!(
            select_agents("What happened when we talked?"),
            vec![AgentKind::Knowledge, AgentKind::Experience]
        );
    }

    #[test]
    fn test_whole_words_only() {
        // "chatter" and "somehow" must not match "chat" and "how"
        assert_eq!(select_agents("chatter somehow"), AgentKind::all().to_vec());
    }

    #[test]
    fn test_no_match_selects_all() {
        assert_eq!(select_agents("pizza toppings"), AgentKind::all().to_vec());
        assert_eq!(select_agents(""), AgentKind::all().to_vec());
    }
}
