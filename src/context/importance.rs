//! Message retention scoring

use super::models::{ImportanceScore, Message, Role};
use crate::cache::signature::{contains_keyword, normalize};

/// Words that mark a message as worth keeping across compression
const HIGH_SIGNAL_KEYWORDS: &[&str] = &[
    "error",
    "bug",
    "fix",
    "important",
    "todo",
    "decision",
    "requirement",
    "must",
    "critical",
    "remember",
];

/// Keyword hits beyond this count add nothing
const MAX_KEYWORD_MATCHES: usize = 4;
const KEYWORD_WEIGHT: f32 = 0.05;
const RECENCY_WEIGHT: f32 = 0.4;
const LONG_MESSAGE_CHARS: usize = 5000;
const LONG_MESSAGE_PENALTY: f32 = 0.1;

/// Scores a message's retention priority within its conversation
#[derive(Debug, Clone)]
pub struct ImportanceScorer {
    keywords: Vec<String>,
}

impl ImportanceScorer {
    pub fn new() -> Self {
        Self::with_keywords(HIGH_SIGNAL_KEYWORDS.iter().map(|k| k.to_string()).collect())
    }

    /// Use a custom keyword list (matched case-insensitively)
    pub fn with_keywords(keywords: Vec<String>) -> Self {
        Self {
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn role_weight(role: Role) -> f32 {
        match role {
            Role::System => 0.3,
            Role::User => 0.2,
            Role::Assistant | Role::Tool => 0.1,
        }
    }

    /// Number of distinct keywords the text contains as whole words
    pub fn keyword_matches(&self, text: &str) -> usize {
        let normalized = normalize(text);
        self.keywords
            .iter()
            .filter(|k| contains_keyword(&normalized, k))
            .count()
    }

    /// Score the message at `index` of a conversation of `total` messages
    pub fn score(&self, message: &Message, index: usize, total: usize) -> ImportanceScore {
        let text = message.text();
        let recency = if total == 0 {
            0.0
        } else {
            RECENCY_WEIGHT * (total.saturating_sub(index)) as f32 / total as f32
        };
        let keyword_bonus =
            KEYWORD_WEIGHT * self.keyword_matches(&text).min(MAX_KEYWORD_MATCHES) as f32;
        let length_penalty = if text.chars().count() > LONG_MESSAGE_CHARS {
            LONG_MESSAGE_PENALTY
        } else {
            0.0
        };

        ImportanceScore::new(
            recency,
            Self::role_weight(message.role),
            keyword_bonus,
            length_penalty,
        )
    }
}

impl Default for ImportanceScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_weights() {
        let scorer = ImportanceScorer::new();
        let system = scorer.score(&Message::system("rules"), 0, 1);
        let user = scorer.score(&Message::user("hello"), 0, 1);
        let assistant = scorer.score(&Message::assistant("hello"), 0, 1);
        assert!(system.total > user.total);
        assert!(user.total > assistant.total);
    }

    #[test]
    fn test_recency_weight_by_position() {
        let scorer = ImportanceScorer::new();
        let msg = Message::user("plain text");
        let early = scorer.score(&msg, 0, 10);
        let late = scorer.score(&msg, 9, 10);
        // Index 0 of 10 gets the full recency weight
        assert!((early.recency - 0.4).abs() < 1e-6);
        assert!((late.recency - 0.04).abs() < 1e-6);
    }

    #[test]
    fn test_keyword_bonus_is_capped() {
        let scorer = ImportanceScorer::new();
        let text = "error bug fix important todo decision critical";
        assert_eq!(scorer.keyword_matches(text), 7);
        let score = scorer.score(&Message::user(text), 0, 1);
        assert!((score.keyword_bonus - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_keywords_inside_longer_words_do_not_count() {
        let scorer = ImportanceScorer::new();
        assert_eq!(scorer.keyword_matches("update the prefix and run the debugger"), 0);
        assert_eq!(scorer.keyword_matches("Fix: the bug is critical!"), 3);
    }

    #[test]
    fn test_long_message_penalty() {
        let scorer = ImportanceScorer::new();
        let score = scorer.score(&Message::assistant("x".repeat(5001)), 0, 1);
        assert!((score.length_penalty - 0.1).abs() < 1e-6);
        assert!(score.total >= 0.0 && score.total <= 1.0);
    }
}
