//! Data models for conversation compression

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Author role of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured block of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        source: serde_json::Value,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// Message content: plain text or a list of structured parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Flatten the content into a single string for estimation and scanning
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => text.clone(),
                    ContentPart::ToolResult { content, .. } => content.clone(),
                    other => serde_json::to_string(other).unwrap_or_default(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A single conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::Tool, content)
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    pub fn text(&self) -> String {
        self.content.to_text()
    }
}

/// Per-message bookkeeping kept in the compressor's metrics table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetric {
    pub estimated_tokens: usize,
    /// Retention priority (0.0-1.0)
    pub importance: f32,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
}

/// Breakdown of a message's importance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceScore {
    /// Position weight (0.0-0.4)
    pub recency: f32,
    pub role_weight: f32,
    pub keyword_bonus: f32,
    pub length_penalty: f32,
    /// Clamped total (0.0-1.0)
    pub total: f32,
}

impl ImportanceScore {
    pub fn new(recency: f32, role_weight: f32, keyword_bonus: f32, length_penalty: f32) -> Self {
        let mut score = Self {
            recency,
            role_weight,
            keyword_bonus,
            length_penalty,
            total: 0.0,
        };
        score.calculate_total();
        score
    }

    pub fn calculate_total(&mut self) {
        self.total = (self.recency + self.role_weight + self.keyword_bonus - self.length_penalty)
            .clamp(0.0, 1.0);
    }
}

/// Outcome figures of one `optimize` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionMetrics {
    pub original_tokens: usize,
    pub optimized_tokens: usize,
    /// `(original - optimized) / original`, 0 when nothing was removed
    pub compression_ratio: f64,
    pub original_count: usize,
    pub optimized_count: usize,
    pub summarized: bool,
}

/// Result of `ContextCompressor::optimize`
#[derive(Debug, Clone)]
pub struct OptimizedContext {
    pub optimized_messages: Vec<Message>,
    pub metrics: CompressionMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_flatten_to_text() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text {
                text: "read the file".to_string(),
            },
            ContentPart::ToolResult {
                tool_use_id: "t1".to_string(),
                content: "fn main() {}".to_string(),
            },
        ]);
        assert_eq!(content.to_text(), "read the file\nfn main() {}");
    }

    #[test]
    fn test_message_deserializes_both_content_shapes() {
        let plain: Message =
            serde_json::from_str(r#"{"role":"user","content":"hello"}"#).unwrap();
        assert_eq!(plain.text(), "hello");

        let parts: Message = serde_json::from_str(
            r#"{"role":"assistant","content":[{"type":"text","text":"hi"}]}"#,
        )
        .unwrap();
        assert_eq!(parts.role, Role::Assistant);
        assert_eq!(parts.text(), "hi");
    }

    #[test]
    fn test_importance_score_is_clamped() {
        let score = ImportanceScore::new(0.4, 0.3, 0.5, 0.0);
        assert_eq!(score.total, 1.0);

        let score = ImportanceScore::new(0.0, 0.0, 0.0, 0.1);
        assert_eq!(score.total, 0.0);
    }
}
