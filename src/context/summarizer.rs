//! Summary generation for collapsed conversation spans

use super::models::Message;
use crate::cache::signature::{contains_keyword, normalize};

/// Prefix every synthetic summary message starts with
pub const SUMMARY_PREFIX: &str = "[CONTEXT SUMMARY]";

/// Summarizer trait for different summarization strategies
///
/// Implementations must stay synchronous and infallible: the compressor
/// calls them on its fallback path.
pub trait Summarizer: Send + Sync {
    /// Build one system message standing in for `span`
    fn summarize(&self, span: &[Message]) -> Message;
}

/// Action categories detected in a collapsed span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    FileOperations,
    BugFixing,
    FeatureDevelopment,
    Testing,
}

impl ActionCategory {
    pub const ALL: [ActionCategory; 4] = [
        Self::FileOperations,
        Self::BugFixing,
        Self::FeatureDevelopment,
        Self::Testing,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::FileOperations => "file operations",
            Self::BugFixing => "bug fixing",
            Self::FeatureDevelopment => "feature development",
            Self::Testing => "testing",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::FileOperations => &[
                "file", "read", "write", "edit", "directory", "path", "文件",
            ],
            Self::BugFixing => &["bug", "fix", "error", "issue", "debug", "错误", "修复"],
            Self::FeatureDevelopment => &[
                "feature", "implement", "add", "develop", "功能", "实现",
            ],
            Self::Testing => &["test", "assert", "coverage", "测试"],
        }
    }

    fn matches(&self, normalized: &str) -> bool {
        self.keywords().iter().any(|k| contains_keyword(normalized, k))
    }
}

/// Keyword-driven summarizer naming the kinds of work in a span
#[derive(Debug, Clone, Default)]
pub struct ActionCategorySummarizer;

impl ActionCategorySummarizer {
    /// Categories present anywhere in the span, in fixed order
    pub fn detect(span: &[Message]) -> Vec<ActionCategory> {
        let normalized: Vec<String> = span.iter().map(|m| normalize(&m.text())).collect();
        ActionCategory::ALL
            .into_iter()
            .filter(|category| normalized.iter().any(|text| category.matches(text)))
            .collect()
    }
}

impl Summarizer for ActionCategorySummarizer {
    fn summarize(&self, span: &[Message]) -> Message {
        let categories = Self::detect(span);
        let topics = if categories.is_empty() {
            "general discussion".to_string()
        } else {
            categories
                .iter()
                .map(|c| c.label())
                .collect::<Vec<_>>()
                .join(", ")
        };

        Message::system(format!(
            "{} {} earlier messages were condensed. Topics covered: {}.",
            SUMMARY_PREFIX,
            span.len(),
            topics
        ))
    }
}
