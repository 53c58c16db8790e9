//! Request classification into canonical categories
//!
//! Classification is a pure function over normalized text so detection
//! tables can change without touching matching or eviction.

use super::signature::contains_keyword;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical request categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestCategory {
    Help,
    Status,
    List,
    Info,
    Analyze,
    Review,
    Check,
    Create,
    Generate,
    Build,
    Run,
    Execute,
    Tool,
}

impl RequestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Status => "status",
            Self::List => "list",
            Self::Info => "info",
            Self::Analyze => "analyze",
            Self::Review => "review",
            Self::Check => "check",
            Self::Create => "create",
            Self::Generate => "generate",
            Self::Build => "build",
            Self::Run => "run",
            Self::Execute => "execute",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps normalized request text to a category
pub trait RequestClassifier: Send + Sync {
    fn classify(&self, normalized: &str) -> Option<RequestCategory>;
}

/// English and Chinese keyword table, checked in order
static DEFAULT_KEYWORDS: Lazy<Vec<(RequestCategory, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (RequestCategory::Help, vec!["help", "usage", "howto", "帮助", "怎么", "如何"]),
        (RequestCategory::Status, vec!["status", "progress", "state", "状态", "进度"]),
        (RequestCategory::List, vec!["list", "ls", "show", "enumerate", "列出", "列表"]),
        (RequestCategory::Info, vec!["info", "information", "version", "about", "信息", "版本"]),
        (RequestCategory::Analyze, vec!["analyze", "analyse", "analysis", "explain", "分析", "解释"]),
        (RequestCategory::Review, vec!["review", "audit", "inspect", "审查", "评审"]),
        (RequestCategory::Check, vec!["check", "verify", "validate", "lint", "检查", "验证"]),
        (RequestCategory::Create, vec!["create", "new", "add", "make", "创建", "新建"]),
        (RequestCategory::Generate, vec!["generate", "write", "scaffold", "生成", "编写"]),
        (RequestCategory::Build, vec!["build", "compile", "bundle", "构建", "编译"]),
        (RequestCategory::Run, vec!["run", "start", "launch", "运行", "启动"]),
        (RequestCategory::Execute, vec!["execute", "exec", "invoke", "执行"]),
        (RequestCategory::Tool, vec!["tool", "tools", "function", "工具", "调用"]),
    ]
});

/// Keyword-table classifier, matching via `contains_keyword`
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    table: Vec<(RequestCategory, Vec<String>)>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self {
            table: DEFAULT_KEYWORDS
                .iter()
                .map(|(category, words)| (*category, words.iter().map(|w| w.to_string()).collect()))
                .collect(),
        }
    }

    pub fn with_table(table: Vec<(RequestCategory, Vec<String>)>) -> Self {
        Self { table }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestClassifier for KeywordClassifier {
    fn classify(&self, normalized: &str) -> Option<RequestCategory> {
        self.table
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| contains_keyword(normalized, k)))
            .map(|(category, _)| *category)
    }
}
