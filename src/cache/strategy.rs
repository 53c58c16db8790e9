//! Caching strategies and their eligibility conditions

use super::classifier::RequestCategory;
use crate::error::{ContextError, Result};
use chrono::Duration;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What a condition inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    ContentLength,
    RequestType,
    UserPattern,
    Frequency,
    /// Unrecognized type from configuration; never matches
    #[serde(other)]
    Unknown,
}

/// How a condition compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
    Regex,
    #[serde(other)]
    Unknown,
}

/// Comparison operand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

/// One eligibility test; all conditions of a strategy must hold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub value: ConditionValue,
    pub operator: ConditionOperator,
    /// Regex operand, compiled on first use; `None` when invalid
    #[serde(skip)]
    pattern: OnceCell<Option<Regex>>,
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.condition_type == other.condition_type
            && self.operator == other.operator
            && self.value == other.value
    }
}

impl Condition {
    pub fn new(
        condition_type: ConditionType,
        operator: ConditionOperator,
        value: ConditionValue,
    ) -> Self {
        Self {
            condition_type,
            value,
            operator,
            pattern: OnceCell::new(),
        }
    }

    fn pattern(&self) -> Option<&Regex> {
        self.pattern
            .get_or_init(|| match &self.value {
                ConditionValue::Text(pattern) => match Regex::new(pattern) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!("Invalid condition regex '{}': {}", pattern, e);
                        None
                    }
                },
                _ => None,
            })
            .as_ref()
    }

    /// Evaluate against request facts; anything unrecognized fails closed
    pub fn evaluate(&self, facts: &RequestFacts) -> bool {
        match self.condition_type {
            ConditionType::ContentLength => self.compare_number(facts.content_length as f64),
            ConditionType::Frequency => self.compare_number(facts.frequency as f64),
            ConditionType::RequestType => match facts.request_type {
                Some(category) => self.compare_text(category.as_str()),
                None => false,
            },
            ConditionType::UserPattern => self.compare_text(&facts.normalized),
            ConditionType::Unknown => {
                debug!("Unknown condition type, treating as non-match");
                false
            }
        }
    }

    fn compare_number(&self, actual: f64) -> bool {
        let expected = match &self.value {
            ConditionValue::Number(n) => *n,
            ConditionValue::Text(t) => match t.trim().parse::<f64>() {
                Ok(n) => n,
                Err(_) => return false,
            },
            ConditionValue::List(_) => return false,
        };

        match self.operator {
            ConditionOperator::Equals => (actual - expected).abs() < f64::EPSILON,
            ConditionOperator::GreaterThan => actual > expected,
            ConditionOperator::LessThan => actual < expected,
            _ => false,
        }
    }

    fn compare_text(&self, actual: &str) -> bool {
        match (self.operator, &self.value) {
            (ConditionOperator::Equals, ConditionValue::Text(t)) => actual == t.to_lowercase(),
            (ConditionOperator::Equals, ConditionValue::List(items)) => {
                items.iter().any(|t| actual == t.to_lowercase())
            }
            (ConditionOperator::Contains, ConditionValue::Text(t)) => {
                actual.contains(&t.to_lowercase())
            }
            (ConditionOperator::Contains, ConditionValue::List(items)) => {
                items.iter().any(|t| actual.contains(&t.to_lowercase()))
            }
            (ConditionOperator::Regex, ConditionValue::Text(_)) => {
                self.pattern().map_or(false, |re| re.is_match(actual))
            }
            _ => false,
        }
    }
}

/// Facts about one request that conditions are evaluated against
#[derive(Debug, Clone)]
pub struct RequestFacts {
    /// Length of the raw content in characters
    pub content_length: usize,
    pub request_type: Option<RequestCategory>,
    pub normalized: String,
    /// Times this normalized request has been observed
    pub frequency: u64,
}

/// A named, independently configurable caching policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub max_age_secs: u64,
    pub max_size: usize,
    pub similarity_threshold: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

fn default_enabled() -> bool {
    true
}

impl Strategy {
    /// Entry lifetime; values past chrono's range never expire
    pub fn max_age(&self) -> Duration {
        i64::try_from(self.max_age_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Reject limits that would break matching or the size bound
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ContextError::Configuration(
                "strategy name must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ContextError::Configuration(format!(
                "similarity threshold {} for '{}' outside 0.0-1.0",
                self.similarity_threshold, self.name
            )));
        }
        if self.max_size == 0 {
            return Err(ContextError::Configuration(format!(
                "strategy '{}' needs max_size > 0",
                self.name
            )));
        }
        Ok(())
    }

    /// True when every condition holds
    pub fn matches(&self, facts: &RequestFacts) -> bool {
        self.conditions.iter().all(|c| c.evaluate(facts))
    }
}

fn category_list(categories: &[RequestCategory]) -> ConditionValue {
    ConditionValue::List(categories.iter().map(|c| c.as_str().to_string()).collect())
}

/// Built-in strategy registry, in evaluation order
pub fn default_strategies() -> Vec<Strategy> {
    vec![
        Strategy {
            name: "simple-command".to_string(),
            enabled: true,
            max_age_secs: 3600,
            max_size: 100,
            similarity_threshold: 0.9,
            tags: vec!["command".to_string()],
            conditions: vec![
                Condition::new(
                    ConditionType::ContentLength,
                    ConditionOperator::LessThan,
                    ConditionValue::Number(100.0),
                ),
                Condition::new(
                    ConditionType::RequestType,
                    ConditionOperator::Equals,
                    category_list(&[
                        RequestCategory::Help,
                        RequestCategory::Status,
                        RequestCategory::List,
                        RequestCategory::Info,
                    ]),
                ),
            ],
        },
        Strategy {
            name: "tool-call".to_string(),
            enabled: true,
            max_age_secs: 300,
            max_size: 100,
            similarity_threshold: 0.95,
            tags: vec!["tool".to_string()],
            conditions: vec![Condition::new(
                ConditionType::RequestType,
                ConditionOperator::Equals,
                category_list(&[
                    RequestCategory::Tool,
                    RequestCategory::Run,
                    RequestCategory::Execute,
                ]),
            )],
        },
        Strategy {
            name: "analysis".to_string(),
            enabled: true,
            max_age_secs: 1800,
            max_size: 50,
            similarity_threshold: 0.85,
            tags: vec!["analysis".to_string()],
            conditions: vec![Condition::new(
                ConditionType::RequestType,
                ConditionOperator::Equals,
                category_list(&[
                    RequestCategory::Analyze,
                    RequestCategory::Review,
                    RequestCategory::Check,
                ]),
            )],
        },
        Strategy {
            name: "generation".to_string(),
            enabled: true,
            max_age_secs: 7200,
            max_size: 50,
            similarity_threshold: 0.9,
            tags: vec!["generation".to_string()],
            conditions: vec![
                Condition::new(
                    ConditionType::RequestType,
                    ConditionOperator::Equals,
                    category_list(&[
                        RequestCategory::Create,
                        RequestCategory::Generate,
                        RequestCategory::Build,
                    ]),
                ),
                Condition::new(
                    ConditionType::ContentLength,
                    ConditionOperator::LessThan,
                    ConditionValue::Number(2000.0),
                ),
            ],
        },
        Strategy {
            name: "faq".to_string(),
            enabled: true,
            max_age_secs: 86_400,
            max_size: 200,
            similarity_threshold: 0.8,
            tags: vec!["faq".to_string()],
            conditions: vec![Condition::new(
                ConditionType::Frequency,
                ConditionOperator::GreaterThan,
                ConditionValue::Number(2.0),
            )],
        },
    ]
}
