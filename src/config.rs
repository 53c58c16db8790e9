//! Engine configuration
//!
//! Every section deserializes with per-field defaults, so a config file only
//! needs the values it changes.

use crate::cache::persistence::default_cache_path;
use crate::cache::strategy::Strategy;
use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment prefix for layered overrides (`CONTEXT_ENGINE__SECTION__FIELD`)
pub const ENV_PREFIX: &str = "CONTEXT_ENGINE";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub compressor: CompressorConfig,

    #[serde(default)]
    pub response_cache: ResponseCacheConfig,

    #[serde(default)]
    pub smart_cache: SmartCacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Conversation compressor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressorConfig {
    /// Default token budget for `optimize`
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Non-system messages always kept at the end of the conversation
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,

    /// Non-system messages kept before the summary on collapse
    #[serde(default = "default_summary_keep_head")]
    pub summary_keep_head: usize,

    /// Non-system messages kept after the summary on collapse
    #[serde(default = "default_summary_keep_tail")]
    pub summary_keep_tail: usize,

    /// Capacity of the per-message metrics table
    #[serde(default = "default_max_tracked_messages")]
    pub max_tracked_messages: usize,
}

fn default_token_budget() -> usize {
    180_000
}

fn default_keep_recent() -> usize {
    4
}

fn default_summary_keep_head() -> usize {
    2
}

fn default_summary_keep_tail() -> usize {
    3
}

fn default_max_tracked_messages() -> usize {
    1000
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            keep_recent: default_keep_recent(),
            summary_keep_head: default_summary_keep_head(),
            summary_keep_tail: default_summary_keep_tail(),
            max_tracked_messages: default_max_tracked_messages(),
        }
    }
}

/// Exact response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseCacheConfig {
    /// Write the cache to disk; false keeps it memory-only
    #[serde(default = "default_persist")]
    pub persist: bool,

    /// Cache document path (defaults to `~/.context-engine/response-cache.json`)
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Entries older than this are neither served nor kept by `cleanup`
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,

    /// Minimum Jaccard similarity for a signature-word hit
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Minimum shared-tag ratio when both sides carry tags
    #[serde(default = "default_tag_overlap_threshold")]
    pub tag_overlap_threshold: f64,

    /// Persist after this many inserts
    #[serde(default = "default_save_interval")]
    pub save_interval: usize,
}

fn default_persist() -> bool {
    true
}

fn default_max_entries() -> usize {
    1000
}

fn default_max_age_hours() -> u64 {
    7 * 24
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_tag_overlap_threshold() -> f64 {
    0.3
}

fn default_save_interval() -> usize {
    10
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            persist: default_persist(),
            path: None,
            max_entries: default_max_entries(),
            max_age_hours: default_max_age_hours(),
            similarity_threshold: default_similarity_threshold(),
            tag_overlap_threshold: default_tag_overlap_threshold(),
            save_interval: default_save_interval(),
        }
    }
}

impl ResponseCacheConfig {
    /// Configured path or the default dotfile location
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_cache_path)
    }
}

/// Strategy-gated semantic cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartCacheConfig {
    #[serde(default = "default_smart_enabled")]
    pub enabled: bool,

    /// Distinct requests remembered for the frequency condition
    #[serde(default = "default_max_tracked_requests")]
    pub max_tracked_requests: usize,

    /// Replaces the built-in strategy registry when set
    #[serde(default)]
    pub strategies: Option<Vec<Strategy>>,
}

fn default_smart_enabled() -> bool {
    true
}

fn default_max_tracked_requests() -> usize {
    5000
}

impl Default for SmartCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_smart_enabled(),
            max_tracked_requests: default_max_tracked_requests(),
            strategies: None,
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load a config file (TOML, YAML or JSON by extension) layered with
    /// `CONTEXT_ENGINE__*` environment variables
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by environment variables (and a `.env` file if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply flat overrides from a variable lookup
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("CONTEXT_ENGINE_TOKEN_BUDGET") {
            if let Ok(num) = val.parse() {
                self.compressor.token_budget = num;
            }
        }

        if let Some(val) = lookup("CONTEXT_ENGINE_CACHE_PATH") {
            self.response_cache.path = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("CONTEXT_ENGINE_CACHE_PERSIST") {
            self.response_cache.persist = val.to_lowercase() == "true" || val == "1";
        }

        if let Some(val) = lookup("CONTEXT_ENGINE_SIMILARITY_THRESHOLD") {
            if let Ok(num) = val.parse() {
                self.response_cache.similarity_threshold = num;
            }
        }

        if let Some(val) = lookup("CONTEXT_ENGINE_SMART_CACHE") {
            self.smart_cache.enabled = val.to_lowercase() == "true" || val == "1";
        }

        if let Some(val) = lookup("CONTEXT_ENGINE_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Some(val) = lookup("CONTEXT_ENGINE_LOG_JSON") {
            self.logging.json = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Validate that the configuration is consistent
    pub fn validate(&self) -> Result<()> {
        if self.compressor.token_budget == 0 {
            return Err(ContextError::Configuration(
                "compressor.token_budget must be positive".to_string(),
            ));
        }

        let cache = &self.response_cache;
        for (name, value) in [
            ("response_cache.similarity_threshold", cache.similarity_threshold),
            ("response_cache.tag_overlap_threshold", cache.tag_overlap_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ContextError::Configuration(format!(
                    "{} must be within 0.0-1.0, got {}",
                    name, value
                )));
            }
        }

        if cache.max_entries == 0 || cache.save_interval == 0 {
            return Err(ContextError::Configuration(
                "response_cache.max_entries and save_interval must be positive".to_string(),
            ));
        }

        if let Some(strategies) = &self.smart_cache.strategies {
            for strategy in strategies {
                strategy.validate()?;
            }
        }

        Ok(())
    }
}
