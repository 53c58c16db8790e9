//! Owned engine wiring the compressor and both cache tiers
//!
//! A conversational loop calls `prepare_messages` before each model call,
//! then `lookup` for a cached answer, and `store` after a miss.

use crate::cache::{
    CacheStore, EntryMetadata, JsonFileStore, KeywordClassifier, RequestClassifier,
    ResponseCache, ResponseCacheStats, SmartCacheManager, SmartCacheStats,
};
use crate::config::Config;
use crate::context::{CompressorStats, ContextCompressor, Message, OptimizedContext};
use crate::error::Result;
use crate::metrics::EngineMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Which tier served a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    /// Same prompt and context hash
    Exact,
    /// Signature-word match in the exact tier
    Signature,
    /// Strategy-gated near-duplicate
    Strategy,
}

/// A cached answer returned by `lookup`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHit {
    pub response: String,
    pub tier: CacheTier,
    pub similarity: f64,
    pub tokens_saved: usize,
    /// Governing strategy for strategy-tier hits
    pub strategy: Option<String>,
}

/// Where `store` put a response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreOutcome {
    pub exact_key: String,
    pub strategy_entry: Option<String>,
}

/// Entries removed by an expiry sweep
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    pub exact_removed: usize,
    pub strategy_removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub compressor: CompressorStats,
    pub response_cache: ResponseCacheStats,
    pub smart_cache: SmartCacheStats,
}

/// Conversation budget and response cache engine
pub struct ContextEngine {
    config: Config,
    compressor: ContextCompressor,
    response_cache: ResponseCache,
    smart_cache: SmartCacheManager,
    metrics: Arc<EngineMetrics>,
}

impl ContextEngine {
    /// Build an engine from its collaborators
    pub fn new(
        config: Config,
        store: Arc<dyn CacheStore>,
        classifier: Arc<dyn RequestClassifier>,
    ) -> Result<Self> {
        config.validate()?;
        let metrics = Arc::new(EngineMetrics::new()?);

        let compressor = ContextCompressor::with_config(config.compressor.clone());
        let response_cache = ResponseCache::new(config.response_cache.clone(), store)
            .with_metrics(metrics.clone());
        let smart_cache = SmartCacheManager::new(config.smart_cache.clone(), classifier)?
            .with_metrics(metrics.clone());

        Ok(Self {
            config,
            compressor,
            response_cache,
            smart_cache,
            metrics,
        })
    }

    /// Build with the JSON file store and keyword classifier
    pub fn from_config(config: Config) -> Result<Self> {
        let path = config.response_cache.resolved_path();
        info!("Response cache file: {}", path.display());
        Self::new(
            config,
            Arc::new(JsonFileStore::new(path)),
            Arc::new(KeywordClassifier::new()),
        )
    }

    /// Re-hydrate the exact tier from its store
    pub async fn load(&mut self) -> usize {
        self.response_cache.load().await
    }

    /// Fit `messages` into the configured token budget
    pub fn prepare_messages(&mut self, messages: &[Message]) -> OptimizedContext {
        let budget = self.config.compressor.token_budget;
        self.prepare_messages_with_budget(messages, budget)
    }

    pub fn prepare_messages_with_budget(
        &mut self,
        messages: &[Message],
        token_budget: usize,
    ) -> OptimizedContext {
        let optimized = self.compressor.optimize_with_budget(messages, token_budget);
        self.metrics.record_optimization(&optimized.metrics);
        optimized
    }

    /// Exact tier first, then the strategy tier
    pub fn lookup(&mut self, prompt: &str, context: &str, tags: &[String]) -> Option<CacheHit> {
        if let Some(entry) = self.response_cache.get(prompt, context, tags) {
            let tier = if entry.key == ResponseCache::cache_key(prompt, context) {
                CacheTier::Exact
            } else {
                CacheTier::Signature
            };
            return Some(CacheHit {
                response: entry.response,
                tier,
                similarity: entry.similarity,
                tokens_saved: entry.tokens_saved,
                strategy: None,
            });
        }

        let hit = self.smart_cache.get_cached_response(prompt, context)?;
        Some(CacheHit {
            response: hit.response,
            tier: CacheTier::Strategy,
            similarity: hit.similarity,
            tokens_saved: hit.tokens_saved,
            strategy: Some(hit.strategy),
        })
    }

    /// Record a fresh model response in both tiers
    pub async fn store(
        &mut self,
        prompt: &str,
        context: &str,
        response: &str,
        metadata: EntryMetadata,
        tags: &[String],
    ) -> StoreOutcome {
        let exact_key = self
            .response_cache
            .set(prompt, response, context, metadata.tokens_saved, tags)
            .await;
        let strategy_entry = self
            .smart_cache
            .set_cached_response(prompt, context, response, metadata);
        debug!(
            "Stored response (strategy entry: {})",
            strategy_entry.as_deref().unwrap_or("none")
        );
        StoreOutcome {
            exact_key,
            strategy_entry,
        }
    }

    /// Expiry sweep over both tiers
    pub fn cleanup(&mut self) -> CleanupReport {
        let report = CleanupReport {
            exact_removed: self.response_cache.cleanup(),
            strategy_removed: self.smart_cache.cleanup(),
        };
        if report.exact_removed + report.strategy_removed > 0 {
            info!(
                "Cleanup removed {} exact and {} strategy entries",
                report.exact_removed, report.strategy_removed
            );
        }
        report
    }

    /// Persist the exact tier now
    pub async fn save(&mut self) -> bool {
        self.response_cache.save().await
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            compressor: self.compressor.get_stats(),
            response_cache: self.response_cache.get_stats(),
            smart_cache: self.smart_cache.get_cache_stats(),
        }
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn compressor(&self) -> &ContextCompressor {
        &self.compressor
    }

    pub fn compressor_mut(&mut self) -> &mut ContextCompressor {
        &mut self.compressor
    }

    pub fn response_cache(&self) -> &ResponseCache {
        &self.response_cache
    }

    pub fn response_cache_mut(&mut self) -> &mut ResponseCache {
        &mut self.response_cache
    }

    pub fn smart_cache(&self) -> &SmartCacheManager {
        &self.smart_cache
    }

    pub fn smart_cache_mut(&mut self) -> &mut SmartCacheManager {
        &mut self.smart_cache
    }
}
