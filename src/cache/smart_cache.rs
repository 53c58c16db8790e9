//! Strategy-gated semantic response cache
//!
//! Requests are classified, checked against an ordered registry of named
//! strategies and, when one matches, served from or stored into that
//! strategy's near-duplicate cache.

use super::classifier::{KeywordClassifier, RequestClassifier};
use super::signature::{fingerprint, jaccard, normalize, word_set};
use super::strategy::{default_strategies, RequestFacts, Strategy};
use crate::config::SmartCacheConfig;
use crate::error::{ContextError, Result};
use crate::metrics::EngineMetrics;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

const CONTENT_WEIGHT: f64 = 0.7;
const CONTEXT_WEIGHT: f64 = 0.3;
/// Share of a full strategy's entries dropped per eviction pass
const EVICTION_FRACTION: f64 = 0.2;

/// Extra data stored alongside a cached response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub tokens_saved: usize,
    pub response_time_ms: u64,
}

/// One semantic-tier cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyEntry {
    pub id: String,
    pub content: String,
    pub context: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    pub strategy: String,
    pub tags: Vec<String>,
    pub metadata: EntryMetadata,
}

/// Outcome of `should_cache`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheDecision {
    pub should: bool,
    pub strategy_id: Option<String>,
    pub reason: String,
}

/// A served semantic-tier hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub entry_id: String,
    pub response: String,
    pub strategy: String,
    pub similarity: f64,
    pub tokens_saved: usize,
}

#[derive(Debug, Clone, Default)]
struct StrategyCounters {
    hits: u64,
    misses: u64,
    tokens_saved: u64,
    evictions: u64,
}

/// Per-strategy statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyStats {
    pub name: String,
    pub enabled: bool,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub tokens_saved: u64,
    pub evictions: u64,
}

/// Semantic-tier statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartCacheStats {
    pub total_entries: usize,
    pub total_hits: u64,
    /// Strategy misses plus ineligible lookups
    pub total_misses: u64,
    /// Lookups no enabled strategy accepted
    pub ineligible: u64,
    pub hit_rate: f64,
    pub tokens_saved: u64,
    pub strategies: Vec<StrategyStats>,
}

/// Strategy registry plus the entries cached under each strategy
pub struct SmartCacheManager {
    config: SmartCacheConfig,
    strategies: IndexMap<String, Strategy>,
    entries: Vec<StrategyEntry>,
    classifier: Arc<dyn RequestClassifier>,
    frequencies: IndexMap<String, u64>,
    counters: HashMap<String, StrategyCounters>,
    ineligible: u64,
    metrics: Option<Arc<EngineMetrics>>,
}

impl SmartCacheManager {
    /// Create a manager with an explicit classifier
    ///
    /// Configured strategies pass the same checks as `register_strategy`.
    pub fn new(config: SmartCacheConfig, classifier: Arc<dyn RequestClassifier>) -> Result<Self> {
        let mut strategies = IndexMap::new();
        for strategy in config.strategies.clone().unwrap_or_else(default_strategies) {
            strategy.validate()?;
            strategies.insert(strategy.name.clone(), strategy);
        }

        Ok(Self {
            config,
            strategies,
            entries: Vec::new(),
            classifier,
            frequencies: IndexMap::new(),
            counters: HashMap::new(),
            ineligible: 0,
            metrics: None,
        })
    }

    /// Create with the bilingual keyword classifier
    pub fn with_config(config: SmartCacheConfig) -> Result<Self> {
        Self::new(config, Arc::new(KeywordClassifier::new()))
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn facts(&self, content: &str) -> RequestFacts {
        let normalized = normalize(content);
        let frequency = self
            .frequencies
            .get(&fingerprint(&[&normalized]))
            .copied()
            .unwrap_or(0);
        RequestFacts {
            content_length: content.chars().count(),
            request_type: self.classifier.classify(&normalized),
            normalized,
            frequency,
        }
    }

    fn observe(&mut self, content: &str) {
        let key = fingerprint(&[&normalize(content)]);
        *self.frequencies.entry(key).or_insert(0) += 1;
        while self.frequencies.len() > self.config.max_tracked_requests {
            self.frequencies.shift_remove_index(0);
        }
    }

    /// Enabled strategies whose conditions all hold, in registry order
    fn matching_strategies(&self, facts: &RequestFacts) -> Vec<&Strategy> {
        self.strategies
            .values()
            .filter(|s| s.enabled && s.matches(facts))
            .collect()
    }

    /// Decide whether a request is eligible for caching and under which strategy
    pub fn should_cache(&self, content: &str, context: &str) -> CacheDecision {
        if !self.config.enabled {
            return CacheDecision {
                should: false,
                strategy_id: None,
                reason: "semantic cache disabled".to_string(),
            };
        }

        let facts = self.facts(content);
        match self.matching_strategies(&facts).first() {
            Some(strategy) => CacheDecision {
                should: true,
                strategy_id: Some(strategy.name.clone()),
                reason: format!("matched strategy '{}'", strategy.name),
            },
            None => {
                debug!(
                    "No strategy matched request (type={:?}, length={}, context_len={})",
                    facts.request_type,
                    facts.content_length,
                    context.len()
                );
                CacheDecision {
                    should: false,
                    strategy_id: None,
                    reason: match facts.request_type {
                        Some(category) => {
                            format!("no enabled strategy matched request type '{}'", category)
                        }
                        None => "no enabled strategy matched".to_string(),
                    },
                }
            }
        }
    }

    /// Serve a near-duplicate response; records one observation of the request
    pub fn get_cached_response(&mut self, content: &str, context: &str) -> Option<CachedResponse> {
        if !self.config.enabled {
            return None;
        }
        self.observe(content);

        let facts = self.facts(content);
        let eligible: Vec<(String, f64, Duration)> = self
            .matching_strategies(&facts)
            .into_iter()
            .map(|s| (s.name.clone(), s.similarity_threshold, s.max_age()))
            .collect();
        if eligible.is_empty() {
            self.ineligible += 1;
            self.record_lookup("ineligible");
            return None;
        }

        let now = Utc::now();

        let content_words = word_set(content);
        let context_words = word_set(context);

        let mut best: Option<(usize, f64)> = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            let Some((_, threshold, max_age)) =
                eligible.iter().find(|(name, _, _)| *name == entry.strategy)
            else {
                continue;
            };
            if now - entry.timestamp > *max_age {
                continue;
            }
            let score = CONTENT_WEIGHT * jaccard(&content_words, &word_set(&entry.content))
                + CONTEXT_WEIGHT * jaccard(&context_words, &word_set(&entry.context));
            if score >= *threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }

        let Some((idx, similarity)) = best else {
            let first = eligible[0].0.clone();
            self.counters.entry(first).or_default().misses += 1;
            self.record_lookup("miss");
            return None;
        };

        let entry = &mut self.entries[idx];
        entry.access_count += 1;
        entry.last_accessed = Utc::now();
        let hit = CachedResponse {
            entry_id: entry.id.clone(),
            response: entry.response.clone(),
            strategy: entry.strategy.clone(),
            similarity,
            tokens_saved: entry.metadata.tokens_saved,
        };

        let counters = self.counters.entry(hit.strategy.clone()).or_default();
        counters.hits += 1;
        counters.tokens_saved += hit.tokens_saved as u64;
        self.record_lookup("hit");
        debug!(
            "Semantic cache hit under '{}' (similarity {:.3})",
            hit.strategy, similarity
        );
        Some(hit)
    }

    /// Store a response if a strategy accepts the request; returns the entry id
    pub fn set_cached_response(
        &mut self,
        content: &str,
        context: &str,
        response: &str,
        metadata: EntryMetadata,
    ) -> Option<String> {
        let decision = self.should_cache(content, context);
        let strategy_name = match decision.strategy_id {
            Some(name) if decision.should => name,
            _ => {
                debug!("Not caching response: {}", decision.reason);
                return None;
            }
        };
        let strategy = self.strategies.get(&strategy_name)?.clone();
        let now = Utc::now();

        // Same request in the same strategy: refresh in place
        if let Some(existing) = self.entries.iter_mut().find(|e| {
            e.strategy == strategy.name && e.content == content && e.context == context
        }) {
            existing.response = response.to_string();
            existing.timestamp = now;
            existing.last_accessed = now;
            existing.metadata = metadata;
            return Some(existing.id.clone());
        }

        self.evict_for_insert(&strategy);

        let id = uuid::Uuid::new_v4().to_string();
        self.entries.push(StrategyEntry {
            id: id.clone(),
            content: content.to_string(),
            context: context.to_string(),
            response: response.to_string(),
            timestamp: now,
            last_accessed: now,
            access_count: 0,
            strategy: strategy.name.clone(),
            tags: strategy.tags.clone(),
            metadata,
        });
        debug!("Cached response under '{}' ({})", strategy.name, id);
        Some(id)
    }

    /// Make room so one more entry keeps the strategy within `max_size`
    fn evict_for_insert(&mut self, strategy: &Strategy) {
        let mut owned: Vec<(usize, DateTime<Utc>)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.strategy == strategy.name)
            .map(|(idx, e)| (idx, e.last_accessed))
            .collect();
        if owned.len() < strategy.max_size {
            return;
        }

        let fraction = (owned.len() as f64 * EVICTION_FRACTION).ceil() as usize;
        let required = owned.len() + 1 - strategy.max_size;
        let evict = fraction.max(required).min(owned.len());

        owned.sort_by_key(|(_, last_accessed)| *last_accessed);
        let mut doomed: Vec<usize> = owned.into_iter().take(evict).map(|(idx, _)| idx).collect();
        doomed.sort_unstable_by(|a, b| b.cmp(a));
        for idx in doomed {
            self.entries.remove(idx);
        }

        self.counters
            .entry(strategy.name.clone())
            .or_default()
            .evictions += evict as u64;
        if let Some(metrics) = &self.metrics {
            metrics.record_evictions("strategy", evict);
        }
        info!(
            "Evicted {} least recently accessed entries from strategy '{}'",
            evict, strategy.name
        );
    }

    /// Remove entries past their strategy's max age, or whose strategy is gone
    pub fn cleanup(&mut self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        let strategies = &self.strategies;
        self.entries.retain(|entry| match strategies.get(&entry.strategy) {
            Some(strategy) => now - entry.timestamp <= strategy.max_age(),
            None => false,
        });
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("Expiry sweep removed {} semantic cache entries", removed);
        }
        removed
    }

    /// Toggle a strategy; entries of a disabled strategy stay stored but unreachable
    pub fn set_strategy_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        let strategy = self
            .strategies
            .get_mut(name)
            .ok_or_else(|| ContextError::UnknownStrategy(name.to_string()))?;
        strategy.enabled = enabled;
        info!(
            "Strategy '{}' {}",
            name,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Add a strategy or replace one with the same name
    pub fn register_strategy(&mut self, strategy: Strategy) -> Result<()> {
        strategy.validate()?;
        self.strategies.insert(strategy.name.clone(), strategy);
        Ok(())
    }

    pub fn strategy(&self, name: &str) -> Option<&Strategy> {
        self.strategies.get(name)
    }

    pub fn strategies(&self) -> impl Iterator<Item = &Strategy> {
        self.strategies.values()
    }

    pub fn entries_for(&self, strategy: &str) -> usize {
        self.entries.iter().filter(|e| e.strategy == strategy).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.frequencies.clear();
    }

    fn record_lookup(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup("strategy", outcome);
        }
    }

    pub fn get_cache_stats(&self) -> SmartCacheStats {
        let strategies: Vec<StrategyStats> = self
            .strategies
            .values()
            .map(|s| {
                let counters = self.counters.get(&s.name).cloned().unwrap_or_default();
                StrategyStats {
                    name: s.name.clone(),
                    enabled: s.enabled,
                    entries: self.entries_for(&s.name),
                    hits: counters.hits,
                    misses: counters.misses,
                    tokens_saved: counters.tokens_saved,
                    evictions: counters.evictions,
                }
            })
            .collect();

        let total_hits: u64 = strategies.iter().map(|s| s.hits).sum();
        let total_misses: u64 =
            strategies.iter().map(|s| s.misses).sum::<u64>() + self.ineligible;
        let lookups = total_hits + total_misses;

        SmartCacheStats {
            total_entries: self.entries.len(),
            total_hits,
            total_misses,
            ineligible: self.ineligible,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                total_hits as f64 / lookups as f64
            },
            tokens_saved: strategies.iter().map(|s| s.tokens_saved).sum(),
            strategies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::strategy::{Condition, ConditionOperator, ConditionType, ConditionValue};

    fn manager() -> SmartCacheManager {
        SmartCacheManager::with_config(SmartCacheConfig::default()).unwrap()
    }

    fn pattern_strategy(name: &str, max_age_secs: u64, max_size: usize) -> Strategy {
        Strategy {
            name: name.to_string(),
            enabled: true,
            max_age_secs,
            max_size,
            similarity_threshold: 0.5,
            tags: vec![],
            conditions: vec![Condition::new(
                ConditionType::UserPattern,
                ConditionOperator::Contains,
                ConditionValue::Text(name.to_string()),
            )],
        }
    }

    fn meta(tokens_saved: usize) -> EntryMetadata {
        EntryMetadata {
            tokens_saved,
            response_time_ms: 10,
        }
    }

    #[test]
    fn test_should_cache_short_help_request() {
        let decision = manager().should_cache("help", "");
        assert!(decision.should);
        assert_eq!(decision.strategy_id.as_deref(), Some("simple-command"));
    }

    #[test]
    fn test_long_prompt_rejected_by_length_condition() {
        let content = format!("help {}", "x".repeat(495));
        assert_eq!(content.chars().count(), 500);
        let decision = manager().should_cache(&content, "");
        assert!(!decision.should);
        assert!(decision.strategy_id.is_none());
        assert!(decision.reason.contains("help"));
    }

    #[test]
    fn test_store_then_serve_near_duplicate() {
        let mut cache = manager();
        let id = cache
            .set_cached_response("please review the auth module", "repo: api", "LGTM", meta(40))
            .unwrap();

        let hit = cache
            .get_cached_response("please review the auth module", "repo: api")
            .unwrap();
        assert_eq!(hit.entry_id, id);
        assert_eq!(hit.strategy, "analysis");
        assert_eq!(hit.response, "LGTM");
        assert!((hit.similarity - 1.0).abs() < 1e-9);

        // Different content falls below the analysis threshold
        assert!(cache
            .get_cached_response("review the billing service", "repo: api")
            .is_none());

        let stats = cache.get_cache_stats();
        assert_eq!(stats.total_hits, 1);
        assert_eq!(stats.total_misses, 1);
        assert_eq!(stats.tokens_saved, 40);
    }

    #[test]
    fn test_unmatched_request_is_not_stored() {
        let mut cache = manager();
        assert!(cache
            .set_cached_response("the weather is nice today", "", "indeed", meta(1))
            .is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabling_strategy_hides_entries() {
        let mut cache = manager();
        cache.set_cached_response("status", "", "all green", meta(5)).unwrap();
        assert!(cache.get_cached_response("status", "").is_some());

        cache.set_strategy_enabled("simple-command", false).unwrap();
        assert!(cache.get_cached_response("status", "").is_none());
        assert_eq!(cache.len(), 1);

        cache.set_strategy_enabled("simple-command", true).unwrap();
        assert!(cache.get_cached_response("status", "").is_some());

        assert!(matches!(
            cache.set_strategy_enabled("nope", true),
            Err(ContextError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_eviction_bound() {
        let mut cache = manager();
        let max_size = cache.strategy("analysis").unwrap().max_size;
        for i in 0..=max_size {
            cache
                .set_cached_response(&format!("analyze module {}", i), "", "ok", meta(1))
                .unwrap();
            assert!(cache.entries_for("analysis") <= max_size);
        }
        // 50 entries at capacity drop 10, then one insert
        assert_eq!(cache.entries_for("analysis"), max_size - 9);
        assert_eq!(cache.get_cache_stats().strategies[2].evictions, 10);
    }

    #[test]
    fn test_frequency_gates_faq_strategy() {
        let mut cache = manager();
        let question = "where do we keep the deployment runbook";
        assert!(!cache.should_cache(question, "").should);

        for _ in 0..3 {
            cache.get_cached_response(question, "");
        }
        let decision = cache.should_cache(question, "");
        assert_eq!(decision.strategy_id.as_deref(), Some("faq"));

        cache.set_cached_response(question, "", "in the wiki", meta(3)).unwrap();
        let hit = cache.get_cached_response(question, "").unwrap();
        assert_eq!(hit.strategy, "faq");
    }

    #[test]
    fn test_cleanup_removes_expired() {
        let mut cache = manager();
        cache
            .register_strategy(pattern_strategy("ephemeral", 0, 10))
            .unwrap();
        cache
            .set_cached_response("ephemeral question", "", "gone soon", meta(1))
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));

        assert!(cache.get_cached_response("ephemeral question", "").is_none());
        assert_eq!(cache.cleanup(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unbounded_max_age_keeps_entries() {
        let mut cache = manager();
        cache
            .register_strategy(pattern_strategy("forever", u64::MAX, 10))
            .unwrap();
        cache
            .set_cached_response("forever question", "", "always here", meta(1))
            .unwrap();

        let hit = cache.get_cached_response("forever question", "").unwrap();
        assert_eq!(hit.strategy, "forever");
        assert_eq!(cache.cleanup(), 0);
        assert_eq!(cache.entries_for("forever"), 1);
    }

    #[test]
    fn test_constructor_rejects_invalid_strategies() {
        let config = SmartCacheConfig {
            strategies: Some(vec![pattern_strategy("empty", 60, 0)]),
            ..SmartCacheConfig::default()
        };
        assert!(matches!(
            SmartCacheManager::with_config(config),
            Err(ContextError::Configuration(_))
        ));

        let config = SmartCacheConfig {
            strategies: Some(vec![pattern_strategy("single", 60, 1)]),
            ..SmartCacheConfig::default()
        };
        let mut cache = SmartCacheManager::with_config(config).unwrap();
        for i in 0..3 {
            cache
                .set_cached_response(&format!("single item {}", i), "", "ok", meta(1))
                .unwrap();
            assert_eq!(cache.entries_for("single"), 1);
        }
    }

    #[test]
    fn test_ineligible_lookups_count_as_misses() {
        let mut cache = manager();
        assert!(cache.get_cached_response("the weather is nice", "").is_none());
        let stats = cache.get_cache_stats();
        assert_eq!(stats.ineligible, 1);
        assert_eq!(stats.total_misses, 1);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn test_register_strategy_validation() {
        let mut cache = manager();
        let mut strategy = cache.strategy("faq").unwrap().clone();
        strategy.similarity_threshold = 1.5;
        assert!(cache.register_strategy(strategy).is_err());
    }
}
