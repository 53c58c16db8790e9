//! Exact prompt→response cache with signature-word fallback
//!
//! Lookups first try the SHA-256 key over prompt and context. On a miss the
//! prompt's significant tokens are compared against each entry's signature
//! words; the best Jaccard match above the threshold is served.

use super::persistence::CacheStore;
use super::signature::{fingerprint, jaccard, preview, signature_words, tag_overlap, token_set};
use crate::config::ResponseCacheConfig;
use crate::metrics::EngineMetrics;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const PREVIEW_CHARS: usize = 100;
const HIT_WEIGHT: f64 = 0.7;
const RECENCY_WEIGHT: f64 = 0.3;

/// One cached prompt/response pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub signature_words: Vec<String>,
    pub prompt_preview: String,
    pub response: String,
    pub response_preview: String,
    pub response_hash: String,
    pub timestamp: DateTime<Utc>,
    pub tokens_saved: usize,
    pub hit_count: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Similarity of the lookup that served this entry (1.0 for exact hits)
    #[serde(default)]
    pub similarity: f64,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    /// Eviction score: frequently hit, recent entries score highest
    pub fn retention_score(&self, now: DateTime<Utc>) -> f64 {
        let age_days = self.age(now).num_seconds().max(0) as f64 / 86_400.0;
        self.hit_count as f64 * HIT_WEIGHT - age_days * RECENCY_WEIGHT
    }
}

/// Exact-tier statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseCacheStats {
    pub entries: usize,
    pub exact_hits: u64,
    pub semantic_hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub total_tokens_saved: u64,
    pub evictions: u64,
    pub memory_only: bool,
}

/// Hash-keyed response cache backed by a `CacheStore`
pub struct ResponseCache {
    entries: IndexMap<String, CacheEntry>,
    config: ResponseCacheConfig,
    store: Arc<dyn CacheStore>,
    metrics: Option<Arc<EngineMetrics>>,
    inserts_since_save: usize,
    memory_only: bool,
    stats: ResponseCacheStats,
}

impl ResponseCache {
    /// Create an empty cache; call `load` to re-hydrate persisted entries
    pub fn new(config: ResponseCacheConfig, store: Arc<dyn CacheStore>) -> Self {
        let memory_only = !config.persist;
        Self {
            entries: IndexMap::new(),
            config,
            store,
            metrics: None,
            inserts_since_save: 0,
            memory_only,
            stats: ResponseCacheStats::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Cache key for a prompt and its context
    pub fn cache_key(prompt: &str, context: &str) -> String {
        fingerprint(&[prompt, context])
    }

    /// Re-hydrate from the store; unreadable data leaves the cache empty
    pub async fn load(&mut self) -> usize {
        if !self.config.persist {
            return 0;
        }
        match self.store.load().await {
            Ok(loaded) => {
                self.entries = loaded
                    .into_iter()
                    .map(|entry| (entry.key.clone(), entry))
                    .collect();
                let evicted = self.evict_overflow();
                info!(
                    "Loaded {} response cache entries ({} evicted over capacity)",
                    self.entries.len(),
                    evicted
                );
                self.entries.len()
            }
            Err(e) => {
                warn!("Failed to load response cache, starting empty: {}", e);
                self.entries.clear();
                0
            }
        }
    }

    /// Look up a response for `prompt` in `context`
    pub fn get(&mut self, prompt: &str, context: &str, tags: &[String]) -> Option<CacheEntry> {
        let now = Utc::now();
        let max_age = self.max_age();
        let key = Self::cache_key(prompt, context);

        if let Some(entry) = self.entries.get_mut(&key) {
            if entry.age(now) <= max_age {
                entry.hit_count += 1;
                entry.similarity = 1.0;
                let hit = entry.clone();
                self.stats.exact_hits += 1;
                self.stats.total_tokens_saved += hit.tokens_saved as u64;
                self.record_lookup("exact", "hit");
                debug!("Exact cache hit: {}", &key[..16]);
                return Some(hit);
            }
        }
        self.record_lookup("exact", "miss");

        let prompt_tokens = token_set(prompt);
        let mut best: Option<(String, f64)> = None;
        for (candidate_key, entry) in &self.entries {
            if entry.age(now) > max_age {
                continue;
            }
            if !tags.is_empty()
                && !entry.tags.is_empty()
                && tag_overlap(tags, &entry.tags) < self.config.tag_overlap_threshold
            {
                continue;
            }
            let similarity = jaccard(&entry.signature_words, &prompt_tokens);
            if similarity >= self.config.similarity_threshold
                && best.as_ref().map_or(true, |(_, s)| similarity > *s)
            {
                best = Some((candidate_key.clone(), similarity));
            }
        }

        if let Some((best_key, similarity)) = best {
            if let Some(entry) = self.entries.get_mut(&best_key) {
                entry.hit_count += 1;
                entry.similarity = similarity;
                let hit = entry.clone();
                self.stats.semantic_hits += 1;
                self.stats.total_tokens_saved += hit.tokens_saved as u64;
                self.record_lookup("signature", "hit");
                debug!("Semantic cache hit: similarity={:.3}", similarity);
                return Some(hit);
            }
        }

        self.stats.misses += 1;
        self.record_lookup("signature", "miss");
        None
    }

    /// Store a response; every `save_interval`-th insert persists the cache
    pub async fn set(
        &mut self,
        prompt: &str,
        response: &str,
        context: &str,
        tokens_saved: usize,
        tags: &[String],
    ) -> String {
        let key = Self::cache_key(prompt, context);
        let entry = CacheEntry {
            key: key.clone(),
            signature_words: signature_words(prompt),
            prompt_preview: preview(prompt, PREVIEW_CHARS),
            response: response.to_string(),
            response_preview: preview(response, PREVIEW_CHARS),
            response_hash: fingerprint(&[response]),
            timestamp: Utc::now(),
            tokens_saved,
            hit_count: 0,
            tags: tags.to_vec(),
            similarity: 0.0,
        };

        // Re-inserting moves the key to the back so insertion order tracks recency
        self.entries.shift_remove(&key);
        self.entries.insert(key.clone(), entry);
        self.evict_overflow();

        self.inserts_since_save += 1;
        if self.inserts_since_save >= self.config.save_interval {
            self.save().await;
        }

        key
    }

    /// Rewrite the persisted document; returns false when running memory-only
    pub async fn save(&mut self) -> bool {
        self.inserts_since_save = 0;
        if self.memory_only {
            return false;
        }

        let snapshot: Vec<CacheEntry> = self.entries.values().cloned().collect();
        match self.store.save(&snapshot).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Response cache persistence failed, continuing in memory: {}", e);
                self.memory_only = true;
                if let Some(metrics) = &self.metrics {
                    metrics.record_persistence_failure();
                }
                false
            }
        }
    }

    /// Drop entries older than the configured max age
    pub fn cleanup(&mut self) -> usize {
        let now = Utc::now();
        let max_age = self.max_age();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.age(now) <= max_age);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("Removed {} expired response cache entries", removed);
        }
        removed
    }

    fn evict_overflow(&mut self) -> usize {
        let max = self.config.max_entries;
        if self.entries.len() <= max {
            return 0;
        }

        let now = Utc::now();
        let mut scored: Vec<(String, f64)> = self
            .entries
            .values()
            .map(|e| (e.key.clone(), e.retention_score(now)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        let excess = self.entries.len() - max;
        for (key, _) in scored.into_iter().take(excess) {
            self.entries.shift_remove(&key);
        }

        self.stats.evictions += excess as u64;
        if let Some(metrics) = &self.metrics {
            metrics.record_evictions("exact", excess);
        }
        debug!("Evicted {} response cache entries", excess);
        excess
    }

    /// Configured max age; values past chrono's range never expire
    fn max_age(&self) -> Duration {
        i64::try_from(self.config.max_age_hours)
            .ok()
            .and_then(Duration::try_hours)
            .unwrap_or(Duration::MAX)
    }

    fn record_lookup(&self, tier: &str, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(tier, outcome);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_memory_only(&self) -> bool {
        self.memory_only
    }

    pub fn get_stats(&self) -> ResponseCacheStats {
        let hits = self.stats.exact_hits + self.stats.semantic_hits;
        let lookups = hits + self.stats.misses;
        ResponseCacheStats {
            entries: self.entries.len(),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            memory_only: self.memory_only,
            ..self.stats.clone()
        }
    }
}
