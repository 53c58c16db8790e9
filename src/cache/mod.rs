//! Two-tier response caching
//!
//! - `response_cache`: exact prompt hash with signature-word fallback, persisted
//! - `smart_cache`: strategy-gated near-duplicate cache, in memory

pub mod classifier;
pub mod persistence;
pub mod response_cache;
pub mod signature;
pub mod smart_cache;
pub mod strategy;

pub use classifier::{KeywordClassifier, RequestCategory, RequestClassifier};
pub use persistence::{default_cache_path, CacheStore, JsonFileStore, MemoryStore};
pub use response_cache::{CacheEntry, ResponseCache, ResponseCacheStats};
pub use smart_cache::{
    CacheDecision, CachedResponse, EntryMetadata, SmartCacheManager, SmartCacheStats,
    StrategyEntry, StrategyStats,
};
pub use strategy::{
    default_strategies, Condition, ConditionOperator, ConditionType, ConditionValue,
    RequestFacts, Strategy,
};
