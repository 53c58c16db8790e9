//! Integration tests for the response caches
//!
//! Covers persistence across engine restarts, the signature-word fallback,
//! strategy gating and per-strategy capacity.

use context_engine::{
    cache::{
        signature::{jaccard, signature_words, token_set},
        Condition, ConditionOperator, ConditionType, ConditionValue, EntryMetadata,
        JsonFileStore, MemoryStore, Strategy,
    },
    config::{ResponseCacheConfig, SmartCacheConfig},
    CacheTier, Config, ContextEngine, ResponseCache, SmartCacheManager,
};
use std::sync::Arc;

fn metadata(tokens_saved: usize) -> EntryMetadata {
    EntryMetadata {
        tokens_saved,
        response_time_ms: 250,
    }
}

#[tokio::test]
async fn test_exact_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.response_cache.path = Some(dir.path().join("nested").join("cache.json"));

    {
        let mut engine = ContextEngine::from_config(config.clone()).unwrap();
        assert_eq!(engine.load().await, 0);
        engine
            .store(
                "What does the borrow checker enforce?",
                "rust book",
                "Aliasing XOR mutation.",
                metadata(300),
                &["rust".to_string()],
            )
            .await;
        assert!(engine.save().await);
    }

    let mut engine = ContextEngine::from_config(config).unwrap();
    assert_eq!(engine.load().await, 1);
    let hit = engine
        .lookup("What does the borrow checker enforce?", "rust book", &[])
        .unwrap();
    assert_eq!(hit.tier, CacheTier::Exact);
    assert_eq!(hit.response, "Aliasing XOR mutation.");
    assert_eq!(hit.tokens_saved, 300);
}

#[tokio::test]
async fn test_corrupt_cache_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    tokio::fs::write(&path, "{ not json").await.unwrap();

    let mut cache = ResponseCache::new(
        ResponseCacheConfig::default(),
        Arc::new(JsonFileStore::new(&path)),
    );
    assert_eq!(cache.load().await, 0);
    assert!(cache.is_empty());

    // Still usable, and the next save replaces the corrupt document
    cache.set("fresh prompt here", "fresh", "", 1, &[]).await;
    assert!(cache.save().await);
    let mut reloaded = ResponseCache::new(
        ResponseCacheConfig::default(),
        Arc::new(JsonFileStore::new(&path)),
    );
    assert_eq!(reloaded.load().await, 1);
}

#[tokio::test]
async fn test_signature_fallback_matches_jaccard_threshold() {
    let pairs = [
        (
            "explain the rust borrow checker rules for mutable references please",
            "Please explain mutable references: rust borrow checker rules for the",
        ),
        (
            "deploy the staging cluster with terraform modules",
            "deploy production cluster using ansible playbooks",
        ),
        (
            "how do I configure logging levels in tracing subscriber",
            "configure logging levels tracing subscriber, how?",
        ),
        (
            "list every file in the source directory recursively",
            "list every file in the source directory",
        ),
        (
            "write a unit test for the parser module",
            "write an integration test for the lexer module",
        ),
    ];

    let config = ResponseCacheConfig {
        persist: false,
        ..ResponseCacheConfig::default()
    };
    let mut hits = 0;
    let mut misses = 0;
    for (stored, query) in pairs {
        let mut cache = ResponseCache::new(config.clone(), Arc::new(MemoryStore::new()));
        cache.set(stored, "cached", "", 10, &[]).await;

        let similarity = jaccard(&token_set(query), &signature_words(stored));
        let expected = similarity >= config.similarity_threshold;
        let served = cache.get(query, "", &[]).is_some();
        assert_eq!(served, expected, "query '{}' (similarity {:.3})", query, similarity);

        if served {
            hits += 1;
        } else {
            misses += 1;
        }
    }
    assert!(hits > 0 && misses > 0);
}

#[test]
fn test_length_condition_rejects_long_help_request() {
    let mut cache = SmartCacheManager::with_config(SmartCacheConfig::default()).unwrap();
    let prompt = format!("help me with {}", "context ".repeat(61));
    assert!(prompt.chars().count() >= 500);

    let decision = cache.should_cache(&prompt, "");
    assert!(!decision.should);
    assert!(cache
        .set_cached_response(&prompt, "", "long answer", metadata(10))
        .is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_strategy_capacity_is_never_exceeded() {
    let mut cache = SmartCacheManager::with_config(SmartCacheConfig::default()).unwrap();
    cache
        .register_strategy(Strategy {
            name: "bounded".to_string(),
            enabled: true,
            max_age_secs: 600,
            max_size: 5,
            similarity_threshold: 0.9,
            tags: vec![],
            conditions: vec![Condition::new(
                ConditionType::UserPattern,
                ConditionOperator::Contains,
                ConditionValue::Text("bounded".to_string()),
            )],
        })
        .unwrap();

    for i in 0..=5 {
        let id = cache.set_cached_response(&format!("bounded item {}", i), "", "ok", metadata(1));
        assert!(id.is_some());
        assert!(cache.entries_for("bounded") <= 5);
    }
    assert_eq!(cache.entries_for("bounded"), 5);

    let stats = cache.get_cache_stats();
    let bounded = stats
        .strategies
        .iter()
        .find(|s| s.name == "bounded")
        .unwrap();
    assert_eq!(bounded.evictions, 1);
}

#[tokio::test]
async fn test_disabled_strategy_never_serves_through_engine() {
    let mut config = Config::default();
    config.response_cache.persist = false;
    let mut engine = ContextEngine::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(context_engine::cache::KeywordClassifier::new()),
    )
    .unwrap();

    engine
        .store("Show version info", "", "v1.2.3", metadata(5), &["cli".to_string()])
        .await;
    engine
        .smart_cache_mut()
        .set_strategy_enabled("simple-command", false)
        .unwrap();

    // Exact key differs and disjoint tags skip the signature tier
    assert!(engine
        .lookup("show version info", "", &["docs".to_string()])
        .is_none());

    engine
        .smart_cache_mut()
        .set_strategy_enabled("simple-command", true)
        .unwrap();
    let hit = engine
        .lookup("show version info", "", &["docs".to_string()])
        .unwrap();
    assert_eq!(hit.tier, CacheTier::Strategy);
}
