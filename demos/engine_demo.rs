//! Demo: a conversational loop using the context engine
//!
//! Compresses an oversized conversation, then answers repeated requests
//! from the caches instead of a model.

use context_engine::{
    cache::{EntryMetadata, KeywordClassifier, MemoryStore},
    logging, Config, ContextEngine, Message,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    config.compressor.token_budget = 2_000;
    config.response_cache.persist = false;
    logging::init(&config.logging)?;

    let mut engine = ContextEngine::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(KeywordClassifier::new()),
    )?;

    // Build a conversation well past the budget
    let mut messages = vec![Message::system("You are a coding assistant.")];
    for turn in 0..30 {
        messages.push(Message::user(format!(
            "Turn {}: please fix the failing test in module {} {}",
            turn,
            turn,
            "with more detail ".repeat(40)
        )));
        messages.push(Message::assistant(format!(
            "Updated module {} and the test now passes. {}",
            turn,
            "explanation ".repeat(60)
        )));
    }

    let optimized = engine.prepare_messages(&messages);
    println!(
        "Compressed {} messages ({} tokens) to {} messages ({} tokens), summarized: {}",
        optimized.metrics.original_count,
        optimized.metrics.original_tokens,
        optimized.metrics.optimized_count,
        optimized.metrics.optimized_tokens,
        optimized.metrics.summarized
    );

    let requests = [
        ("show git status", "repo: demo"),
        ("show git status", "repo: demo"),
        ("Show git status!", "repo: demo"),
    ];
    for (prompt, context) in requests {
        match engine.lookup(prompt, context, &[]) {
            Some(hit) => println!(
                "{:?} hit for '{}' (similarity {:.2}): {}",
                hit.tier, prompt, hit.similarity, hit.response
            ),
            None => {
                println!("Miss for '{}', calling the model", prompt);
                engine
                    .store(
                        prompt,
                        context,
                        "On branch main, nothing to commit.",
                        EntryMetadata {
                            tokens_saved: 25,
                            response_time_ms: 800,
                        },
                        &[],
                    )
                    .await;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&engine.stats())?);
    println!("{}", engine.metrics().export_prometheus());

    Ok(())
}
