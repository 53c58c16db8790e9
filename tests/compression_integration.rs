//! Integration tests for conversation compression
//!
//! These exercise the compressor end to end on realistic conversations
//! through the public crate API.

use context_engine::{
    config::CompressorConfig,
    context::{CharBasedEstimator, TokenEstimator, SUMMARY_PREFIX},
    ContextCompressor, Message,
};

fn conversation(pairs: usize, chars: usize) -> Vec<Message> {
    let mut messages = vec![Message::system("You are a careful coding assistant.")];
    for i in 0..pairs {
        messages.push(Message::user(format!("question {} {}", i, "q".repeat(chars))));
        messages.push(Message::assistant(format!("answer {} {}", i, "a".repeat(chars))));
    }
    messages
}

fn tokens(messages: &[Message]) -> usize {
    CharBasedEstimator::default().estimate_messages(messages)
}

#[test]
fn test_long_session_collapses_into_summary() {
    // 48 ordinary pairs, then two pairs so large the recent window alone overflows
    let mut messages = conversation(48, 6000);
    for i in 0..2 {
        messages.push(Message::user(format!("paste {} {}", i, "u".repeat(190_000))));
        messages.push(Message::assistant(format!("reply {} {}", i, "r".repeat(190_000))));
    }
    assert_eq!(messages.len(), 101);

    let mut compressor = ContextCompressor::with_config(CompressorConfig {
        token_budget: 180_000,
        ..CompressorConfig::default()
    });
    let result = compressor.optimize(&messages);
    let optimized = &result.optimized_messages;

    assert_eq!(optimized[0], messages[0]);
    assert!(result.metrics.summarized);
    assert!(optimized
        .iter()
        .any(|m| m.text().starts_with(SUMMARY_PREFIX)));

    let pairs = optimized
        .iter()
        .filter(|m| m.role == context_engine::Role::User)
        .count();
    assert!(pairs < 50);
    assert!(result.metrics.optimized_tokens <= result.metrics.original_tokens);
}

#[test]
fn test_fifty_pairs_within_default_budget_pass_through() {
    let messages = conversation(50, 6000);
    assert_eq!(messages.len(), 101);
    assert!(tokens(&messages) < 180_000);

    assert_eq!(CompressorConfig::default().token_budget, 180_000);
    let mut compressor = ContextCompressor::with_config(CompressorConfig::default());
    let result = compressor.optimize(&messages);

    assert_eq!(result.optimized_messages, messages);
    assert_eq!(result.metrics.compression_ratio, 0.0);
    assert!(!result.metrics.summarized);
    assert_eq!(result.metrics.optimized_tokens, result.metrics.original_tokens);
}

#[test]
fn test_optimize_is_idempotent() {
    let messages = conversation(20, 400);
    let mut compressor = ContextCompressor::with_config(CompressorConfig::default());

    let first = compressor.optimize_with_budget(&messages, 1_500);
    assert!(first.metrics.optimized_tokens <= 1_500);

    let second = compressor.optimize_with_budget(&first.optimized_messages, 1_500);
    assert_eq!(second.optimized_messages, first.optimized_messages);
    assert_eq!(second.metrics.compression_ratio, 0.0);
}

#[test]
fn test_output_never_grows() {
    let mut compressor = ContextCompressor::with_config(CompressorConfig::default());
    let budgets = [0, 10, 100, 500, 1_000, 5_000, 50_000];
    let shapes = [(0, 10), (1, 50), (3, 900), (10, 200), (25, 1_500)];

    for &(pairs, chars) in &shapes {
        let messages = conversation(pairs, chars);
        let input_tokens = tokens(&messages);
        for &budget in &budgets {
            let result = compressor.optimize_with_budget(&messages, budget);
            assert!(
                tokens(&result.optimized_messages) <= input_tokens,
                "grew at pairs={} chars={} budget={}",
                pairs,
                chars,
                budget
            );
            assert_eq!(result.metrics.original_tokens, input_tokens);
        }
    }
}

#[test]
fn test_system_messages_survive_unmodified() {
    let mut messages = conversation(30, 800);
    messages.insert(7, Message::system("Mid-conversation policy update."));
    messages.push(Message::system("Final reminder: be concise."));
    let systems: Vec<Message> = messages.iter().filter(|m| m.is_system()).cloned().collect();

    let mut compressor = ContextCompressor::with_config(CompressorConfig::default());
    for budget in [50, 2_000, 8_000] {
        let result = compressor.optimize_with_budget(&messages, budget);
        for system in &systems {
            assert!(
                result.optimized_messages.contains(system),
                "system message lost at budget {}",
                budget
            );
        }
        if let Some(summary) = result
            .optimized_messages
            .iter()
            .find(|m| m.text().starts_with(SUMMARY_PREFIX))
        {
            for system in &systems {
                assert!(!summary.text().contains(&system.text()));
            }
        }
    }
}
