//! Budget-driven conversation compressor
//!
//! Shrinks a message list to fit a token budget:
//! - System messages are always kept
//! - The most recent non-system turns are always kept
//! - Older turns are re-admitted by importance while the budget allows
//! - If the kept set still overflows, the middle of the history is
//!   collapsed into a single `[CONTEXT SUMMARY]` system entry

use super::importance::ImportanceScorer;
use super::models::{
    CompressionMetrics, ImportanceScore, Message, MessageMetric, OptimizedContext,
};
use super::summarizer::{ActionCategorySummarizer, Summarizer};
use super::token_estimator::{CharBasedEstimator, TokenEstimator};
use crate::cache::signature::fingerprint;
use crate::config::CompressorConfig;
use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Read-only statistics over the compressor's metrics table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressorStats {
    pub tracked_messages: usize,
    pub total_tracked_tokens: usize,
    pub average_importance: f32,
    pub by_role: HashMap<String, usize>,
    pub optimizations_run: u64,
    pub summaries_created: u64,
}

/// Conversation compressor with a bounded per-message metrics table
pub struct ContextCompressor {
    config: CompressorConfig,
    estimator: Arc<dyn TokenEstimator>,
    scorer: ImportanceScorer,
    summarizer: Arc<dyn Summarizer>,
    metrics: IndexMap<String, MessageMetric>,
    optimizations_run: u64,
    summaries_created: u64,
}

impl ContextCompressor {
    /// Create a compressor with custom estimator and summarizer
    pub fn new(
        config: CompressorConfig,
        estimator: Arc<dyn TokenEstimator>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            config,
            estimator,
            scorer: ImportanceScorer::new(),
            summarizer,
            metrics: IndexMap::new(),
            optimizations_run: 0,
            summaries_created: 0,
        }
    }

    /// Create with the `ceil(chars/4)` estimator and keyword summarizer
    pub fn with_config(config: CompressorConfig) -> Self {
        Self::new(
            config,
            Arc::new(CharBasedEstimator::default()),
            Arc::new(ActionCategorySummarizer),
        )
    }

    pub fn with_scorer(mut self, scorer: ImportanceScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Optimize against the configured default budget
    pub fn optimize(&mut self, messages: &[Message]) -> OptimizedContext {
        self.optimize_with_budget(messages, self.config.token_budget)
    }

    /// Reduce `messages` to fit `token_budget`
    pub fn optimize_with_budget(
        &mut self,
        messages: &[Message],
        token_budget: usize,
    ) -> OptimizedContext {
        self.optimizations_run += 1;

        let tokens: Vec<usize> = messages
            .iter()
            .map(|m| self.estimator.estimate_message(m))
            .collect();
        let scores: Vec<ImportanceScore> = messages
            .iter()
            .enumerate()
            .map(|(idx, m)| self.scorer.score(m, idx, messages.len()))
            .collect();
        self.record_metrics(messages, &tokens, &scores);

        let original_tokens: usize = tokens.iter().sum();
        if original_tokens <= token_budget {
            debug!(
                "Context within budget: {} <= {} tokens",
                original_tokens, token_budget
            );
            return Self::finish(messages.to_vec(), original_tokens, original_tokens, messages.len(), false);
        }

        warn!(
            "Context exceeds budget: {} > {} tokens, compressing {} messages",
            original_tokens,
            token_budget,
            messages.len()
        );

        let system: Vec<usize> = (0..messages.len())
            .filter(|&i| messages[i].is_system())
            .collect();
        let conversation: Vec<usize> = (0..messages.len())
            .filter(|&i| !messages[i].is_system())
            .collect();

        let (kept, kept_tokens) =
            self.select_by_importance(&system, &conversation, &tokens, &scores, token_budget);

        if kept_tokens <= token_budget {
            let optimized: Vec<Message> = system
                .iter()
                .chain(kept.iter())
                .map(|&i| messages[i].clone())
                .collect();
            info!(
                "Compressed context from {} to {} tokens ({} of {} messages kept)",
                original_tokens,
                kept_tokens,
                optimized.len(),
                messages.len()
            );
            return Self::finish(optimized, original_tokens, kept_tokens, messages.len(), false);
        }

        // The recent window alone overflows; fall back to the summary collapse
        if let Some((collapsed, collapsed_tokens)) =
            self.collapse(messages, &system, &conversation, &tokens)
        {
            if collapsed_tokens <= original_tokens {
                self.summaries_created += 1;
                info!(
                    "Collapsed history into summary: {} -> {} tokens (budget {})",
                    original_tokens, collapsed_tokens, token_budget
                );
                return Self::finish(collapsed, original_tokens, collapsed_tokens, messages.len(), true);
            }
        }

        warn!(
            "Context still exceeds budget after compression: {} > {} tokens",
            kept_tokens, token_budget
        );
        let optimized: Vec<Message> = system
            .iter()
            .chain(kept.iter())
            .map(|&i| messages[i].clone())
            .collect();
        Self::finish(optimized, original_tokens, kept_tokens, messages.len(), false)
    }

    /// Pick the non-system messages to keep, in original order
    ///
    /// Returns the kept indices and the token total including system messages.
    fn select_by_importance(
        &self,
        system: &[usize],
        conversation: &[usize],
        tokens: &[usize],
        scores: &[ImportanceScore],
        token_budget: usize,
    ) -> (Vec<usize>, usize) {
        let recent_start = conversation.len().saturating_sub(self.config.keep_recent);
        let (older, recent) = conversation.split_at(recent_start);

        let mut used: usize = system
            .iter()
            .chain(recent.iter())
            .map(|&i| tokens[i])
            .sum();

        let mut ranked = older.to_vec();
        ranked.sort_by(|&a, &b| scores[b].total.total_cmp(&scores[a].total));

        let mut admitted = Vec::new();
        for idx in ranked {
            if used + tokens[idx] <= token_budget {
                used += tokens[idx];
                admitted.push(idx);
            }
        }
        admitted.sort_unstable();

        debug!(
            "Re-admitted {} of {} older messages by importance",
            admitted.len(),
            older.len()
        );

        admitted.extend_from_slice(recent);
        (admitted, used)
    }

    /// Keep the head and tail of the conversation around one summary entry
    fn collapse(
        &self,
        messages: &[Message],
        system: &[usize],
        conversation: &[usize],
        tokens: &[usize],
    ) -> Option<(Vec<Message>, usize)> {
        let head = self.config.summary_keep_head;
        let tail = self.config.summary_keep_tail;
        if conversation.len() <= head + tail {
            return None;
        }

        let middle: Vec<Message> = conversation[head..conversation.len() - tail]
            .iter()
            .map(|&i| messages[i].clone())
            .collect();
        let summary = self.summarizer.summarize(&middle);
        let summary_tokens = self.estimator.estimate_message(&summary);

        let kept_head = &conversation[..head];
        let kept_tail = &conversation[conversation.len() - tail..];

        let mut collapsed: Vec<Message> = system.iter().map(|&i| messages[i].clone()).collect();
        collapsed.extend(kept_head.iter().map(|&i| messages[i].clone()));
        collapsed.push(summary);
        collapsed.extend(kept_tail.iter().map(|&i| messages[i].clone()));

        let total: usize = system
            .iter()
            .chain(kept_head.iter())
            .chain(kept_tail.iter())
            .map(|&i| tokens[i])
            .sum::<usize>()
            + summary_tokens;

        Some((collapsed, total))
    }

    fn finish(
        optimized_messages: Vec<Message>,
        original_tokens: usize,
        optimized_tokens: usize,
        original_count: usize,
        summarized: bool,
    ) -> OptimizedContext {
        let compression_ratio = if original_tokens == 0 {
            0.0
        } else {
            (original_tokens - optimized_tokens) as f64 / original_tokens as f64
        };

        OptimizedContext {
            metrics: CompressionMetrics {
                original_tokens,
                optimized_tokens,
                compression_ratio,
                original_count,
                optimized_count: optimized_messages.len(),
                summarized,
            },
            optimized_messages,
        }
    }

    fn record_metrics(
        &mut self,
        messages: &[Message],
        tokens: &[usize],
        scores: &[ImportanceScore],
    ) {
        let now = Utc::now();
        for ((message, &estimated_tokens), score) in messages.iter().zip(tokens).zip(scores) {
            let key = fingerprint(&[message.role.as_str(), &message.text()]);
            self.metrics.insert(
                key,
                MessageMetric {
                    estimated_tokens,
                    importance: score.total,
                    timestamp: now,
                    role: message.role,
                },
            );
        }

        while self.metrics.len() > self.config.max_tracked_messages {
            self.metrics.shift_remove_index(0);
        }
    }

    /// Metric recorded for a message, if still tracked
    pub fn metric_for(&self, message: &Message) -> Option<&MessageMetric> {
        let key = fingerprint(&[message.role.as_str(), &message.text()]);
        self.metrics.get(&key)
    }

    pub fn get_stats(&self) -> CompressorStats {
        let mut by_role = HashMap::new();
        for metric in self.metrics.values() {
            *by_role.entry(metric.role.to_string()).or_insert(0) += 1;
        }

        let total_importance: f32 = self.metrics.values().map(|m| m.importance).sum();
        let average_importance = if self.metrics.is_empty() {
            0.0
        } else {
            total_importance / self.metrics.len() as f32
        };

        CompressorStats {
            tracked_messages: self.metrics.len(),
            total_tracked_tokens: self.metrics.values().map(|m| m.estimated_tokens).sum(),
            average_importance,
            by_role,
            optimizations_run: self.optimizations_run,
            summaries_created: self.summaries_created,
        }
    }

    pub fn clear_metrics(&mut self) {
        self.metrics.clear();
    }

    pub fn estimator(&self) -> &Arc<dyn TokenEstimator> {
        &self.estimator
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }
}
