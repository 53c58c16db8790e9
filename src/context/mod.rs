//! Conversation compression with token budget enforcement
//!
//! This module keeps a multi-turn conversation inside a fixed token budget
//! by scoring, dropping and, as a last resort, summarizing history.

pub mod compressor;
pub mod importance;
pub mod models;
pub mod summarizer;
pub mod token_estimator;

pub use compressor::{CompressorStats, ContextCompressor};
pub use importance::ImportanceScorer;
pub use models::{
    CompressionMetrics, ContentPart, ImportanceScore, Message, MessageContent, MessageMetric,
    OptimizedContext, Role,
};
pub use summarizer::{ActionCategory, ActionCategorySummarizer, Summarizer, SUMMARY_PREFIX};
pub use token_estimator::{
    CharBasedEstimator, TiktokenEstimator, TokenEstimator, WordBasedEstimator,
};
