//! Conversation budget and response cache engine
//!
//! - `context`: keeps a conversation inside a token budget
//! - `cache`: exact and strategy-gated response caches
//! - `engine`: owned wiring of both for a conversational loop

pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;

pub use crate::cache::{ResponseCache, SmartCacheManager};
pub use crate::config::Config;
pub use crate::context::{ContextCompressor, Message, OptimizedContext, Role};
pub use crate::engine::{CacheHit, CacheTier, ContextEngine, EngineStats};
pub use crate::error::{ContextError, Result};
pub use crate::metrics::EngineMetrics;
