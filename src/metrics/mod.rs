//! Metrics collection for observability

use crate::context::CompressionMetrics;
use crate::error::Result;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry, Counter, CounterVec, Histogram, Opts, Registry,
};

/// Engine metrics, registered on a registry owned by this instance
pub struct EngineMetrics {
    registry: Registry,

    // Compression metrics
    pub optimizations: Counter,
    pub summaries: Counter,
    pub compression_ratio: Histogram,
    pub tokens_removed: Counter,

    // Cache metrics
    pub cache_lookups: CounterVec,
    pub cache_evictions: CounterVec,
    pub persistence_failures: Counter,
}

impl EngineMetrics {
    /// Create a new metrics collector with a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let optimizations = register_counter_with_registry!(
            Opts::new("context_optimizations_total", "Total optimize calls"),
            registry
        )?;

        let summaries = register_counter_with_registry!(
            Opts::new("context_summaries_total", "Total summary collapses performed"),
            registry
        )?;

        let compression_ratio = register_histogram_with_registry!(
            "context_compression_ratio",
            "Fraction of tokens removed per optimize call",
            vec![0.0, 0.1, 0.25, 0.5, 0.75, 0.9, 1.0],
            registry
        )?;

        let tokens_removed = register_counter_with_registry!(
            Opts::new("context_tokens_removed_total", "Total estimated tokens removed"),
            registry
        )?;

        let cache_lookups = register_counter_vec_with_registry!(
            Opts::new("response_cache_lookups_total", "Total cache lookups"),
            &["tier", "outcome"],
            registry
        )?;

        let cache_evictions = register_counter_vec_with_registry!(
            Opts::new("response_cache_evictions_total", "Total cache evictions"),
            &["tier"],
            registry
        )?;

        let persistence_failures = register_counter_with_registry!(
            Opts::new(
                "response_cache_persistence_failures_total",
                "Total failed cache writes"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            optimizations,
            summaries,
            compression_ratio,
            tokens_removed,
            cache_lookups,
            cache_evictions,
            persistence_failures,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record the outcome of one optimize call
    pub fn record_optimization(&self, metrics: &CompressionMetrics) {
        self.optimizations.inc();
        self.compression_ratio.observe(metrics.compression_ratio);
        self.tokens_removed
            .inc_by(metrics.original_tokens.saturating_sub(metrics.optimized_tokens) as f64);
        if metrics.summarized {
            self.summaries.inc();
        }
    }

    pub fn record_cache_lookup(&self, tier: &str, outcome: &str) {
        self.cache_lookups.with_label_values(&[tier, outcome]).inc();
    }

    pub fn record_evictions(&self, tier: &str, count: usize) {
        self.cache_evictions
            .with_label_values(&[tier])
            .inc_by(count as f64);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }

        String::from_utf8(buffer).unwrap_or_default()
    }
}
