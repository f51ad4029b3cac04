use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Histogram, HistogramOpts, Registry, TextEncoder,
};
use crate::error::Result;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Resolution metrics
    pub static ref QUOTES_RESOLVED: Counter = Counter::new(
        "quotes_resolved_total",
        "Total number of sources that produced a complete quote"
    ).expect("metric can be created");

    pub static ref SOURCES_UNAVAILABLE: Counter = Counter::new(
        "sources_unavailable_total",
        "Total number of source resolutions that ended unavailable"
    ).expect("metric can be created");

    pub static ref SOURCE_TIMEOUTS: Counter = Counter::new(
        "source_timeouts_total",
        "Total number of sources cut off by their timeout"
    ).expect("metric can be created");

    pub static ref FETCH_FAILURES: Counter = Counter::new(
        "source_fetch_failures_total",
        "Total number of endpoint fetches that failed"
    ).expect("metric can be created");

    pub static ref PARSE_FAILURES: Counter = Counter::new(
        "source_parse_failures_total",
        "Total number of sources that answered without a usable quote"
    ).expect("metric can be created");

    // Bulk feed cache metrics
    pub static ref CACHE_HITS: Counter = Counter::new(
        "bulk_feed_cache_hits_total",
        "Total number of bulk feed cache hits"
    ).expect("metric can be created");

    pub static ref CACHE_MISSES: Counter = Counter::new(
        "bulk_feed_cache_misses_total",
        "Total number of bulk feed downloads"
    ).expect("metric can be created");

    pub static ref CACHE_FETCH_FAILURES: Counter = Counter::new(
        "bulk_feed_fetch_failures_total",
        "Total number of failed bulk feed downloads"
    ).expect("metric can be created");

    // Latency metrics
    pub static ref SOURCE_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "source_resolution_latency_seconds",
            "Per-source resolution latency"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0])
    ).expect("metric can be created");

    pub static ref AGGREGATION_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "aggregation_latency_seconds",
            "Latency of a full aggregation round"
        ).buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0])
    ).expect("metric can be created");
}

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(QUOTES_RESOLVED.clone()))?;
    REGISTRY.register(Box::new(SOURCES_UNAVAILABLE.clone()))?;
    REGISTRY.register(Box::new(SOURCE_TIMEOUTS.clone()))?;
    REGISTRY.register(Box::new(FETCH_FAILURES.clone()))?;
    REGISTRY.register(Box::new(PARSE_FAILURES.clone()))?;
    REGISTRY.register(Box::new(CACHE_HITS.clone()))?;
    REGISTRY.register(Box::new(CACHE_MISSES.clone()))?;
    REGISTRY.register(Box::new(CACHE_FETCH_FAILURES.clone()))?;
    REGISTRY.register(Box::new(SOURCE_LATENCY.clone()))?;
    REGISTRY.register(Box::new(AGGREGATION_LATENCY.clone()))?;
    Ok(())
}

/// Prometheus text exposition of everything registered.
pub fn gather_text() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
