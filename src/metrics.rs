//! Pipeline metrics and observability module.
//!
//! Tracks response latency per serving path (priority cache, content cache,
//! backend call) plus counters for outcomes that never produce a latency
//! sample: backend failures, rate-limited requests and store anomalies.
//!
//! Samples are folded into running aggregates as they arrive, so memory use
//! stays constant for the life of the process. Nothing is persisted; a
//! restart starts from zero.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Serving path a successful request took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatencyCategory {
    PriorityCacheHit,
    ContentCacheHit,
    BackendCall,
}

impl LatencyCategory {
    pub const ALL: [LatencyCategory; 3] = [
        LatencyCategory::PriorityCacheHit,
        LatencyCategory::ContentCacheHit,
        LatencyCategory::BackendCall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LatencyCategory::PriorityCacheHit => "priority_cache_hit",
            LatencyCategory::ContentCacheHit => "content_cache_hit",
            LatencyCategory::BackendCall => "backend_call",
        }
    }

    fn index(self) -> usize {
        match self {
            LatencyCategory::PriorityCacheHit => 0,
            LatencyCategory::ContentCacheHit => 1,
            LatencyCategory::BackendCall => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LatencyStats {
    count: usize,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
}

impl LatencyStats {
    fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.min = Some(self.min.map_or(elapsed, |min| min.min(elapsed)));
        self.max = self.max.max(elapsed);
    }

    fn summary(&self) -> Option<LatencySummary> {
        let min = self.min?;
        Some(LatencySummary {
            count: self.count,
            avg_time: self.total.as_secs_f64() / self.count as f64,
            min_time: min.as_secs_f64(),
            max_time: self.max.as_secs_f64(),
        })
    }
}

/// Latency and outcome counters for one running service.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    latency: Mutex<[LatencyStats; 3]>,

    /// Backend calls that ended in an error (including timeouts)
    backend_failures: AtomicUsize,

    /// Requests denied by the IP rate limiter
    rate_limited: AtomicUsize,

    /// Store reads or writes that failed and were degraded
    store_errors: AtomicUsize,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the response time of a request served through `category`.
    pub fn record(&self, category: LatencyCategory, elapsed: Duration) {
        let mut latency = self.latency.lock().expect("metrics mutex poisoned");
        latency[category.index()].record(elapsed);
    }

    pub fn record_backend_failure(&self) {
        self.backend_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backend_failures(&self) -> usize {
        self.backend_failures.load(Ordering::Relaxed)
    }

    pub fn rate_limited(&self) -> usize {
        self.rate_limited.load(Ordering::Relaxed)
    }

    pub fn store_errors(&self) -> usize {
        self.store_errors.load(Ordering::Relaxed)
    }

    /// Number of latency samples recorded for `category`.
    pub fn count(&self, category: LatencyCategory) -> usize {
        self.latency.lock().expect("metrics mutex poisoned")[category.index()].count
    }

    /// Generate a metrics report.
    ///
    /// Categories without samples are omitted from `latency`.
    pub fn report(&self) -> MetricsReport {
        let stats = *self.latency.lock().expect("metrics mutex poisoned");

        let latency = LatencyCategory::ALL
            .iter()
            .filter_map(|category| {
                stats[category.index()]
                    .summary()
                    .map(|summary| (category.as_str(), summary))
            })
            .collect();

        MetricsReport {
            latency,
            backend_failures: self.backend_failures(),
            rate_limited: self.rate_limited(),
            store_errors: self.store_errors(),
        }
    }
}

/// Latency summary of one category, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub avg_time: f64,
    pub min_time: f64,
    pub max_time: f64,
}

/// Metrics report containing current pipeline statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    /// Per-category latency, keyed by category name
    pub latency: BTreeMap<&'static str, LatencySummary>,

    /// Number of failed backend calls
    pub backend_failures: usize,

    /// Number of requests denied by the rate limiter
    pub rate_limited: usize,

    /// Number of degraded store operations
    pub store_errors: usize,
}
