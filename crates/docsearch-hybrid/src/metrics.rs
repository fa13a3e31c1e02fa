use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use docsearch_core::types::MetricsSnapshot;

const LATENCY_ALPHA: f64 = 0.1;

/// Per-engine counters. Safe to update from concurrent searches.
#[derive(Debug, Default)]
pub struct Metrics {
    total_searches: AtomicU64,
    cache_hits: AtomicU64,
    error_count: AtomicU64,
    /// `None` until the first sample seeds the average.
    average_latency_ms: Mutex<Option<f64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_search(&self) {
        self.total_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, latency_ms: u64) {
        let sample = latency_ms as f64;
        let mut avg = self.average_latency_ms.lock();
        *avg = Some(match *avg {
            Some(prev) => prev * (1.0 - LATENCY_ALPHA) + sample * LATENCY_ALPHA,
            None => sample,
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_searches: self.total_searches.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            average_latency_ms: self.average_latency_ms.lock().unwrap_or(0.0),
            error_count: self.error_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_latency_seeds_the_average() {
        let m = Metrics::new();
        m.record_latency(100);
        assert!((m.snapshot().average_latency_ms - 100.0).abs() < 1e-9);
        m.record_latency(200);
        assert!((m.snapshot().average_latency_ms - 110.0).abs() < 1e-9);
    }

    #[test]
    fn counters_accumulate() {
        let m = Metrics::new();
        m.record_search();
        m.record_search();
        m.record_cache_hit();
        m.record_error();
        let s = m.snapshot();
        assert_eq!((s.total_searches, s.cache_hits, s.error_count), (2, 1, 1));
    }
}
