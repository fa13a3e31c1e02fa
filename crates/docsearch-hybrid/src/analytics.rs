//! Search analytics sinks.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use docsearch_core::traits::AnalyticsSink;
use docsearch_core::types::AnalyticsRecord;
use docsearch_core::Result;

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalytics;

#[async_trait]
impl AnalyticsSink for TracingAnalytics {
    async fn record(&self, record: AnalyticsRecord) -> Result<()> {
        tracing::info!(
            target: "docsearch::analytics",
            query_hash = %record.query_hash,
            result_count = record.result_count,
            latency_ms = record.latency_ms,
            success = record.success,
            session_id = record.session_id.as_deref().unwrap_or(""),
            "search"
        );
        Ok(())
    }

    async fn recent_queries(&self, _limit: usize) -> Result<Vec<String>> {
        Ok(vec![])
    }
}

/// Bounded in-memory ring of the latest records; feeds history suggestions.
pub struct MemoryAnalytics {
    capacity: usize,
    records: Mutex<VecDeque<AnalyticsRecord>>,
}

impl MemoryAnalytics {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), records: Mutex::new(VecDeque::new()) }
    }

    pub fn records(&self) -> Vec<AnalyticsRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryAnalytics {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl AnalyticsSink for MemoryAnalytics {
    async fn record(&self, record: AnalyticsRecord) -> Result<()> {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        Ok(())
    }

    async fn recent_queries(&self, limit: usize) -> Result<Vec<String>> {
        Ok(self.records.lock().iter().rev().filter(|r| r.success).take(limit).map(|r| r.query.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docsearch_core::types::SearchFilters;

    fn record(query: &str, success: bool) -> AnalyticsRecord {
        AnalyticsRecord {
            query_hash: blake3::hash(query.as_bytes()).to_hex().to_string(),
            query: query.into(),
            result_count: 1,
            latency_ms: 5,
            success,
            filters: SearchFilters::default(),
            session_id: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn ring_drops_oldest_and_lists_newest_first() {
        let sink = MemoryAnalytics::new(3);
        for (q, ok) in [("a", true), ("b", true), ("c", false), ("d", true)] {
            sink.record(record(q, ok)).await.unwrap();
        }
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.recent_queries(10).await.unwrap(), vec!["d", "b"]);
    }
}
