//! Mock collector for testing without a scraper service.

use super::{now_iso, CollectError, CollectReport, CollectTarget, Collector, ConnectionReport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Collector that reports a fixed count and remembers how often it ran.
#[derive(Debug, Clone, Default)]
pub struct MockCollector {
    count: u64,
    failure: Option<CollectError>,
    calls: Arc<AtomicUsize>,
}

impl MockCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the row count reported by every collection.
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    /// Make every collection and connection test fail with `err`.
    pub fn with_failure(mut self, err: CollectError) -> Self {
        self.failure = Some(err);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collector for MockCollector {
    async fn collect(&self, target: &CollectTarget) -> Result<CollectReport, CollectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(CollectReport {
            run_id: Uuid::new_v4(),
            data_id: target.data_id,
            data_name: target.data_name.clone(),
            count: self.count,
            started_at: now_iso(),
            status: "completed".to_string(),
        })
    }

    async fn test_connection(&self, _api_url: &str) -> Result<ConnectionReport, CollectError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(ConnectionReport {
            latency: "0ms".to_string(),
            status: "online".to_string(),
        })
    }
}
