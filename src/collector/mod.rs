//! Automatic collection from the external scraper service.
//!
//! Each enabled data source is polled on its own interval by the
//! [`CollectorScheduler`]. The scraper writes its results back through the
//! ingestion endpoints; a collection call only reports how many rows it saw.

use crate::db::QueryError;
use crate::domain::DataSourceView;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub mod http;
pub mod mock;
pub mod scheduler;

pub use http::HttpCollector;
pub use mock::MockCollector;
pub use scheduler::CollectorScheduler;

/// A collector for one data source at a time.
///
/// Implementations must handle retry/backoff themselves.
#[async_trait]
pub trait Collector: Send + Sync + fmt::Debug {
    /// Run one collection for the given data source.
    async fn collect(&self, target: &CollectTarget) -> Result<CollectReport, CollectError>;

    /// Check that an API endpoint answers, measuring round-trip latency.
    async fn test_connection(&self, api_url: &str) -> Result<ConnectionReport, CollectError>;
}

/// What the scraper needs to know about a data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectTarget {
    #[serde(rename = "dataID")]
    pub data_id: i64,
    #[serde(rename = "dataName")]
    pub data_name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(rename = "steamID")]
    pub steam_id: String,
    pub config: Map<String, Value>,
    /// Seconds between scheduled runs.
    #[serde(skip)]
    pub interval_secs: u64,
}

impl CollectTarget {
    /// Targets only exist for views that carry an id.
    pub fn from_view(view: &DataSourceView) -> Option<Self> {
        Some(Self {
            data_id: view.data_id?,
            data_name: view.data_name.clone().unwrap_or_default(),
            source_type: view.source_type.clone(),
            steam_id: view.steam_id.clone(),
            config: view.config.clone(),
            interval_secs: view.sleep_secs(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectReport {
    pub run_id: Uuid,
    #[serde(rename = "dataSourceId")]
    pub data_id: i64,
    #[serde(rename = "dataSourceName")]
    pub data_name: String,
    pub count: u64,
    #[serde(rename = "startTime")]
    pub started_at: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionReport {
    pub latency: String,
    pub status: String,
}

#[derive(Debug, Clone, Error)]
pub enum CollectError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("数据源不存在")]
    UnknownSource(i64),
    #[error("数据源未启用，无法采集")]
    Disabled(i64),
    #[error("Store error: {0}")]
    Store(String),
}

impl From<QueryError> for CollectError {
    fn from(err: QueryError) -> Self {
        CollectError::Store(err.to_string())
    }
}

pub(crate) fn now_iso() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}
