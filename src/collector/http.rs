//! Scraper service client.

use super::{now_iso, CollectError, CollectReport, CollectTarget, Collector, ConnectionReport};
use crate::config::ProxyConfig;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: Client,
    base_url: String,
}

impl HttpCollector {
    pub fn new(base_url: String, proxy: Option<&ProxyConfig>) -> Result<Self, CollectError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(60));
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy.url())
                .map_err(|e| CollectError::Network(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| CollectError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn backoff() -> ExponentialBackoff {
        ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        }
    }
}

/// 429 and 5xx are worth retrying; any other failure is final.
fn check_status(response: Response) -> Result<Response, backoff::Error<CollectError>> {
    let status = response.status();
    if status == 429 {
        return Err(backoff::Error::transient(CollectError::RateLimited));
    }
    if status.is_server_error() {
        return Err(backoff::Error::transient(CollectError::Http {
            status: status.as_u16(),
            message: "Server error".to_string(),
        }));
    }
    if !status.is_success() {
        return Err(backoff::Error::permanent(CollectError::Http {
            status: status.as_u16(),
            message: "Client error".to_string(),
        }));
    }
    Ok(response)
}

/// The scraper answers with either a bare count or an object carrying one.
fn parse_count(body: &serde_json::Value) -> Result<u64, CollectError> {
    body.as_u64()
        .or_else(|| body.get("count").and_then(|v| v.as_u64()))
        .or_else(|| body.get("data").and_then(|d| d.get("count")).and_then(|v| v.as_u64()))
        .ok_or_else(|| CollectError::Parse("response carries no count".to_string()))
}

#[async_trait]
impl Collector for HttpCollector {
    async fn collect(&self, target: &CollectTarget) -> Result<CollectReport, CollectError> {
        let url = format!("{}/collect", self.base_url);
        let started_at = now_iso();
        debug!(
            "Collecting data source {} ({}) via {}",
            target.data_id, target.source_type, url
        );

        let body = retry(Self::backoff(), || async {
            let response = self
                .client
                .post(&url)
                .json(target)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(CollectError::Network(e.to_string())))?;
            check_status(response)?
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(CollectError::Parse(e.to_string())))
        })
        .await?;

        Ok(CollectReport {
            run_id: Uuid::new_v4(),
            data_id: target.data_id,
            data_name: target.data_name.clone(),
            count: parse_count(&body)?,
            started_at,
            status: "completed".to_string(),
        })
    }

    async fn test_connection(&self, api_url: &str) -> Result<ConnectionReport, CollectError> {
        let started = Instant::now();
        let response = self
            .client
            .get(api_url)
            .send()
            .await
            .map_err(|e| CollectError::Network(e.to_string()))?;
        let status = response.status();
        let latency = format!("{}ms", started.elapsed().as_millis());
        if status.is_server_error() {
            warn!("Connection test of {} answered {}", api_url, status);
            return Ok(ConnectionReport {
                latency,
                status: "degraded".to_string(),
            });
        }
        Ok(ConnectionReport {
            latency,
            status: "online".to_string(),
        })
    }
}
