//! Periodic collection, one tokio task per enabled data source.

use super::{CollectError, CollectReport, CollectTarget, Collector};
use crate::db::Repository;
use crate::domain::build_views;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A running poll task and the period it was started with.
#[derive(Debug)]
struct Scheduled {
    handle: JoinHandle<()>,
    interval_secs: u64,
}

#[derive(Debug)]
pub struct CollectorScheduler {
    collector: Arc<dyn Collector>,
    repo: Arc<Repository>,
    permits: Arc<Semaphore>,
    tasks: Mutex<HashMap<i64, Scheduled>>,
}

/// One collection under a worker permit, recording the run time on success.
async fn collect_once(
    collector: &dyn Collector,
    repo: &Repository,
    permits: &Semaphore,
    target: &CollectTarget,
) -> Result<CollectReport, CollectError> {
    let _permit = permits
        .acquire()
        .await
        .map_err(|_| CollectError::Store("collector is shutting down".to_string()))?;

    info!("开始采集数据源: {} (ID: {})", target.data_name, target.data_id);
    match collector.collect(target).await {
        Ok(report) => {
            repo.record_collect_time(target.data_id, &report.started_at)
                .await?;
            info!(
                "采集完成: {}, 采集到 {} 条数据 (run {})",
                target.data_name, report.count, report.run_id
            );
            Ok(report)
        }
        Err(e) => {
            error!("Collection for data source {} failed: {}", target.data_id, e);
            Err(e)
        }
    }
}

impl CollectorScheduler {
    pub fn new(collector: Arc<dyn Collector>, repo: Arc<Repository>, workers: usize) -> Self {
        Self {
            collector,
            repo,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Start polling a data source, replacing any task already running for it.
    pub async fn start(&self, target: CollectTarget) {
        let data_id = target.data_id;
        let interval_secs = target.interval_secs.max(1);
        let period = Duration::from_secs(interval_secs);
        let collector = self.collector.clone();
        let repo = self.repo.clone();
        let permits = self.permits.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // Failures are already logged; the next tick retries.
                let _ = collect_once(collector.as_ref(), &repo, &permits, &target).await;
            }
        });

        let scheduled = Scheduled {
            handle,
            interval_secs,
        };
        if let Some(previous) = self.tasks.lock().await.insert(data_id, scheduled) {
            previous.handle.abort();
        }
        info!("Scheduled data source {} every {:?}", data_id, period);
    }

    pub async fn stop(&self, data_id: i64) -> bool {
        match self.tasks.lock().await.remove(&data_id) {
            Some(scheduled) => {
                scheduled.handle.abort();
                info!("Stopped collection for data source {}", data_id);
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        let mut tasks = self.tasks.lock().await;
        for (_, scheduled) in tasks.drain() {
            scheduled.handle.abort();
        }
    }

    pub async fn running_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.tasks.lock().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Period in seconds of the task polling `data_id`, if one is running.
    pub async fn interval_of(&self, data_id: i64) -> Option<u64> {
        self.tasks
            .lock()
            .await
            .get(&data_id)
            .map(|s| s.interval_secs)
    }

    async fn targets(&self) -> Result<Vec<(CollectTarget, bool)>, CollectError> {
        let rows = self.repo.config_rows().await?;
        let views = build_views(&rows, &super::now_iso());
        Ok(views
            .iter()
            .filter_map(|v| CollectTarget::from_view(v).map(|t| (t, v.enabled)))
            .collect())
    }

    /// Start every enabled source that is not running, restart those whose
    /// interval changed, and stop the rest.
    pub async fn sync_with_config(&self) -> Result<(), CollectError> {
        let targets = self.targets().await?;
        let running = self.running_ids().await;

        for id in &running {
            if !targets.iter().any(|(t, enabled)| t.data_id == *id && *enabled) {
                self.stop(*id).await;
            }
        }
        for (target, enabled) in targets {
            if !enabled {
                continue;
            }
            match self.interval_of(target.data_id).await {
                Some(secs) if secs == target.interval_secs.max(1) => {}
                Some(secs) => {
                    info!(
                        "Data source {} interval changed from {}s to {}s",
                        target.data_id, secs, target.interval_secs
                    );
                    self.start(target).await;
                }
                None => self.start(target).await,
            }
        }
        Ok(())
    }

    /// Collect a single data source right now.
    pub async fn run_once(&self, data_id: i64) -> Result<CollectReport, CollectError> {
        let (target, enabled) = self
            .targets()
            .await?
            .into_iter()
            .find(|(t, _)| t.data_id == data_id)
            .ok_or(CollectError::UnknownSource(data_id))?;
        if !enabled {
            warn!("Refusing to collect disabled data source {}", data_id);
            return Err(CollectError::Disabled(data_id));
        }
        collect_once(self.collector.as_ref(), &self.repo, &self.permits, &target).await
    }

    pub async fn test_connection(&self, api_url: &str) -> Result<super::ConnectionReport, CollectError> {
        self.collector.test_connection(api_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockCollector;
    use crate::db::repo::test_support::setup_test_repo;
    use crate::db::repo::DataSourceInput;

    fn source(name: &str, enabled: bool) -> DataSourceInput {
        DataSourceInput {
            data_name: Some(name.to_string()),
            source_type: Some("buff".to_string()),
            config_json: Some(r#"{"sleep_time": 3600}"#.to_string()),
            enabled: Some(enabled),
        }
    }

    #[tokio::test]
    async fn test_sync_starts_enabled_sources_only() {
        let (repo, _tmp) = setup_test_repo().await;
        let on = repo.create_data_source(&source("on", true)).await.unwrap();
        let off = repo.create_data_source(&source("off", false)).await.unwrap();
        let repo = Arc::new(repo);
        let scheduler = CollectorScheduler::new(Arc::new(MockCollector::new()), repo.clone(), 2);

        scheduler.sync_with_config().await.unwrap();
        assert_eq!(scheduler.running_ids().await, vec![on]);

        repo.set_data_source_enabled(on, false).await.unwrap();
        repo.set_data_source_enabled(off, true).await.unwrap();
        scheduler.sync_with_config().await.unwrap();
        assert_eq!(scheduler.running_ids().await, vec![off]);

        scheduler.stop_all().await;
        assert!(scheduler.running_ids().await.is_empty());
        assert!(!scheduler.stop(off).await);
    }

    #[tokio::test]
    async fn test_sync_restarts_on_interval_change() {
        let (repo, _tmp) = setup_test_repo().await;
        let id = repo.create_data_source(&source("on", true)).await.unwrap();
        let repo = Arc::new(repo);
        let mock = MockCollector::new();
        let scheduler = CollectorScheduler::new(Arc::new(mock.clone()), repo.clone(), 2);

        scheduler.sync_with_config().await.unwrap();
        assert_eq!(scheduler.interval_of(id).await, Some(3600));

        // Unchanged config keeps the running task.
        scheduler.sync_with_config().await.unwrap();
        assert_eq!(scheduler.interval_of(id).await, Some(3600));

        let faster = DataSourceInput {
            config_json: Some(r#"{"sleep_time": 1}"#.to_string()),
            ..source("on", true)
        };
        repo.update_data_source(id, &faster).await.unwrap();
        scheduler.sync_with_config().await.unwrap();
        assert_eq!(scheduler.interval_of(id).await, Some(1));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(mock.calls() >= 1, "source still on the old interval");
        scheduler.stop_all().await;
    }

    #[tokio::test]
    async fn test_run_once_records_collect_time() {
        let (repo, _tmp) = setup_test_repo().await;
        let on = repo.create_data_source(&source("on", true)).await.unwrap();
        let off = repo.create_data_source(&source("off", false)).await.unwrap();
        let repo = Arc::new(repo);
        let mock = MockCollector::new().with_count(9);
        let scheduler = CollectorScheduler::new(Arc::new(mock.clone()), repo.clone(), 1);

        let report = scheduler.run_once(on).await.unwrap();
        assert_eq!(report.count, 9);
        assert_eq!(report.data_name, "on");
        assert_eq!(mock.calls(), 1);

        let views = build_views(&repo.config_rows().await.unwrap(), "now");
        let view = views.iter().find(|v| v.data_id == Some(on)).unwrap();
        assert!(view.config.contains_key("last_collect"));

        assert!(matches!(scheduler.run_once(off).await, Err(CollectError::Disabled(_))));
        assert!(matches!(scheduler.run_once(99).await, Err(CollectError::UnknownSource(99))));
        assert_eq!(mock.calls(), 1);
    }
}
