//! Schema maintenance over every registered table.

use super::Repository;
use crate::db::entities::REGISTRY;
use crate::db::facade::QueryError;
use crate::db::sync::{DatabaseInfo, IntegrityReport, SchemaSync, Statistics, SyncReport};
use tracing::info;

impl Repository {
    fn schema_sync(&self) -> SchemaSync {
        SchemaSync::new(self.db.clone())
    }

    pub async fn integrity(&self) -> Result<IntegrityReport, QueryError> {
        self.schema_sync().check_integrity(REGISTRY).await
    }

    pub async fn repair(&self) -> Result<(SyncReport, IntegrityReport), QueryError> {
        let (sync, integrity) = self.schema_sync().repair(REGISTRY).await?;
        info!(
            "Schema repair: {} created, {} altered, healthy={}",
            sync.created(),
            sync.altered(),
            integrity.is_healthy()
        );
        Ok((sync, integrity))
    }

    pub async fn statistics(&self) -> Result<Statistics, QueryError> {
        self.schema_sync().statistics(REGISTRY).await
    }

    pub async fn database_info(&self) -> Result<DatabaseInfo, QueryError> {
        self.schema_sync().database_info(REGISTRY).await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::repo::test_support::setup_test_repo;

    #[tokio::test]
    async fn test_fresh_database_is_healthy() {
        let (repo, _tmp) = setup_test_repo().await;
        assert!(repo.integrity().await.unwrap().is_healthy());

        repo.facade()
            .execute("DROP TABLE \"funds\"", &[])
            .await
            .unwrap();
        let broken = repo.integrity().await.unwrap();
        assert_eq!(broken.missing_tables, vec!["funds".to_string()]);

        let (sync, after) = repo.repair().await.unwrap();
        assert_eq!(sync.created(), 1);
        assert!(after.is_healthy());
    }

    #[tokio::test]
    async fn test_statistics_and_info() {
        let (repo, _tmp) = setup_test_repo().await;
        repo.save_config("yp", "youpin", "token", "x").await.unwrap();

        let stats = repo.statistics().await.unwrap();
        assert_eq!(stats.tables["config"], 1);
        assert_eq!(stats.total, 1);

        let info = repo.database_info().await.unwrap();
        assert!(info.path.unwrap_or_default().ends_with("test.db"));
        assert!(info.tables["buy"].iter().any(|c| c.name == "status_sub"));
    }
}
