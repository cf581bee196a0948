//! YouPin lease (rental) operations.

use super::Repository;
use crate::db::entities::YYYP_LENT;
use crate::db::facade::{Filter, InsertOutcome, QueryError};
use crate::db::record::Record;
use crate::db::value::SqlValue;
use crate::domain::status::{LEASE_DONE, LEASE_OUTSTANDING};
use crate::domain::{LeaseEntry, LeaseUpdate};
use tracing::debug;

/// Start time reported when a user has no leases yet.
pub const DEFAULT_LEASE_START: &str = "2000-01-01 00:00:00";

impl Repository {
    /// Leases not yet completed.
    pub async fn active_lease_ids(&self) -> Result<Vec<String>, QueryError> {
        let filter = Filter::new().condition("\"status\" NOT IN (?)", vec![LEASE_DONE.into()]);
        Ok(self
            .db
            .find_all(&YYYP_LENT, &filter)
            .await?
            .iter()
            .filter_map(|r| r.get("ID").and_then(SqlValue::to_text))
            .collect())
    }

    /// Leases past their end date that are still out.
    pub async fn overdue_lease_ids(&self, today: &str) -> Result<Vec<String>, QueryError> {
        let mut params: Vec<SqlValue> = vec![today.into()];
        params.extend(LEASE_OUTSTANDING.iter().map(|s| SqlValue::from(*s)));
        let rows = self
            .db
            .select(
                "SELECT \"ID\" FROM \"yyyp_lent\" WHERE \"lean_end_time\" < ? AND \"status\" IN (?, ?, ?)",
                &params,
            )
            .await?;
        Ok(rows.iter().filter_map(|r| r.text("ID")).collect())
    }

    pub async fn latest_lease_start(&self, user: &str) -> Result<String, QueryError> {
        let row = self
            .db
            .select_one(
                "SELECT \"lean_start_time\" FROM \"yyyp_lent\" WHERE \"data_user\" = ? ORDER BY \"lean_start_time\" DESC LIMIT 1",
                &[user.into()],
            )
            .await?;
        Ok(row
            .and_then(|r| r.text("lean_start_time"))
            .unwrap_or_else(|| DEFAULT_LEASE_START.to_string()))
    }

    pub async fn count_leases(&self, user: &str) -> Result<i64, QueryError> {
        self.db
            .count(&YYYP_LENT, &Filter::new().eq("data_user", user))
            .await
    }

    /// Refresh status, end time and length. Returns whether a row matched.
    pub async fn update_lease(&self, update: &LeaseUpdate) -> Result<bool, QueryError> {
        let Some(id) = update.id.as_deref() else {
            return Ok(false);
        };
        let affected = self
            .db
            .update(
                "UPDATE \"yyyp_lent\" SET \"status\" = ?, \"last_status\" = ?, \"lean_end_time\" = ?, \"total_Lease_Days\" = ? WHERE \"ID\" = ?",
                &[
                    update.status.clone().into(),
                    update.last_status.clone().into(),
                    update.lean_end_time.clone().into(),
                    update.total_lease_days.into(),
                    id.into(),
                ],
            )
            .await?;
        debug!("Updated lease {} ({} rows)", id, affected);
        Ok(affected > 0)
    }

    pub async fn insert_lease(&self, entry: &LeaseEntry) -> Result<InsertOutcome, QueryError> {
        let mut record = Record::new(&YYYP_LENT)
            .with("ID", entry.id.clone())
            .with("weapon_name", entry.weapon_name.clone())
            .with("weapon_type", entry.weapon_type.clone())
            .with("item_name", entry.item_name.clone())
            .with("weapon_float", entry.weapon_float)
            .with("float_range", entry.float_range.clone())
            .with("price", entry.price)
            .with("lenter_name", entry.lenter_name.clone())
            .with("status", entry.status.clone())
            .with("last_status", entry.last_status.clone())
            .with("from", entry.from.clone())
            .with("lean_start_time", entry.lean_start_time.clone())
            .with("lean_end_time", entry.lean_end_time.clone())
            .with("total_Lease_Days", entry.total_lease_days)
            .with("max_Lease_Days", entry.effective_max_days())
            .with("data_user", entry.data_user.clone());
        self.db.insert_record(&mut record).await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::facade::InsertOutcome;
    use crate::db::repo::test_support::setup_test_repo;
    use crate::domain::{LeaseEntry, LeaseUpdate};

    fn lease(id: &str, status: &str, start: &str, end: &str) -> LeaseEntry {
        LeaseEntry {
            id: Some(id.to_string()),
            status: Some(status.to_string()),
            lean_start_time: Some(start.to_string()),
            lean_end_time: Some(end.to_string()),
            total_lease_days: Some(8),
            data_user: Some("7656".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_lease_reports_duplicates() {
        let (repo, _tmp) = setup_test_repo().await;
        let entry = lease("L1", "租赁中", "2024-05-01", "2024-05-09");
        assert_eq!(repo.insert_lease(&entry).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(repo.insert_lease(&entry).await.unwrap(), InsertOutcome::Duplicate);

        let row = repo
            .facade()
            .select_one("SELECT \"max_Lease_Days\" FROM \"yyyp_lent\" WHERE \"ID\" = 'L1'", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.i64("max_Lease_Days"), Some(8));
    }

    #[tokio::test]
    async fn test_active_and_overdue() {
        let (repo, _tmp) = setup_test_repo().await;
        for entry in [
            lease("L1", "租赁中", "2024-05-01", "2024-05-09"),
            lease("L2", "完成", "2024-04-01", "2024-04-09"),
            lease("L3", "归还中", "2024-06-01", "2024-07-01"),
        ] {
            repo.insert_lease(&entry).await.unwrap();
        }

        let mut active = repo.active_lease_ids().await.unwrap();
        active.sort();
        assert_eq!(active, vec!["L1".to_string(), "L3".to_string()]);

        let overdue = repo.overdue_lease_ids("2024-06-15").await.unwrap();
        assert_eq!(overdue, vec!["L1".to_string()]);

        assert_eq!(repo.latest_lease_start("7656").await.unwrap(), "2024-06-01");
        assert_eq!(
            repo.latest_lease_start("nobody").await.unwrap(),
            super::DEFAULT_LEASE_START
        );
        assert_eq!(repo.count_leases("7656").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_lease() {
        let (repo, _tmp) = setup_test_repo().await;
        repo.insert_lease(&lease("L1", "租赁中", "2024-05-01", "2024-05-09"))
            .await
            .unwrap();
        let update = LeaseUpdate {
            id: Some("L1".to_string()),
            status: Some("完成".to_string()),
            last_status: Some("已归还".to_string()),
            lean_end_time: Some("2024-05-08".to_string()),
            total_lease_days: Some(7),
        };
        assert!(repo.update_lease(&update).await.unwrap());
        assert!(repo.active_lease_ids().await.unwrap().is_empty());

        let missing = LeaseUpdate {
            id: Some("L9".to_string()),
            ..update
        };
        assert!(!repo.update_lease(&missing).await.unwrap());
    }
}
