//! The `config` table: plain key/value settings and data sources.
//!
//! A data source owns every row with its `dataID`. Its settings live as JSON
//! in the row with `key2 = 'config'`; collection bookkeeping goes into a
//! `last_collect` row, which carries no status so it never overrides the
//! source's enabled flag.

use super::Repository;
use crate::db::entities::CONFIG;
use crate::db::facade::{execute_in, insert_record_in, select_in, Filter, QueryError, SaveOutcome};
use crate::db::record::Record;
use crate::db::value::{DbRow, SqlValue};
use crate::domain::datasource::{extract_steam_id, ConfigRow, CONFIG_KEY};
use crate::domain::primitives::lenient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

pub const LAST_COLLECT_KEY: &str = "last_collect";

/// Body of a data-source create or update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataSourceInput {
    #[serde(rename = "dataName", deserialize_with = "lenient::opt_string", default)]
    pub data_name: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient::opt_string", default)]
    pub source_type: Option<String>,
    #[serde(rename = "configJson", deserialize_with = "lenient::opt_string", default)]
    pub config_json: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl DataSourceInput {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn status(&self) -> &'static str {
        if self.is_enabled() {
            "1"
        } else {
            "0"
        }
    }

    pub fn config_json(&self) -> &str {
        self.config_json.as_deref().unwrap_or("{}")
    }

    /// Steam ID declared inside `configJson`, or empty.
    pub fn steam_id(&self) -> String {
        serde_json::from_str::<Value>(self.config_json())
            .ok()
            .and_then(|v| extract_steam_id(&v))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSourceHead {
    #[serde(rename = "dataName")]
    pub data_name: Option<String>,
    pub status: Option<String>,
}

impl DataSourceHead {
    pub fn enabled(&self) -> bool {
        self.status.as_deref() == Some("1")
    }
}

fn config_row(row: &DbRow) -> ConfigRow {
    ConfigRow {
        data_id: row.i64("dataID"),
        data_name: row.text("dataName"),
        key1: row.text("key1"),
        key2: row.text("key2"),
        value: row.text("value"),
        status: row.text("status"),
        steam_id: row.text("steamID"),
    }
}

impl Repository {
    // =========================================================================
    // Key/value settings
    // =========================================================================

    /// Update the value of `(dataName, key1, key2)` or insert it enabled.
    pub async fn save_config(
        &self,
        data_name: &str,
        key1: &str,
        key2: &str,
        value: &str,
    ) -> Result<SaveOutcome, QueryError> {
        let filter = Filter::new()
            .eq("dataName", data_name)
            .eq("key1", key1)
            .eq("key2", key2)
            .limit(1);
        if let Some(row) = self.db.find_rows(&CONFIG, &filter).await?.first() {
            let data_id = row.i64("dataID");
            info!("Updating config {:?} ({} / {})", data_id, key1, key2);
            self.db
                .update(
                    "UPDATE \"config\" SET \"value\" = ? WHERE \"dataName\" = ? AND \"key1\" = ? AND \"key2\" = ?",
                    &[value.into(), data_name.into(), key1.into(), key2.into()],
                )
                .await?;
            return Ok(SaveOutcome::Updated);
        }

        self.db
            .execute(
                "INSERT INTO \"config\" (\"dataName\", \"key1\", \"key2\", \"value\", \"status\") VALUES (?, ?, ?, ?, '1')",
                &[data_name.into(), key1.into(), key2.into(), value.into()],
            )
            .await?;
        Ok(SaveOutcome::Inserted)
    }

    /// Rows matching the given keys, newest dataID first. At least one key is expected.
    pub async fn list_configs(
        &self,
        key1: Option<&str>,
        key2: Option<&str>,
    ) -> Result<Vec<Value>, QueryError> {
        let filter = [("key1", key1), ("key2", key2)]
            .into_iter()
            .fold(Filter::new(), |f, (col, v)| match v {
                Some(v) => f.eq(col, v),
                None => f,
            });
        let sql = format!(
            "SELECT \"dataID\", \"dataName\", \"key1\", \"key2\", \"value\", \"status\", \"steamID\", datetime('now') AS updated_at FROM \"config\"{} ORDER BY \"dataID\" DESC",
            filter.where_sql()
        );
        let rows = self.db.select(&sql, filter.params()).await?;
        Ok(rows
            .iter()
            .map(|r| {
                json!({
                    "id": r.i64("dataID"),
                    "dataName": r.text("dataName"),
                    "key1": r.text("key1"),
                    "key2": r.text("key2"),
                    "value": r.text("value"),
                    "status": r.text("status"),
                    "steamID": r.text("steamID"),
                    "updated_at": r.text("updated_at"),
                })
            })
            .collect())
    }

    pub async fn delete_config(&self, data_id: i64) -> Result<u64, QueryError> {
        self.db
            .delete("DELETE FROM \"config\" WHERE \"dataID\" = ?", &[data_id.into()])
            .await
    }

    /// `[[value], ...]` for a key pair.
    pub async fn config_values(&self, key1: &str, key2: &str) -> Result<Vec<DbRow>, QueryError> {
        self.db
            .select(
                "SELECT \"value\" FROM \"config\" WHERE \"key1\" = ? AND \"key2\" = ?",
                &[key1.into(), key2.into()],
            )
            .await
    }

    /// Non-null values under `key1`, optionally narrowed to one `key2`.
    pub async fn config_texts(&self, key1: &str, key2: Option<&str>) -> Result<Vec<String>, QueryError> {
        let mut filter = Filter::new().eq("key1", key1);
        if let Some(key2) = key2 {
            filter = filter.eq("key2", key2);
        }
        let rows = self
            .db
            .select(
                &format!("SELECT \"value\" FROM \"config\"{}", filter.where_sql()),
                filter.params(),
            )
            .await?;
        Ok(rows.iter().filter_map(|r| r.text("value")).collect())
    }

    pub async fn set_config_value(&self, key1: &str, key2: &str, value: &str) -> Result<u64, QueryError> {
        self.db
            .update(
                "UPDATE \"config\" SET \"value\" = ? WHERE \"key1\" = ? AND \"key2\" = ?",
                &[value.into(), key1.into(), key2.into()],
            )
            .await
    }

    pub async fn config_rows(&self) -> Result<Vec<ConfigRow>, QueryError> {
        let rows = self
            .db
            .find_rows(&CONFIG, &Filter::new().order_by("\"dataID\""))
            .await?;
        Ok(rows.iter().map(config_row).collect())
    }

    // =========================================================================
    // Data sources
    // =========================================================================

    /// Create a source under the next free dataID and return that id.
    pub async fn create_data_source(&self, input: &DataSourceInput) -> Result<i64, QueryError> {
        let mut tx = self.db.begin().await?;
        let max_id = select_in(&mut *tx, "SELECT MAX(\"dataID\") FROM \"config\"", &[])
            .await?
            .first()
            .and_then(|r| r.at(0).and_then(SqlValue::as_i64))
            .unwrap_or(0);
        let new_id = max_id + 1;

        let mut record = Record::new(&CONFIG)
            .with("dataID", new_id)
            .with("dataName", input.data_name.clone())
            .with("key1", input.source_type.clone().unwrap_or_default())
            .with("key2", CONFIG_KEY)
            .with("value", input.config_json())
            .with("status", input.status())
            .with("steamID", input.steam_id());
        insert_record_in(&mut *tx, &mut record).await?;
        tx.commit().await?;

        info!("Created data source {} ({:?})", new_id, input.data_name);
        Ok(new_id)
    }

    /// Rewrite the config row of a source. Returns rows changed.
    pub async fn update_data_source(&self, data_id: i64, input: &DataSourceInput) -> Result<u64, QueryError> {
        let data_name = input.data_name.clone().unwrap_or_default();
        let mut tx = self.db.begin().await?;
        let affected = execute_in(
            &mut *tx,
            "UPDATE \"config\" SET \"dataName\" = ?, \"key1\" = ?, \"value\" = ?, \"status\" = ?, \"steamID\" = ? WHERE \"dataID\" = ? AND \"key2\" = 'config'",
            &[
                data_name.as_str().into(),
                input.source_type.clone().unwrap_or_default().into(),
                input.config_json().into(),
                input.status().into(),
                input.steam_id().into(),
                data_id.into(),
            ],
        )
        .await?;
        // Sibling rows follow the rename so the source stays one group.
        execute_in(
            &mut *tx,
            "UPDATE \"config\" SET \"dataName\" = ? WHERE \"dataID\" = ?",
            &[data_name.as_str().into(), data_id.into()],
        )
        .await?;
        tx.commit().await?;
        Ok(affected)
    }

    /// Remove every row of a source. False when it did not exist.
    pub async fn delete_data_source(&self, data_id: i64) -> Result<bool, QueryError> {
        let removed = self.delete_config(data_id).await?;
        if removed > 0 {
            info!("Deleted data source {} ({} rows)", data_id, removed);
        }
        Ok(removed > 0)
    }

    pub async fn set_data_source_enabled(&self, data_id: i64, enabled: bool) -> Result<u64, QueryError> {
        self.db
            .update(
                "UPDATE \"config\" SET \"status\" = ? WHERE \"dataID\" = ? AND \"status\" IS NOT NULL",
                &[if enabled { "1" } else { "0" }.into(), data_id.into()],
            )
            .await
    }

    pub async fn data_source_head(&self, data_id: i64) -> Result<Option<DataSourceHead>, QueryError> {
        let row = self
            .db
            .select_one(
                "SELECT \"dataName\", \"status\" FROM \"config\" WHERE \"dataID\" = ? ORDER BY \"key2\" = 'config' DESC LIMIT 1",
                &[data_id.into()],
            )
            .await?;
        Ok(row.map(|r| DataSourceHead {
            data_name: r.text("dataName"),
            status: r.text("status"),
        }))
    }

    /// Store the time of the latest collection run for a source.
    pub async fn record_collect_time(&self, data_id: i64, timestamp: &str) -> Result<(), QueryError> {
        let mut tx = self.db.begin().await?;
        let updated = execute_in(
            &mut *tx,
            "UPDATE \"config\" SET \"value\" = ? WHERE \"dataID\" = ? AND \"key2\" = ?",
            &[timestamp.into(), data_id.into(), LAST_COLLECT_KEY.into()],
        )
        .await?;
        if updated == 0 {
            let head = select_in(
                &mut *tx,
                "SELECT \"dataName\", \"key1\" FROM \"config\" WHERE \"dataID\" = ? AND \"key2\" = 'config' LIMIT 1",
                &[data_id.into()],
            )
            .await?;
            let head = head.first();
            let mut record = Record::new(&CONFIG)
                .with("dataID", data_id)
                .with("dataName", head.and_then(|r| r.text("dataName")))
                .with("key1", head.and_then(|r| r.text("key1")))
                .with("key2", LAST_COLLECT_KEY)
                .with("value", timestamp);
            insert_record_in(&mut *tx, &mut record).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
