//! Brings the live database in line with the declared registry.
//!
//! Missing tables are created; tables that exist but lack declared columns
//! are healed with `ALTER TABLE ADD COLUMN`. Nothing is ever dropped.

use super::facade::{QueryError, QueryFacade};
use super::schema::TableSchema;
use super::value::SqlValue;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub col_type: String,
    pub notnull: bool,
    pub dflt_value: Option<String>,
    pub pk: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "columns", rename_all = "snake_case")]
pub enum SyncOutcome {
    Created,
    Altered(Vec<String>),
    Unchanged,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub tables: BTreeMap<String, SyncOutcome>,
}

impl SyncReport {
    pub fn created(&self) -> usize {
        self.tables
            .values()
            .filter(|o| matches!(o, SyncOutcome::Created))
            .count()
    }

    pub fn altered(&self) -> usize {
        self.tables
            .values()
            .filter(|o| matches!(o, SyncOutcome::Altered(_)))
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub missing_tables: Vec<String>,
    pub missing_columns: BTreeMap<String, Vec<String>>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.missing_tables.is_empty() && self.missing_columns.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub tables: BTreeMap<String, i64>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    pub path: Option<String>,
    pub tables: BTreeMap<String, Vec<ColumnInfo>>,
}

#[derive(Debug, Clone)]
pub struct SchemaSync {
    db: QueryFacade,
}

impl SchemaSync {
    pub fn new(db: QueryFacade) -> Self {
        Self { db }
    }

    pub async fn table_exists(&self, name: &str) -> Result<bool, QueryError> {
        let rows = self
            .db
            .select(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
                &[SqlValue::from(name)],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    pub async fn table_columns(&self, name: &str) -> Result<Vec<ColumnInfo>, QueryError> {
        let rows = self
            .db
            .select(
                "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?)",
                &[SqlValue::from(name)],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| ColumnInfo {
                cid: row.i64("cid").unwrap_or_default(),
                name: row.text("name").unwrap_or_default(),
                col_type: row.text("type").unwrap_or_default(),
                notnull: row.i64("notnull").unwrap_or_default() != 0,
                dflt_value: row.text("dflt_value"),
                pk: row.i64("pk").unwrap_or_default(),
            })
            .collect())
    }

    async fn create_indexes(&self, schema: &TableSchema) -> Result<(), QueryError> {
        for index in schema.indexes {
            self.db.execute(&schema.create_index_sql(index), &[]).await?;
        }
        Ok(())
    }

    pub async fn ensure_table(&self, schema: &TableSchema) -> Result<SyncOutcome, QueryError> {
        if !self.table_exists(schema.name).await? {
            self.db.execute(&schema.create_table_sql(), &[]).await?;
            self.create_indexes(schema).await?;
            info!("Created table {}", schema.name);
            return Ok(SyncOutcome::Created);
        }

        let existing: Vec<String> = self
            .table_columns(schema.name)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();

        let mut added = Vec::new();
        for field in schema.fields {
            if !existing.iter().any(|c| c == field.name) {
                self.db.execute(&schema.add_column_sql(field), &[]).await?;
                info!("Added missing column {}.{}", schema.name, field.name);
                added.push(field.name.to_string());
            }
        }
        self.create_indexes(schema).await?;

        if added.is_empty() {
            Ok(SyncOutcome::Unchanged)
        } else {
            Ok(SyncOutcome::Altered(added))
        }
    }

    pub async fn sync_all(&self, registry: &[&TableSchema]) -> Result<SyncReport, QueryError> {
        let mut report = SyncReport::default();
        for schema in registry {
            let outcome = self.ensure_table(schema).await?;
            report.tables.insert(schema.name.to_string(), outcome);
        }
        info!(
            "Schema sync complete: {} tables, {} created, {} altered",
            report.tables.len(),
            report.created(),
            report.altered()
        );
        Ok(report)
    }

    pub async fn check_integrity(
        &self,
        registry: &[&TableSchema],
    ) -> Result<IntegrityReport, QueryError> {
        let mut report = IntegrityReport::default();
        for schema in registry {
            if !self.table_exists(schema.name).await? {
                report.missing_tables.push(schema.name.to_string());
                continue;
            }
            let existing = self.table_columns(schema.name).await?;
            let missing: Vec<String> = schema
                .fields
                .iter()
                .filter(|f| !existing.iter().any(|c| c.name == f.name))
                .map(|f| f.name.to_string())
                .collect();
            if !missing.is_empty() {
                report.missing_columns.insert(schema.name.to_string(), missing);
            }
        }
        Ok(report)
    }

    /// Re-run the sync and report what is still wrong afterwards.
    pub async fn repair(
        &self,
        registry: &[&TableSchema],
    ) -> Result<(SyncReport, IntegrityReport), QueryError> {
        let sync = self.sync_all(registry).await?;
        let integrity = self.check_integrity(registry).await?;
        if !integrity.is_healthy() {
            warn!("Schema still unhealthy after repair: {:?}", integrity);
        }
        Ok((sync, integrity))
    }

    pub async fn statistics(&self, registry: &[&TableSchema]) -> Result<Statistics, QueryError> {
        let mut stats = Statistics::default();
        for schema in registry {
            let sql = format!("SELECT COUNT(*) FROM {}", schema.quoted_name());
            let count = match self.db.scalar_i64(&sql, &[]).await {
                Ok(n) => n.unwrap_or(0),
                Err(e) => {
                    warn!("Failed to count rows in {}: {}", schema.name, e);
                    0
                }
            };
            stats.total += count;
            stats.tables.insert(schema.name.to_string(), count);
        }
        Ok(stats)
    }

    pub async fn database_info(&self, registry: &[&TableSchema]) -> Result<DatabaseInfo, QueryError> {
        let path = self
            .db
            .select("SELECT file FROM pragma_database_list WHERE name = 'main'", &[])
            .await?
            .first()
            .and_then(|row| row.text("file"));

        let mut tables = BTreeMap::new();
        for schema in registry {
            tables.insert(schema.name.to_string(), self.table_columns(schema.name).await?);
        }
        Ok(DatabaseInfo { path, tables })
    }
}
