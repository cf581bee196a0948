//! Perfect World storage-unit components (`steam_stockComponents`).

use super::Repository;
use crate::db::entities::STEAM_STOCK_COMPONENTS;
use crate::db::facade::{Filter, InsertOutcome, QueryError, SaveOutcome};
use crate::db::record::Record;
use crate::db::value::{DbRow, SqlValue};
use crate::domain::component::{component_type, quality};
use crate::domain::money::round_money_opt;
use crate::domain::primitives::lenient::value_to_string;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

const MAX_REPORTED_FAILURES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentAction {
    Insert,
    Update,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedComponent {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assetid: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentBatchReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub insert_count: usize,
    pub update_count: usize,
    pub failed_items: Vec<FailedComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeaponTypeCount {
    pub weapon_type: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStats {
    pub total_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_cost: Decimal,
    pub in_stock_count: i64,
    pub used_count: i64,
    pub sold_count: i64,
    pub weapon_type_stats: Vec<WeaponTypeCount>,
}

/// Why a component payload could not be written.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("缺少主键 assetid")]
    MissingAssetId,
    #[error("{0}")]
    Rejected(&'static str),
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Keep declared columns only, every value as text.
fn component_record(payload: &Value) -> Record {
    let mut record = Record::new(&STEAM_STOCK_COMPONENTS);
    if let Some(obj) = payload.as_object() {
        for (key, value) in obj {
            record.set(key, value_to_string(value));
        }
    }
    record
}

fn component_view(row: &DbRow) -> Value {
    let name = row.text("item_name");
    let cost = row
        .text("buy_price")
        .and_then(|p| p.trim().parse::<f64>().ok())
        .unwrap_or(0.0);
    json!({
        "component_id": row.text("assetid"),
        "assetid": row.text("assetid"),
        "instanceid": row.text("instanceid"),
        "classid": row.text("classid"),
        "component_name": name,
        "item_name": name,
        "weapon_name": row.text("weapon_name"),
        "component_type": component_type(name.as_deref()),
        "weapon_type": row.text("weapon_type"),
        "weapon_float": row.text("weapon_float"),
        "float_range": row.text("float_range"),
        "weapon_level": row.text("weapon_level"),
        "quality": quality(name.as_deref()),
        "quantity": 1,
        "unit_cost": cost,
        "total_cost": cost,
        "purchase_date": row.text("order_time"),
        "status": "库存中",
        "buy_price": row.text("buy_price"),
        "yyyp_price": row.text("yyyp_price"),
        "buff_price": row.text("buff_price"),
        "steam_price": row.text("steam_price"),
    })
}

impl Repository {
    // =========================================================================
    // Writes
    // =========================================================================

    /// Write one component, updating the row that already carries its assetid.
    pub async fn upsert_component(
        &self,
        payload: &Value,
    ) -> Result<(String, ComponentAction), ComponentError> {
        let incoming = component_record(payload);
        let Some(assetid) = incoming.get("assetid").and_then(SqlValue::to_text) else {
            return Err(ComponentError::MissingAssetId);
        };

        let filter = Filter::new().eq("assetid", assetid.as_str()).limit(1);
        let existing = self
            .db
            .find_all(&STEAM_STOCK_COMPONENTS, &filter)
            .await?
            .into_iter()
            .next();

        match existing {
            Some(mut record) => {
                for (name, value) in incoming.values() {
                    if !value.is_null() {
                        record.set(name, value.clone());
                    }
                }
                match self.db.save(&mut record).await? {
                    SaveOutcome::Inserted => Ok((assetid, ComponentAction::Insert)),
                    SaveOutcome::Updated | SaveOutcome::Unchanged => {
                        Ok((assetid, ComponentAction::Update))
                    }
                }
            }
            None => {
                let mut record = incoming;
                match self.db.insert_record(&mut record).await? {
                    InsertOutcome::Inserted => Ok((assetid, ComponentAction::Insert)),
                    InsertOutcome::Duplicate => Err(ComponentError::Rejected("插入记录失败")),
                }
            }
        }
    }

    pub async fn upsert_components(
        &self,
        items: &[Value],
    ) -> Result<ComponentBatchReport, QueryError> {
        let mut report = ComponentBatchReport {
            total: items.len(),
            ..Default::default()
        };
        for (index, item) in items.iter().enumerate() {
            match self.upsert_component(item).await {
                Ok((_, action)) => {
                    report.success += 1;
                    match action {
                        ComponentAction::Insert => report.insert_count += 1,
                        ComponentAction::Update => report.update_count += 1,
                    }
                }
                Err(ComponentError::Query(e @ QueryError::TimedOut(_))) => return Err(e),
                Err(e) => {
                    warn!("Component #{} rejected: {}", index, e);
                    report.failed += 1;
                    if report.failed_items.len() < MAX_REPORTED_FAILURES {
                        report.failed_items.push(FailedComponent {
                            index,
                            assetid: item.get("assetid").and_then(value_to_string),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }
        info!(
            "Components: {} inserted, {} updated, {} failed",
            report.insert_count, report.update_count, report.failed
        );
        Ok(report)
    }

    /// Delete by assetid, optionally scoped to one owner. Returns rows removed.
    pub async fn delete_component(&self, assetid: &str, user: Option<&str>) -> Result<u64, QueryError> {
        match user {
            Some(user) => {
                self.db
                    .delete(
                        "DELETE FROM \"steam_stockComponents\" WHERE \"assetid\" = ? AND \"data_user\" = ?",
                        &[assetid.into(), user.into()],
                    )
                    .await
            }
            None => {
                self.db
                    .delete(
                        "DELETE FROM \"steam_stockComponents\" WHERE \"assetid\" = ?",
                        &[assetid.into()],
                    )
                    .await
            }
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// One page of a user's components, newest first, with the total.
    pub async fn list_components(
        &self,
        user: &str,
        search: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Value>, i64), QueryError> {
        let mut filter = Filter::new().eq("data_user", user);
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            filter = filter.condition("\"item_name\" LIKE ?", vec![format!("%{}%", term).into()]);
        }
        let total = self.db.count(&STEAM_STOCK_COMPONENTS, &filter).await?;
        let page = page.max(1);
        let filter = filter
            .order_by("\"order_time\" DESC")
            .limit(page_size)
            .offset((page - 1) * page_size);
        let rows = self.db.find_rows(&STEAM_STOCK_COMPONENTS, &filter).await?;
        Ok((rows.iter().map(component_view).collect(), total))
    }

    pub async fn component_stats(&self, user: &str) -> Result<ComponentStats, QueryError> {
        let totals = self
            .db
            .select_one(
                "SELECT COUNT(*) AS total, SUM(CAST(\"buy_price\" AS REAL)) AS total_cost, AVG(CAST(\"buy_price\" AS REAL)) AS avg_cost FROM \"steam_stockComponents\" WHERE \"data_user\" = ?",
                &[user.into()],
            )
            .await?;
        let by_type = self
            .db
            .select(
                "SELECT \"weapon_type\", COUNT(*) AS count FROM \"steam_stockComponents\" WHERE \"data_user\" = ? GROUP BY \"weapon_type\" ORDER BY count DESC",
                &[user.into()],
            )
            .await?;

        let total_count = totals.as_ref().and_then(|r| r.i64("total")).unwrap_or(0);
        Ok(ComponentStats {
            total_count,
            total_cost: round_money_opt(totals.as_ref().and_then(|r| r.f64("total_cost")), 2),
            avg_cost: round_money_opt(totals.as_ref().and_then(|r| r.f64("avg_cost")), 2),
            in_stock_count: total_count,
            used_count: 0,
            sold_count: 0,
            weapon_type_stats: by_type
                .iter()
                .map(|r| WeaponTypeCount {
                    weapon_type: r.text("weapon_type"),
                    count: r.i64("count").unwrap_or(0),
                })
                .collect(),
        })
    }
}
