//! Dashboard reads over held Steam inventory, plus marketplace price refreshes.
//!
//! Only rows with `if_inventory = '1'` count as held. Unknown items always
//! sort after everything else.

use super::steam::lookup_buy_price_in;
use super::Repository;
use crate::db::entities::STEAM_INVENTORY;
use crate::db::facade::{execute_in, select_in, Filter, QueryError};
use crate::db::schema::quote_ident;
use crate::db::value::{DbRow, SqlValue};
use crate::domain::money::round_money_opt;
use crate::domain::pricing::auto_price;
use crate::domain::PriceRefresh;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// `weapon_type` of items the scraper could not classify.
pub const UNKNOWN_ITEM_TYPE: &str = "未知物品";

/// Refresh failures reported back are capped at this many.
const MAX_REFRESH_ERRORS: usize = 10;

const HELD: &str = "\"if_inventory\" = '1'";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryOwner {
    pub steam_id: String,
    pub item_count: i64,
}

/// Optional narrowing of an inventory listing. Blank values are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySearch {
    /// Substring of item_name or weapon_name.
    pub search: Option<String>,
    pub weapon_type: Option<String>,
    pub float_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryEntry {
    pub assetid: Option<String>,
    pub instanceid: Option<String>,
    pub classid: Option<String>,
    pub item_name: Option<String>,
    pub weapon_name: Option<String>,
    pub float_range: Option<String>,
    pub weapon_type: Option<String>,
    pub weapon_float: Option<String>,
    pub remark: Option<String>,
    pub data_user: Option<String>,
    pub buy_price: Option<String>,
    pub yyyp_price: Option<String>,
    pub buff_price: Option<String>,
    pub steam_price: Option<String>,
    pub order_time: Option<String>,
}

impl InventoryEntry {
    fn from_row(row: &DbRow) -> Self {
        Self {
            assetid: row.text("assetid"),
            instanceid: row.text("instanceid"),
            classid: row.text("classid"),
            item_name: row.text("item_name"),
            weapon_name: row.text("weapon_name"),
            float_range: row.text("float_range"),
            weapon_type: row.text("weapon_type"),
            weapon_float: row.text("weapon_float"),
            remark: row.text("remark"),
            data_user: row.text("data_user"),
            buy_price: row.text("buy_price").filter(|p| !is_blank_price(p)),
            yyyp_price: row.text("yyyp_price"),
            buff_price: row.text("buff_price"),
            steam_price: row.text("steam_price"),
            order_time: row.text("order_time"),
        }
    }
}

/// Identical items held more than once, with per-copy details side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryGroup {
    pub item_name: Option<String>,
    pub weapon_name: Option<String>,
    pub weapon_type: Option<String>,
    pub float_range: Option<String>,
    pub count: usize,
    pub assetids: Vec<Option<String>>,
    pub weapon_floats: Vec<Option<String>>,
    pub remarks: Vec<Option<String>>,
    pub buy_prices: Vec<Option<String>>,
    pub yyyp_prices: Vec<Option<String>>,
    pub buff_prices: Vec<Option<String>>,
    pub steam_prices: Vec<Option<String>>,
    pub order_times: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeCount {
    pub weapon_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WearCount {
    pub float_range: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSummary {
    /// Rows whose price is above zero.
    pub priced_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_price: Decimal,
    #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub min_price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryStats {
    pub total_count: i64,
    pub by_type: Vec<TypeCount>,
    pub by_wear: Vec<WearCount>,
    pub price_stats: PriceSummary,
    pub yyyp_price_stats: PriceSummary,
    pub buff_price_stats: PriceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRefreshReport {
    pub total: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub error_messages: Vec<String>,
}

fn record_failure(report: &mut PriceRefreshReport, message: String) {
    report.failed_count += 1;
    if report.error_messages.len() < MAX_REFRESH_ERRORS {
        report.error_messages.push(message);
    }
}

fn is_blank_price(price: &str) -> bool {
    let t = price.trim();
    t.is_empty() || t == "None"
}

fn unknown_last() -> String {
    format!(
        "CASE WHEN \"weapon_type\" = '{}' THEN 1 ELSE 0 END",
        UNKNOWN_ITEM_TYPE
    )
}

fn held_by(steam_id: &str) -> Filter {
    Filter::new().eq("data_user", steam_id).condition(HELD, Vec::new())
}

fn search_filter(steam_id: &str, search: &InventorySearch) -> Filter {
    let non_blank = |v: &Option<String>| v.clone().filter(|v| !v.trim().is_empty());
    let mut filter = held_by(steam_id);
    if let Some(term) = non_blank(&search.search) {
        let pattern = SqlValue::from(format!("%{}%", term));
        filter = filter.condition(
            "(\"item_name\" LIKE ? OR \"weapon_name\" LIKE ?)",
            vec![pattern.clone(), pattern],
        );
    }
    if let Some(weapon_type) = non_blank(&search.weapon_type) {
        filter = filter.eq("weapon_type", weapon_type);
    }
    if let Some(float_range) = non_blank(&search.float_range) {
        filter = filter.eq("float_range", float_range);
    }
    filter
}

impl Repository {
    /// Accounts holding inventory, largest first.
    pub async fn inventory_owners(&self) -> Result<Vec<InventoryOwner>, QueryError> {
        let sql = format!(
            "SELECT \"data_user\", COUNT(*) AS \"item_count\" FROM \"steam_inventory\" \
             WHERE \"data_user\" IS NOT NULL AND \"data_user\" != '' AND {} \
             GROUP BY \"data_user\" ORDER BY \"item_count\" DESC",
            HELD
        );
        let rows = self.db.select(&sql, &[]).await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                Some(InventoryOwner {
                    steam_id: r.text("data_user")?,
                    item_count: r.i64("item_count").unwrap_or(0),
                })
            })
            .collect())
    }

    /// A page of held items plus the total matching count.
    ///
    /// Missing buy prices are resolved on the way out and written back.
    pub async fn inventory_page(
        &self,
        steam_id: &str,
        search: &InventorySearch,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<InventoryEntry>, i64), QueryError> {
        let filter = search_filter(steam_id, search);
        let total = self.db.count(&STEAM_INVENTORY, &filter).await?;

        let sql = format!(
            "SELECT * FROM \"steam_inventory\"{} ORDER BY {}, ROWID LIMIT {} OFFSET {}",
            filter.where_sql(),
            unknown_last(),
            limit,
            offset
        );
        let mut conn = self.db.pool().acquire().await?;
        let rows = select_in(&mut conn, &sql, filter.params()).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut entry = InventoryEntry::from_row(row);
            if entry.buy_price.is_none() {
                if let Some(name) = entry.item_name.clone() {
                    let price = match auto_price(&name) {
                        Some(p) => Some(p),
                        None => lookup_buy_price_in(&mut conn, &name, entry.weapon_float.as_deref()).await?,
                    };
                    if let Some(price) = price {
                        let price = price.normalize().to_string();
                        execute_in(
                            &mut conn,
                            "UPDATE \"steam_inventory\" SET \"buy_price\" = ? WHERE \"assetid\" = ?",
                            &[price.as_str().into(), entry.assetid.clone().into()],
                        )
                        .await?;
                        debug!("Filled buy price for {}: {}", name, price);
                        entry.buy_price = Some(price);
                    }
                }
            }
            entries.push(entry);
        }
        Ok((entries, total))
    }

    /// Held items grouped by name, type and wear.
    pub async fn grouped_inventory(&self, steam_id: &str) -> Result<Vec<InventoryGroup>, QueryError> {
        let filter = held_by(steam_id);
        let sql = format!(
            "SELECT * FROM \"steam_inventory\"{} ORDER BY {}, \"item_name\", ROWID",
            filter.where_sql(),
            unknown_last()
        );
        let rows = self.db.select(&sql, filter.params()).await?;

        let mut groups: Vec<InventoryGroup> = Vec::new();
        let mut index: HashMap<[Option<String>; 4], usize> = HashMap::new();
        for row in &rows {
            let key = [
                row.text("item_name"),
                row.text("weapon_name"),
                row.text("weapon_type"),
                row.text("float_range"),
            ];
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                let [item_name, weapon_name, weapon_type, float_range] = key;
                groups.push(InventoryGroup {
                    item_name,
                    weapon_name,
                    weapon_type,
                    float_range,
                    count: 0,
                    assetids: Vec::new(),
                    weapon_floats: Vec::new(),
                    remarks: Vec::new(),
                    buy_prices: Vec::new(),
                    yyyp_prices: Vec::new(),
                    buff_prices: Vec::new(),
                    steam_prices: Vec::new(),
                    order_times: Vec::new(),
                });
                groups.len() - 1
            });
            let group = &mut groups[slot];
            group.count += 1;
            group.assetids.push(row.text("assetid"));
            group.weapon_floats.push(row.text("weapon_float"));
            group.remarks.push(row.text("remark"));
            group.buy_prices.push(row.text("buy_price"));
            group.yyyp_prices.push(row.text("yyyp_price"));
            group.buff_prices.push(row.text("buff_price"));
            group.steam_prices.push(row.text("steam_price"));
            group.order_times.push(row.text("order_time"));
        }
        Ok(groups)
    }

    async fn held_counts_by(&self, steam_id: &str, column: &str) -> Result<Vec<(String, i64)>, QueryError> {
        let col = quote_ident(column);
        let filter = held_by(steam_id);
        let sql = format!(
            "SELECT {col} AS \"value\", COUNT(*) AS \"n\" FROM \"steam_inventory\"{} \
             AND {col} IS NOT NULL AND {col} != '' GROUP BY {col} ORDER BY \"n\" DESC",
            filter.where_sql()
        );
        let rows = self.db.select(&sql, filter.params()).await?;
        Ok(rows
            .iter()
            .filter_map(|r| Some((r.text("value")?, r.i64("n").unwrap_or(0))))
            .collect())
    }

    async fn held_price_summary(
        &self,
        steam_id: &str,
        column: &str,
        with_extremes: bool,
    ) -> Result<PriceSummary, QueryError> {
        let price = format!("CAST({} AS REAL)", quote_ident(column));
        let filter = held_by(steam_id);
        let sql = format!(
            "SELECT COUNT(CASE WHEN {price} > 0 THEN 1 END) AS \"priced\", \
             SUM({price}) AS \"total\", AVG({price}) AS \"avg\", \
             MIN({price}) AS \"min\", MAX({price}) AS \"max\" \
             FROM \"steam_inventory\"{}",
            filter.where_sql()
        );
        let row = self.db.select_one(&sql, filter.params()).await?;
        let row = row.as_ref();
        let money = |col: &str| round_money_opt(row.and_then(|r| r.f64(col)), 2);
        Ok(PriceSummary {
            priced_count: row.and_then(|r| r.i64("priced")).unwrap_or(0),
            total_price: money("total"),
            avg_price: money("avg"),
            min_price: with_extremes.then(|| money("min")),
            max_price: with_extremes.then(|| money("max")),
        })
    }

    pub async fn inventory_stats(&self, steam_id: &str) -> Result<InventoryStats, QueryError> {
        let total_count = self.db.count(&STEAM_INVENTORY, &held_by(steam_id)).await?;
        let by_type = self
            .held_counts_by(steam_id, "weapon_type")
            .await?
            .into_iter()
            .map(|(weapon_type, count)| TypeCount { weapon_type, count })
            .collect();
        let by_wear = self
            .held_counts_by(steam_id, "float_range")
            .await?
            .into_iter()
            .map(|(float_range, count)| WearCount { float_range, count })
            .collect();
        Ok(InventoryStats {
            total_count,
            by_type,
            by_wear,
            price_stats: self.held_price_summary(steam_id, "buy_price", true).await?,
            yyyp_price_stats: self.held_price_summary(steam_id, "yyyp_price", false).await?,
            buff_price_stats: self.held_price_summary(steam_id, "buff_price", false).await?,
        })
    }

    /// Apply marketplace prices to stored items in one transaction.
    pub async fn refresh_inventory_prices(
        &self,
        refreshes: &[PriceRefresh],
    ) -> Result<PriceRefreshReport, QueryError> {
        let mut report = PriceRefreshReport {
            total: refreshes.len(),
            success_count: 0,
            failed_count: 0,
            error_messages: Vec::new(),
        };
        let mut tx = self.db.begin().await?;
        for refresh in refreshes {
            let Some(assetid) = refresh.assetid.as_deref() else {
                record_failure(&mut report, "缺少 assetid".to_string());
                continue;
            };
            let exists = !select_in(
                &mut *tx,
                "SELECT 1 FROM \"steam_inventory\" WHERE \"assetid\" = ? LIMIT 1",
                &[assetid.into()],
            )
            .await?
            .is_empty();
            if !exists {
                record_failure(&mut report, format!("assetid {} 在数据库中不存在", assetid));
                continue;
            }

            let updates = refresh.updates();
            if !updates.is_empty() {
                let sets = updates
                    .iter()
                    .map(|(col, _)| format!("{} = ?", quote_ident(col)))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut params: Vec<SqlValue> = updates.iter().map(|(_, v)| (*v).into()).collect();
                params.push(assetid.into());
                execute_in(
                    &mut *tx,
                    &format!("UPDATE \"steam_inventory\" SET {} WHERE \"assetid\" = ?", sets),
                    &params,
                )
                .await?;
            }
            report.success_count += 1;
        }
        tx.commit().await?;

        info!(
            "Price refresh: {} updated, {} failed of {}",
            report.success_count, report.failed_count, report.total
        );
        Ok(report)
    }
}
