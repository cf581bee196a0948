//! Steam market trades, inventory snapshots and inventory history.

use super::Repository;
use crate::db::entities::{STEAM_BUY, STEAM_INVENTORY, STEAM_INVENTORY_HISTORY, STEAM_SELL};
use crate::db::facade::{execute_in, insert_record_in, select_in, Filter, InsertOutcome, QueryError, SaveOutcome};
use crate::db::record::Record;
use crate::db::value::{DbRow, SqlValue};
use crate::domain::money::round_money;
use crate::domain::pricing::auto_price;
use crate::domain::steam::HISTORY_TRADE_TYPES;
use crate::domain::{HistoryEntry, InventoryItem, MarketTrade, TradeSide};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteConnection;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Reported failures are capped at this many items.
const MAX_REPORTED_FAILURES: usize = 20;

/// Summary of a full inventory replacement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchInventoryReport {
    pub success_count: usize,
    pub fail_count: usize,
    pub total: usize,
    pub price_filled_count: usize,
    pub price_not_filled_count: usize,
    pub failed_items: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryInsert {
    Inserted,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestHistory {
    pub trade_id: Option<String>,
    /// The normalized timestamp, exposed as `trade_time`.
    pub trade_time: Option<String>,
    pub trade_type: Option<String>,
    pub trade_partner: Option<String>,
}

/// One history row with its item lists decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub id: Option<String>,
    pub trade_id: Option<String>,
    pub steam_id: Option<String>,
    pub trade_time: Option<String>,
    pub trade_time_timestamp: Option<String>,
    pub trade_type: Option<String>,
    pub trade_partner: Option<String>,
    pub items_gave_count: i64,
    pub items_received_count: i64,
    pub items_gave: Value,
    pub items_received: Value,
}

impl HistoryRecord {
    fn from_row(row: &DbRow) -> Self {
        let items = |col: &str| {
            row.text(col)
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_else(|| Value::Array(Vec::new()))
        };
        Self {
            id: row.text("ID"),
            trade_id: row.text("trade_id"),
            steam_id: row.text("steam_id"),
            trade_time: row.text("trade_time"),
            trade_time_timestamp: row.text("trade_time_timestamp"),
            trade_type: row.text("trade_type"),
            trade_partner: row.text("trade_partner"),
            items_gave_count: row.i64("items_gave_count").unwrap_or(0),
            items_received_count: row.i64("items_received_count").unwrap_or(0),
            items_gave: items("items_gave_json"),
            items_received: items("items_received_json"),
        }
    }
}

/// Row filter for history listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryQuery {
    All,
    ByType(String),
    /// Inclusive `DATE(trade_time_timestamp)` bounds.
    TimeRange(String, String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStatistics {
    pub total_count: i64,
    #[serde(flatten)]
    pub by_type: BTreeMap<String, i64>,
}

fn market_record(side: TradeSide, trade: &MarketTrade) -> Record {
    let schema = match side {
        TradeSide::Buy => &STEAM_BUY,
        TradeSide::Sell => &STEAM_SELL,
    };
    let mut record = Record::new(schema)
        .with("ID", trade.id.clone())
        .with("asset_id", trade.asset_id.clone())
        .with("price", trade.price)
        .with("trade_date", trade.trade_date.clone())
        .with("listing_date", trade.listing_date.clone())
        .with("game_name", trade.game_name.clone())
        .with("weapon_type", trade.weapon_type.clone())
        .with("weapon_name", trade.weapon_name.clone())
        .with("item_name", trade.item_name.clone())
        .with("float_range", trade.float_range.clone())
        .with("weapon_float", trade.weapon_float)
        .with("inspect_link", trade.inspect_link.clone())
        .with("data_user", trade.data_user.clone());
    record.set("price_original", trade.price_original);
    record
}

fn inventory_record(item: &InventoryItem, buy_price: Option<String>) -> Record {
    Record::new(&STEAM_INVENTORY)
        .with("assetid", item.assetid.clone())
        .with("instanceid", item.instanceid.clone())
        .with("classid", item.classid.clone())
        .with("data_user", item.data_user.clone())
        .with("weapon_type", item.weapon_type.clone())
        .with("weapon_name", item.weapon_name.clone())
        .with("item_name", item.item_name.clone())
        .with("float_range", item.float_range.clone())
        .with("weapon_float", item.weapon_float.clone())
        .with("remark", item.remark.clone())
        .with("buy_price", buy_price)
}

/// Price from the buy ledger: the exact float match when a float is known,
/// otherwise the average over every purchase of that item.
pub(super) async fn lookup_buy_price_in(
    conn: &mut SqliteConnection,
    item_name: &str,
    weapon_float: Option<&str>,
) -> Result<Option<Decimal>, QueryError> {
    let rows = match weapon_float.filter(|f| !f.trim().is_empty()) {
        Some(float) => {
            let float = float
                .trim()
                .parse::<f64>()
                .map(SqlValue::Real)
                .unwrap_or_else(|_| SqlValue::from(float));
            select_in(
                conn,
                "SELECT \"price\" FROM \"buy\" WHERE \"item_name\" = ? AND \"weapon_float\" = ? LIMIT 1",
                &[item_name.into(), float],
            )
            .await?
        }
        None => {
            select_in(
                conn,
                "SELECT AVG(CAST(\"price\" AS REAL)) AS \"price\" FROM \"buy\" WHERE \"item_name\" = ?",
                &[item_name.into()],
            )
            .await?
        }
    };
    Ok(rows
        .first()
        .and_then(|r| r.f64("price"))
        .map(|p| round_money(p, 2)))
}

/// Fill a missing buy price. The flag is `None` when the client supplied one.
async fn resolve_buy_price(
    conn: &mut SqliteConnection,
    item: &InventoryItem,
) -> Result<(Option<String>, Option<bool>), QueryError> {
    if item.buy_price.is_some() {
        return Ok((item.buy_price.clone(), None));
    }
    let Some(name) = item.item_name.as_deref() else {
        return Ok((None, Some(false)));
    };
    let price = match auto_price(name) {
        Some(p) => Some(p),
        None => lookup_buy_price_in(conn, name, item.weapon_float.as_deref()).await?,
    };
    let filled = price.is_some();
    Ok((price.map(|p| p.normalize().to_string()), Some(filled)))
}

impl Repository {
    // =========================================================================
    // Market
    // =========================================================================

    /// Save a market trade into steam_buy (`+`) or steam_sell (`-`).
    ///
    /// Returns `None` for any other trade type.
    pub async fn record_market_trade(
        &self,
        trade: &MarketTrade,
    ) -> Result<Option<(TradeSide, SaveOutcome)>, QueryError> {
        let Some(side) = trade.side() else {
            return Ok(None);
        };
        let mut record = market_record(side, trade);
        let outcome = self.db.save(&mut record).await?;
        Ok(Some((side, outcome)))
    }

    /// Purchases plus sales recorded for a Steam account.
    pub async fn count_market_trades(&self, user: &str) -> Result<i64, QueryError> {
        let filter = Filter::new().eq("data_user", user);
        let (buys, sells) = futures::future::try_join(
            self.db.count(&STEAM_BUY, &filter),
            self.db.count(&STEAM_SELL, &filter),
        )
        .await?;
        Ok(buys + sells)
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    pub async fn lookup_buy_price(
        &self,
        item_name: &str,
        weapon_float: Option<&str>,
    ) -> Result<Option<Decimal>, QueryError> {
        let mut conn = self.db.pool().acquire().await?;
        lookup_buy_price_in(&mut conn, item_name, weapon_float).await
    }

    /// Insert one inventory item, auto-filling its buy price when absent.
    pub async fn insert_inventory_item(&self, item: &InventoryItem) -> Result<(), QueryError> {
        let mut conn = self.db.pool().acquire().await?;
        let (buy_price, _) = resolve_buy_price(&mut conn, item).await?;
        let mut record = inventory_record(item, buy_price);
        insert_record_in(&mut conn, &mut record).await?;
        Ok(())
    }

    pub async fn list_inventory(
        &self,
        user: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DbRow>, QueryError> {
        self.db
            .select(
                "SELECT \"assetid\", \"instanceid\", \"classid\", \"weapon_name\", \"item_name\", \"weapon_type\", \"weapon_float\", \"float_range\", \"remark\" FROM \"steam_inventory\" WHERE \"data_user\" = ? LIMIT ? OFFSET ?",
                &[user.into(), limit.into(), offset.into()],
            )
            .await
    }

    pub async fn count_inventory(&self, user: &str) -> Result<i64, QueryError> {
        self.db
            .count(&STEAM_INVENTORY, &Filter::new().eq("data_user", user))
            .await
    }

    pub async fn delete_inventory(&self, user: &str) -> Result<u64, QueryError> {
        self.db
            .delete(
                "DELETE FROM \"steam_inventory\" WHERE \"data_user\" = ?",
                &[user.into()],
            )
            .await
    }

    /// Replace a user's whole inventory in one transaction.
    ///
    /// Items without their own `steamId` are attributed to `user`.
    pub async fn replace_inventory(
        &self,
        user: &str,
        items: &[Value],
    ) -> Result<BatchInventoryReport, QueryError> {
        let mut tx = self.db.begin().await?;
        let deleted = execute_in(
            &mut *tx,
            "DELETE FROM \"steam_inventory\" WHERE \"data_user\" = ?",
            &[user.into()],
        )
        .await?;
        if deleted > 0 {
            info!("Deleted {} old inventory rows for {}", deleted, user);
        }

        let mut report = BatchInventoryReport {
            success_count: 0,
            fail_count: 0,
            total: items.len(),
            price_filled_count: 0,
            price_not_filled_count: 0,
            failed_items: None,
        };
        let mut failed = Vec::new();

        for payload in items {
            let mut item = InventoryItem::from_payload(payload);
            if item.data_user.is_none() {
                item.data_user = Some(user.to_string());
            }
            let result = async {
                let (buy_price, filled) = resolve_buy_price(&mut *tx, &item).await?;
                let mut record = inventory_record(&item, buy_price);
                insert_record_in(&mut *tx, &mut record).await?;
                Ok::<_, QueryError>(filled)
            }
            .await;

            match result {
                Ok(filled) => {
                    report.success_count += 1;
                    match filled {
                        Some(true) => report.price_filled_count += 1,
                        Some(false) => report.price_not_filled_count += 1,
                        None => {}
                    }
                }
                Err(e) => {
                    warn!("Failed to insert inventory item {:?}: {}", item.assetid, e);
                    report.fail_count += 1;
                    if failed.len() < MAX_REPORTED_FAILURES {
                        failed.push(serde_json::json!({
                            "assetid": item.assetid,
                            "reason": e.to_string(),
                        }));
                    }
                }
            }
        }
        tx.commit().await?;

        info!(
            "Inventory for {}: {} inserted, {} failed, prices filled {} / missing {}",
            user,
            report.success_count,
            report.fail_count,
            report.price_filled_count,
            report.price_not_filled_count
        );
        if !failed.is_empty() {
            report.failed_items = Some(failed);
        }
        Ok(report)
    }

    /// Returns the number of rows changed.
    pub async fn update_buy_price(
        &self,
        user: &str,
        assetid: &str,
        price: SqlValue,
    ) -> Result<u64, QueryError> {
        self.db
            .update(
                "UPDATE \"steam_inventory\" SET \"buy_price\" = ? WHERE \"data_user\" = ? AND \"assetid\" = ?",
                &[price, user.into(), assetid.into()],
            )
            .await
    }

    // =========================================================================
    // Inventory history
    // =========================================================================

    pub async fn insert_history(&self, entry: &HistoryEntry) -> Result<HistoryInsert, QueryError> {
        let created_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let mut record = Record::new(&STEAM_INVENTORY_HISTORY)
            .with("ID", entry.id())
            .with("trade_id", entry.trade_id.as_str())
            .with("steam_id", entry.steam_id.as_str())
            .with("trade_time", entry.trade_time.as_str())
            .with("trade_time_timestamp", entry.trade_time_timestamp.clone())
            .with("trade_type", entry.trade_type.as_str())
            .with("trade_partner", entry.trade_partner.as_str())
            .with("items_gave_count", entry.items_gave_count)
            .with("items_received_count", entry.items_received_count)
            .with("items_gave_json", entry.items_gave_json.clone())
            .with("items_received_json", entry.items_received_json.clone())
            .with("data_user", entry.data_user.as_str())
            .with("created_at", created_at);
        match self.db.insert_record(&mut record).await? {
            InsertOutcome::Inserted => Ok(HistoryInsert::Inserted),
            InsertOutcome::Duplicate => Ok(HistoryInsert::AlreadyExists),
        }
    }

    pub async fn latest_history(&self, steam_id: &str) -> Result<Option<LatestHistory>, QueryError> {
        let row = self
            .db
            .select_one(
                "SELECT \"trade_id\", \"trade_time_timestamp\", \"trade_type\", \"trade_partner\" FROM \"steam_inventory_history\" WHERE \"steam_id\" = ? ORDER BY \"trade_time_timestamp\" DESC LIMIT 1",
                &[steam_id.into()],
            )
            .await?;
        Ok(row.map(|r| LatestHistory {
            trade_id: r.text("trade_id"),
            trade_time: r.text("trade_time_timestamp"),
            trade_type: r.text("trade_type"),
            trade_partner: r.text("trade_partner"),
        }))
    }

    /// Newest first.
    pub async fn list_history(
        &self,
        steam_id: &str,
        query: &HistoryQuery,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<HistoryRecord>, QueryError> {
        let mut filter = Filter::new().eq("steam_id", steam_id);
        filter = match query {
            HistoryQuery::All => filter,
            HistoryQuery::ByType(t) => filter.eq("trade_type", t.as_str()),
            HistoryQuery::TimeRange(start, end) => filter.condition(
                "DATE(\"trade_time_timestamp\") BETWEEN ? AND ?",
                vec![start.as_str().into(), end.as_str().into()],
            ),
        };
        let filter = filter
            .order_by("\"trade_time_timestamp\" DESC")
            .limit(limit)
            .offset(offset);
        let rows = self.db.find_rows(&STEAM_INVENTORY_HISTORY, &filter).await?;
        Ok(rows.iter().map(HistoryRecord::from_row).collect())
    }

    pub async fn count_history(&self, steam_id: &str) -> Result<i64, QueryError> {
        self.db
            .count(&STEAM_INVENTORY_HISTORY, &Filter::new().eq("steam_id", steam_id))
            .await
    }

    pub async fn history_statistics(&self, steam_id: &str) -> Result<HistoryStatistics, QueryError> {
        let rows = self
            .db
            .select(
                "SELECT \"trade_type\", COUNT(*) AS \"n\" FROM \"steam_inventory_history\" WHERE \"steam_id\" = ? GROUP BY \"trade_type\"",
                &[steam_id.into()],
            )
            .await?;
        let mut by_type: BTreeMap<String, i64> = HISTORY_TRADE_TYPES
            .iter()
            .map(|t| (t.to_string(), 0))
            .collect();
        let mut total_count = 0;
        for row in &rows {
            let n = row.i64("n").unwrap_or(0);
            total_count += n;
            if let Some(slot) = row.text("trade_type").and_then(|t| by_type.get_mut(&t)) {
                *slot = n;
            }
        }
        Ok(HistoryStatistics {
            total_count,
            by_type,
        })
    }
}
