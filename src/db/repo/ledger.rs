//! Platform buy/sell ledgers and their unified `buy` / `sell` mirrors.

use super::Repository;
use crate::db::entities::{BUFF_BUY, BUFF_SELL, BUY, SELL, YYYP_BUY, YYYP_SELL};
use crate::db::facade::{execute_in, save_in, Filter, QueryError, SaveOutcome};
use crate::db::record::Record;
use crate::db::schema::TableSchema;
use crate::db::value::SqlValue;
use crate::domain::status::{CANCELLED, COMPLETED};
use crate::domain::{OrderEntry, Platform, StatusChange, TradeSide};
use serde::Serialize;
use tracing::{debug, info};

/// A marketplace order table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ledger {
    YyypBuy,
    YyypSell,
    BuffBuy,
    BuffSell,
}

impl Ledger {
    pub fn platform(&self) -> Platform {
        match self {
            Ledger::YyypBuy | Ledger::YyypSell => Platform::Yyyp,
            Ledger::BuffBuy | Ledger::BuffSell => Platform::Buff,
        }
    }

    pub fn side(&self) -> TradeSide {
        match self {
            Ledger::YyypBuy | Ledger::BuffBuy => TradeSide::Buy,
            Ledger::YyypSell | Ledger::BuffSell => TradeSide::Sell,
        }
    }

    pub fn table(&self) -> &'static TableSchema {
        match self {
            Ledger::YyypBuy => &YYYP_BUY,
            Ledger::YyypSell => &YYYP_SELL,
            Ledger::BuffBuy => &BUFF_BUY,
            Ledger::BuffSell => &BUFF_SELL,
        }
    }

    /// Whether an order in this ledger is copied into the unified table.
    ///
    /// YouPin bulk purchases are only mirrored for the first unit.
    pub fn mirrors(&self, entry: &OrderEntry) -> bool {
        match self {
            Ledger::YyypBuy => entry.buy_number == Some(1),
            Ledger::YyypSell | Ledger::BuffBuy | Ledger::BuffSell => true,
        }
    }
}

pub fn unified_table(side: TradeSide) -> &'static TableSchema {
    match side {
        TradeSide::Buy => &BUY,
        TradeSide::Sell => &SELL,
    }
}

/// Map a normalized order onto a ledger table. Columns the table lacks are skipped.
pub fn order_record(schema: &'static TableSchema, side: TradeSide, entry: &OrderEntry) -> Record {
    let mut record = Record::new(schema);
    record.set("ID", entry.id.clone());
    record.set("weapon_name", entry.weapon_name.clone());
    record.set("weapon_type", entry.weapon_type.clone());
    record.set("item_name", entry.item_name.clone());
    record.set("weapon_float", entry.weapon_float);
    record.set("float_range", entry.float_range.clone());
    record.set("price", entry.price);
    record.set("price_original", entry.price_original);
    record.set("price_all", entry.price_all);
    record.set(side.counterparty_column(), entry.counterparty.clone());
    record.set("status", entry.status.clone());
    record.set("status_sub", entry.status_sub.clone());
    record.set("from", entry.from.clone());
    record.set("order_time", entry.order_time.clone());
    record.set("steam_id", entry.steam_id.clone());
    record.set("buy_number", entry.buy_number);
    record.set("err_number", entry.err_number);
    record.set("payment", entry.payment.clone());
    record.set("trade_type", entry.trade_type.clone());
    record.set("data_user", entry.data_user.clone());
    record
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderWrite {
    pub platform: SaveOutcomeTag,
    pub mirrored: Option<SaveOutcomeTag>,
}

/// Serializable form of [`SaveOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOutcomeTag {
    Inserted,
    Updated,
    Unchanged,
}

impl From<SaveOutcome> for SaveOutcomeTag {
    fn from(o: SaveOutcome) -> Self {
        match o {
            SaveOutcome::Inserted => SaveOutcomeTag::Inserted,
            SaveOutcome::Updated => SaveOutcomeTag::Updated,
            SaveOutcome::Unchanged => SaveOutcomeTag::Unchanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    /// The platform row existed.
    pub found: bool,
    /// Unified rows touched.
    pub mirrored: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestOrder {
    #[serde(rename = "ID")]
    pub id: Option<String>,
    pub order_time: Option<String>,
}

fn user_filter(user: &str) -> Filter {
    Filter::new().eq("data_user", user)
}

impl Repository {
    /// IDs of orders not yet completed or cancelled.
    pub async fn open_order_ids(&self, ledger: Ledger, user: &str) -> Result<Vec<String>, QueryError> {
        let sql = format!(
            "SELECT \"ID\" FROM {} WHERE \"status\" NOT IN (?, ?) AND \"data_user\" = ?",
            ledger.table().quoted_name()
        );
        let rows = self
            .db
            .select(&sql, &[COMPLETED.into(), CANCELLED.into(), user.into()])
            .await?;
        Ok(rows.iter().filter_map(|r| r.text("ID")).collect())
    }

    pub async fn latest_order_time(
        &self,
        ledger: Ledger,
        user: &str,
    ) -> Result<Option<String>, QueryError> {
        Ok(self.latest_order(ledger, user).await?.and_then(|o| o.order_time))
    }

    /// Most recent order by `order_time`.
    pub async fn latest_order(
        &self,
        ledger: Ledger,
        user: &str,
    ) -> Result<Option<LatestOrder>, QueryError> {
        let filter = user_filter(user).order_by("\"order_time\" DESC").limit(1);
        Ok(self
            .db
            .find_all(ledger.table(), &filter)
            .await?
            .into_iter()
            .next()
            .map(|r| LatestOrder {
                id: r.get("ID").and_then(SqlValue::to_text),
                order_time: r.get("order_time").and_then(SqlValue::to_text),
            }))
    }

    pub async fn count_orders(&self, ledger: Ledger, user: &str) -> Result<i64, QueryError> {
        self.db.count(ledger.table(), &user_filter(user)).await
    }

    /// Save an order into its platform ledger and, per the mirror policy, the
    /// unified table. Both writes commit together.
    pub async fn record_order(
        &self,
        ledger: Ledger,
        entry: &OrderEntry,
    ) -> Result<OrderWrite, QueryError> {
        let side = ledger.side();
        let entry = entry.clone().with_from(ledger.platform());

        let mut tx = self.db.begin().await?;
        let mut platform_record = order_record(ledger.table(), side, &entry);
        let platform = save_in(&mut *tx, &mut platform_record).await?;

        let mirrored = if ledger.mirrors(&entry) {
            let mut unified = order_record(unified_table(side), side, &entry);
            Some(save_in(&mut *tx, &mut unified).await?.into())
        } else {
            None
        };
        tx.commit().await?;

        debug!(
            "Recorded {} order {} ({:?}, mirrored {:?})",
            ledger.table().name,
            entry.id,
            platform,
            mirrored
        );
        Ok(OrderWrite {
            platform: platform.into(),
            mirrored,
        })
    }

    /// Save straight into the unified table, keeping the payload's `from`.
    pub async fn record_unified(
        &self,
        side: TradeSide,
        entry: &OrderEntry,
    ) -> Result<SaveOutcome, QueryError> {
        let mut record = order_record(unified_table(side), side, entry);
        self.db.save(&mut record).await
    }

    /// Apply a status change to the platform row and its unified mirrors.
    ///
    /// YouPin mirrors are matched by ID prefix (bulk orders share a prefix);
    /// BUFF mirrors by exact ID. A missing YouPin row leaves the mirrors untouched.
    pub async fn update_order_status(
        &self,
        ledger: Ledger,
        change: &StatusChange,
    ) -> Result<StatusUpdate, QueryError> {
        let mut tx = self.db.begin().await?;

        let mut sets = vec!["\"status\" = ?"];
        let mut params: Vec<SqlValue> = vec![change.status.as_str().into()];
        if let Some(sub) = &change.status_sub {
            sets.push("\"status_sub\" = ?");
            params.push(sub.as_str().into());
        }
        let set_sql = sets.join(", ");

        let platform_sql = format!(
            "UPDATE {} SET {} WHERE \"ID\" = ?",
            ledger.table().quoted_name(),
            set_sql
        );
        let mut platform_params = params.clone();
        platform_params.push(change.id.as_str().into());
        let found = execute_in(&mut *tx, &platform_sql, &platform_params).await? > 0;

        if !found && ledger.platform() == Platform::Yyyp {
            tx.rollback().await?;
            return Ok(StatusUpdate {
                found,
                mirrored: 0,
            });
        }

        let (id_clause, id_param) = match ledger.platform() {
            Platform::Yyyp => ("\"ID\" LIKE ?", format!("{}%", change.id)),
            _ => ("\"ID\" = ?", change.id.clone()),
        };
        let mirror_sql = format!(
            "UPDATE {} SET {} WHERE {} AND \"from\" = ?",
            unified_table(ledger.side()).quoted_name(),
            set_sql,
            id_clause
        );
        let mut mirror_params = params;
        mirror_params.push(id_param.into());
        mirror_params.push(ledger.platform().as_str().into());
        let mirrored = execute_in(&mut *tx, &mirror_sql, &mirror_params).await?;

        tx.commit().await?;
        info!(
            "Status of {} {} -> {} ({} mirrored)",
            ledger.table().name,
            change.id,
            change.status,
            mirrored
        );
        Ok(StatusUpdate { found, mirrored })
    }
}
