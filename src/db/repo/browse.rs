//! Read-only paging, search and statistics for the web dashboard.
//!
//! Each [`View`] names a unified table, the column list the dashboard shows
//! and the timestamp column used for ordering and date filters. Rows come back
//! as [`DbRow`]s in that column order so handlers can emit arrays.
//!
//! Steam market tables have no `from` or `status` columns; their views pin
//! those to constants so every board shares one row shape and one set of
//! statistics.

use super::Repository;
use crate::db::entities::{BUY, LEASE, SELL, STEAM_BUY, STEAM_SELL, YYYP_LENT};
use crate::db::facade::{Filter, QueryError};
use crate::db::schema::{quote_ident, TableSchema};
use crate::db::value::{DbRow, SqlValue};
use crate::domain::money::round_money_opt;
use crate::domain::status::{CANCELLED, COMPLETED, LEASE_RENTING, PENDING_RECEIPT};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct View {
    pub schema: &'static TableSchema,
    pub time_column: &'static str,
    pub columns: &'static [&'static str],
    /// Columns served as constants instead of being read from the table.
    pub fixed: &'static [(&'static str, &'static str)],
}

pub static BUY_VIEW: View = View {
    schema: &BUY,
    time_column: "order_time",
    columns: &[
        "ID",
        "item_name",
        "weapon_name",
        "weapon_type",
        "weapon_float",
        "float_range",
        "price",
        "from",
        "order_time",
        "status",
        "status_sub",
    ],
    fixed: &[],
};

pub static SELL_VIEW: View = View {
    schema: &SELL,
    time_column: "order_time",
    columns: &[
        "ID",
        "item_name",
        "weapon_name",
        "weapon_type",
        "weapon_float",
        "float_range",
        "price",
        "from",
        "order_time",
        "status",
    ],
    fixed: &[],
};

pub static LENT_VIEW: View = View {
    schema: &YYYP_LENT,
    time_column: "lean_start_time",
    columns: &[
        "ID",
        "weapon_name",
        "weapon_type",
        "item_name",
        "weapon_float",
        "float_range",
        "price",
        "lenter_name",
        "status",
        "last_status",
        "from",
        "lean_start_time",
        "lean_end_time",
        "total_Lease_Days",
        "max_Lease_Days",
    ],
    fixed: &[],
};

const STEAM_MARKET_COLUMNS: &[&str] = &[
    "ID",
    "item_name",
    "weapon_name",
    "weapon_type",
    "weapon_float",
    "float_range",
    "price",
    "from",
    "trade_date",
    "status",
    "game_name",
];

const STEAM_MARKET_FIXED: &[(&str, &str)] = &[("from", "Steam"), ("status", COMPLETED)];

pub static STEAM_BUY_VIEW: View = View {
    schema: &STEAM_BUY,
    time_column: "trade_date",
    columns: STEAM_MARKET_COLUMNS,
    fixed: STEAM_MARKET_FIXED,
};

pub static STEAM_SELL_VIEW: View = View {
    schema: &STEAM_SELL,
    time_column: "trade_date",
    columns: STEAM_MARKET_COLUMNS,
    fixed: STEAM_MARKET_FIXED,
};

/// The `lease` ledger behind the lease type/wear page.
pub static LEASE_VIEW: View = View {
    schema: &LEASE,
    time_column: "create_time",
    columns: &[
        "ID",
        "lease_day",
        "status",
        "unit_price",
        "deposit",
        "create_time",
        "item_name",
        "weapon_name",
        "weapon_type",
        "float_range",
        "weapon_float",
        "leaser_id",
        "leaser_name",
        "buy_of",
        "lease_from",
    ],
    fixed: &[],
};

/// Sorted ahead of every other game in game-name lists.
pub const PRIMARY_GAME: &str = "Counter-Strike 2";

/// Status value meaning "no status filter".
pub const ALL_STATUSES: &str = "all";

impl View {
    fn fixed_value(&self, column: &str) -> Option<&'static str> {
        self.fixed.iter().find(|(c, _)| *c == column).map(|(_, v)| *v)
    }

    /// SQL for a column: the quoted name, or a string literal when pinned.
    fn column_expr(&self, column: &str) -> String {
        match self.fixed_value(column) {
            Some(value) => format!("'{}'", value.replace('\'', "''")),
            None => quote_ident(column),
        }
    }

    fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| match self.fixed_value(c) {
                Some(_) => format!("{} AS {}", self.column_expr(c), quote_ident(c)),
                None => quote_ident(c),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn newest_first(&self) -> String {
        format!("{} DESC", quote_ident(self.time_column))
    }
}

/// Row subset for statistics and filtered listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsFilter {
    All,
    /// Substring of item_name or weapon_name.
    Search(String),
    /// Exact status; `all` disables the filter.
    Status(String),
    /// Inclusive date range on the view's time column.
    TimeRange(String, String),
    /// Exact game_name; only Steam market views carry it.
    GameName(String),
}

impl StatsFilter {
    fn to_filter(&self, view: &View) -> Filter {
        match self {
            StatsFilter::All => Filter::new(),
            StatsFilter::Search(term) => {
                let pattern = SqlValue::from(format!("%{}%", term));
                Filter::new().condition(
                    "(\"item_name\" LIKE ? OR \"weapon_name\" LIKE ?)",
                    vec![pattern.clone(), pattern],
                )
            }
            StatsFilter::Status(status) if status == ALL_STATUSES => Filter::new(),
            StatsFilter::Status(status) => Filter::new().condition(
                format!("{} = ?", view.column_expr("status")),
                vec![status.as_str().into()],
            ),
            StatsFilter::GameName(game) => Filter::new().eq("game_name", game.as_str()),
            StatsFilter::TimeRange(start, end) => Filter::new().condition(
                format!("DATE({}) BETWEEN ? AND ?", quote_ident(view.time_column)),
                vec![start.as_str().into(), end.as_str().into()],
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeStats {
    pub total_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_price: Decimal,
    pub completed_count: i64,
    pub cancelled_count: i64,
    pub pending_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaseStats {
    pub total_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_price: Decimal,
    pub total_lease_days: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_lease_days: Decimal,
    pub renting_count: i64,
    pub completed_count: i64,
    pub cancelled_count: i64,
}

/// Statistics for the type/wear page. Amounts include cancelled orders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeWearStats {
    pub total_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_price: Decimal,
    pub completed_count: i64,
    pub cancelled_count: i64,
    pub pending_count: i64,
}

/// Lease-ledger statistics for the type/wear page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseTypeWearStats {
    pub total_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_price: Decimal,
    pub total_lease_days: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_lease_days: Decimal,
    pub renting_count: i64,
}

/// Steam purchases against Steam sales.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub buy_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub buy_total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub buy_avg: Decimal,
    pub sell_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub sell_total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub sell_avg: Decimal,
    /// Sales total minus purchase total.
    #[serde(with = "rust_decimal::serde::float")]
    pub net_profit: Decimal,
    pub total_transactions: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeWearPage {
    /// Full table rows in declaration order.
    pub rows: Vec<DbRow>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

fn type_wear_filter(weapon_type: Option<&str>, float_range: Option<&str>) -> Filter {
    [("weapon_type", weapon_type), ("float_range", float_range)]
        .into_iter()
        .fold(Filter::new(), |f, (col, v)| match v.filter(|v| !v.is_empty()) {
            Some(v) => f.eq(col, v),
            None => f,
        })
}

fn count_of(row: Option<&DbRow>, column: &str) -> i64 {
    row.and_then(|r| r.i64(column)).unwrap_or(0)
}

fn money_of(row: Option<&DbRow>, column: &str, dp: u32) -> Decimal {
    round_money_opt(row.and_then(|r| r.f64(column)), dp)
}

impl Repository {
    async fn view_rows(&self, view: &View, filter: &Filter, paging: Option<(i64, i64)>) -> Result<Vec<DbRow>, QueryError> {
        let mut sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            view.select_list(),
            view.schema.quoted_name(),
            filter.where_sql(),
            view.newest_first()
        );
        if let Some((offset, limit)) = paging {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        }
        self.db.select(&sql, filter.params()).await
    }

    // =========================================================================
    // Listings
    // =========================================================================

    pub async fn count(&self, view: &View) -> Result<i64, QueryError> {
        self.db.count(view.schema, &Filter::new()).await
    }

    pub async fn page(&self, view: &View, offset: i64, limit: i64) -> Result<Vec<DbRow>, QueryError> {
        self.view_rows(view, &Filter::new(), Some((offset, limit))).await
    }

    pub async fn search_name(&self, view: &View, term: &str) -> Result<Vec<DbRow>, QueryError> {
        let filter = StatsFilter::Search(term.to_string()).to_filter(view);
        self.view_rows(view, &filter, None).await
    }

    pub async fn page_by_status(
        &self,
        view: &View,
        status: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DbRow>, QueryError> {
        let filter = StatsFilter::Status(status.to_string()).to_filter(view);
        self.view_rows(view, &filter, Some((offset, limit))).await
    }

    pub async fn page_by_time_range(
        &self,
        view: &View,
        start: &str,
        end: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DbRow>, QueryError> {
        let filter = StatsFilter::TimeRange(start.to_string(), end.to_string()).to_filter(view);
        self.view_rows(view, &filter, Some((offset, limit))).await
    }

    /// Every row in an inclusive date range, unpaged.
    pub async fn search_by_time_range(&self, view: &View, start: &str, end: &str) -> Result<Vec<DbRow>, QueryError> {
        let filter = StatsFilter::TimeRange(start.to_string(), end.to_string()).to_filter(view);
        self.view_rows(view, &filter, None).await
    }

    pub async fn page_by_game_name(
        &self,
        view: &View,
        game_name: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DbRow>, QueryError> {
        let filter = StatsFilter::GameName(game_name.to_string()).to_filter(view);
        self.view_rows(view, &filter, Some((offset, limit))).await
    }

    /// Distinct game names with [`PRIMARY_GAME`] first, then alphabetical.
    pub async fn game_names(&self, view: &View) -> Result<Vec<String>, QueryError> {
        let sql = format!(
            "SELECT DISTINCT \"game_name\" FROM {} WHERE \"game_name\" IS NOT NULL AND \"game_name\" != '' \
             ORDER BY CASE WHEN \"game_name\" = ? THEN 0 ELSE 1 END, \"game_name\"",
            view.schema.quoted_name()
        );
        let rows = self.db.select(&sql, &[PRIMARY_GAME.into()]).await?;
        Ok(rows
            .iter()
            .filter_map(|r| r.at(0).and_then(SqlValue::to_text))
            .collect())
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Buy/sell statistics. Cancelled orders are left out of the amounts.
    pub async fn trade_stats(&self, view: &View, filter: &StatsFilter) -> Result<TradeStats, QueryError> {
        let filter = filter.to_filter(view);
        let sql = format!(
            "SELECT COUNT(*) AS total_count, \
             SUM(CASE WHEN {status} != ? THEN \"price\" END) AS total_amount, \
             AVG(CASE WHEN {status} != ? THEN \"price\" END) AS avg_price, \
             COUNT(CASE WHEN {status} = ? THEN 1 END) AS completed_count, \
             COUNT(CASE WHEN {status} = ? THEN 1 END) AS cancelled_count, \
             COUNT(CASE WHEN {status} = ? THEN 1 END) AS pending_count \
             FROM {}{}",
            view.schema.quoted_name(),
            filter.where_sql(),
            status = view.column_expr("status"),
        );
        let mut params: Vec<SqlValue> = vec![
            CANCELLED.into(),
            CANCELLED.into(),
            COMPLETED.into(),
            CANCELLED.into(),
            PENDING_RECEIPT.into(),
        ];
        params.extend_from_slice(filter.params());

        let row = self.db.select_one(&sql, &params).await?;
        let row = row.as_ref();
        Ok(TradeStats {
            total_count: count_of(row, "total_count"),
            total_amount: money_of(row, "total_amount", 2),
            avg_price: money_of(row, "avg_price", 2),
            completed_count: count_of(row, "completed_count"),
            cancelled_count: count_of(row, "cancelled_count"),
            pending_count: count_of(row, "pending_count"),
        })
    }

    /// Lease statistics; the amount is daily price times days leased.
    pub async fn lease_stats(&self, filter: &StatsFilter) -> Result<LeaseStats, QueryError> {
        let view = &LENT_VIEW;
        let filter = filter.to_filter(view);
        let sql = format!(
            "SELECT COUNT(*) AS total_count, \
             SUM(\"price\" * \"total_Lease_Days\") AS total_amount, \
             AVG(\"price\") AS avg_price, \
             SUM(\"total_Lease_Days\") AS total_lease_days, \
             AVG(\"total_Lease_Days\") AS avg_lease_days, \
             COUNT(CASE WHEN \"status\" = ? THEN 1 END) AS renting_count, \
             COUNT(CASE WHEN \"status\" = ? THEN 1 END) AS completed_count, \
             COUNT(CASE WHEN \"status\" = ? THEN 1 END) AS cancelled_count \
             FROM {}{}",
            view.schema.quoted_name(),
            filter.where_sql()
        );
        let mut params: Vec<SqlValue> = vec![LEASE_RENTING.into(), COMPLETED.into(), CANCELLED.into()];
        params.extend_from_slice(filter.params());

        let row = self.db.select_one(&sql, &params).await?;
        let row = row.as_ref();
        Ok(LeaseStats {
            total_count: count_of(row, "total_count"),
            total_amount: money_of(row, "total_amount", 2),
            avg_price: money_of(row, "avg_price", 2),
            total_lease_days: count_of(row, "total_lease_days"),
            avg_lease_days: money_of(row, "avg_lease_days", 1),
            renting_count: count_of(row, "renting_count"),
            completed_count: count_of(row, "completed_count"),
            cancelled_count: count_of(row, "cancelled_count"),
        })
    }

    /// Row count and price total over the whole view, cancelled rows included.
    pub async fn total_stats(&self, view: &View) -> Result<(i64, Decimal), QueryError> {
        let sql = format!(
            "SELECT COUNT(*) AS total_count, COALESCE(SUM(\"price\"), 0) AS total_amount FROM {}",
            view.schema.quoted_name()
        );
        let row = self.db.select_one(&sql, &[]).await?;
        let row = row.as_ref();
        Ok((count_of(row, "total_count"), money_of(row, "total_amount", 2)))
    }

    pub async fn market_summary(&self) -> Result<MarketSummary, QueryError> {
        let side = |view: &'static View| async move {
            let sql = format!(
                "SELECT COUNT(*) AS n, COALESCE(SUM(\"price\"), 0) AS total, COALESCE(AVG(\"price\"), 0) AS avg FROM {}",
                view.schema.quoted_name()
            );
            let row = self.db.select_one(&sql, &[]).await?;
            let row = row.as_ref();
            let raw_total = row.and_then(|r| r.f64("total")).unwrap_or(0.0);
            Ok::<_, QueryError>((count_of(row, "n"), raw_total, money_of(row, "avg", 2)))
        };
        let ((buy_count, buy_total, buy_avg), (sell_count, sell_total, sell_avg)) =
            futures::future::try_join(side(&STEAM_BUY_VIEW), side(&STEAM_SELL_VIEW)).await?;
        Ok(MarketSummary {
            buy_count,
            buy_total: round_money_opt(Some(buy_total), 2),
            buy_avg,
            sell_count,
            sell_total: round_money_opt(Some(sell_total), 2),
            sell_avg,
            net_profit: round_money_opt(Some(sell_total - buy_total), 2),
            total_transactions: buy_count + sell_count,
        })
    }

    // =========================================================================
    // Type / wear page
    // =========================================================================

    /// Distinct non-empty values of a column, sorted.
    pub async fn distinct_values(&self, view: &View, column: &str) -> Result<Vec<String>, QueryError> {
        let col = quote_ident(column);
        let sql = format!(
            "SELECT DISTINCT {col} FROM {} WHERE {col} IS NOT NULL AND {col} != '' ORDER BY {col}",
            view.schema.quoted_name()
        );
        let rows = self.db.select(&sql, &[]).await?;
        Ok(rows
            .iter()
            .filter_map(|r| r.at(0).and_then(SqlValue::to_text))
            .collect())
    }

    /// A page of rows matching type and wear. No criteria yields an empty page.
    pub async fn search_type_and_wear(
        &self,
        view: &View,
        weapon_type: Option<&str>,
        float_range: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<TypeWearPage, QueryError> {
        let filter = type_wear_filter(weapon_type, float_range);
        if filter.params().is_empty() {
            return Ok(TypeWearPage {
                rows: Vec::new(),
                total: 0,
                page,
                page_size,
            });
        }

        let total = self.db.count(view.schema, &filter).await?;
        let paged = filter
            .order_by(view.newest_first())
            .limit(page_size)
            .offset((page.max(1) - 1) * page_size);
        let rows = self.db.find_rows(view.schema, &paged).await?;
        Ok(TypeWearPage {
            rows,
            total,
            page,
            page_size,
        })
    }

    pub async fn type_wear_stats(
        &self,
        view: &View,
        weapon_type: Option<&str>,
        float_range: Option<&str>,
    ) -> Result<TypeWearStats, QueryError> {
        let filter = type_wear_filter(weapon_type, float_range);
        let sql = format!(
            "SELECT COUNT(*) AS total_count, \
             COALESCE(SUM(\"price\"), 0) AS total_amount, \
             COALESCE(AVG(\"price\"), 0) AS avg_price, \
             COUNT(CASE WHEN \"status\" = ? THEN 1 END) AS completed_count, \
             COUNT(CASE WHEN \"status\" = ? THEN 1 END) AS cancelled_count, \
             COUNT(CASE WHEN \"status\" = ? THEN 1 END) AS pending_count \
             FROM {}{}",
            view.schema.quoted_name(),
            filter.where_sql()
        );
        let mut params: Vec<SqlValue> = vec![COMPLETED.into(), CANCELLED.into(), PENDING_RECEIPT.into()];
        params.extend_from_slice(filter.params());

        let row = self.db.select_one(&sql, &params).await?;
        let row = row.as_ref();
        Ok(TypeWearStats {
            total_count: count_of(row, "total_count"),
            total_amount: money_of(row, "total_amount", 2),
            avg_price: money_of(row, "avg_price", 2),
            completed_count: count_of(row, "completed_count"),
            cancelled_count: count_of(row, "cancelled_count"),
            pending_count: count_of(row, "pending_count"),
        })
    }

    /// Type/wear statistics over the `lease` ledger; the amount is unit price times days.
    pub async fn lease_type_wear_stats(
        &self,
        weapon_type: Option<&str>,
        float_range: Option<&str>,
    ) -> Result<LeaseTypeWearStats, QueryError> {
        let filter = type_wear_filter(weapon_type, float_range);
        let sql = format!(
            "SELECT COUNT(*) AS total_count, \
             COALESCE(SUM(\"unit_price\" * \"lease_day\"), 0) AS total_amount, \
             COALESCE(AVG(\"unit_price\"), 0) AS avg_price, \
             COALESCE(SUM(\"lease_day\"), 0) AS total_lease_days, \
             COALESCE(AVG(\"lease_day\"), 0) AS avg_lease_days, \
             COUNT(CASE WHEN \"status\" = ? THEN 1 END) AS renting_count \
             FROM {}{}",
            LEASE_VIEW.schema.quoted_name(),
            filter.where_sql()
        );
        let mut params: Vec<SqlValue> = vec![LEASE_RENTING.into()];
        params.extend_from_slice(filter.params());

        let row = self.db.select_one(&sql, &params).await?;
        let row = row.as_ref();
        Ok(LeaseTypeWearStats {
            total_count: count_of(row, "total_count"),
            total_amount: money_of(row, "total_amount", 2),
            avg_price: money_of(row, "avg_price", 2),
            total_lease_days: count_of(row, "total_lease_days"),
            avg_lease_days: money_of(row, "avg_lease_days", 2),
            renting_count: count_of(row, "renting_count"),
        })
    }
}
