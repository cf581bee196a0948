//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `ledger.rs` - Platform buy/sell ledgers and the unified mirrors
//! - `lease.rs` - YouPin leases
//! - `messages.rs` - YouPin message box
//! - `steam.rs` - Steam market trades, inventory and inventory history
//! - `inventory.rs` - Dashboard reads and price refreshes over held inventory
//! - `catalog.rs` - Weapon class-id catalogs
//! - `components.rs` - Storage-unit components
//! - `settings.rs` - Config rows and data sources
//! - `browse.rs` - Read-only paging and statistics over unified tables
//! - `admin.rs` - Schema integrity and database statistics

mod admin;
mod browse;
mod catalog;
mod components;
mod inventory;
mod lease;
mod ledger;
mod messages;
mod settings;
mod steam;

pub use browse::{
    LeaseStats, LeaseTypeWearStats, MarketSummary, StatsFilter, TradeStats, TypeWearPage, TypeWearStats, View,
    ALL_STATUSES, BUY_VIEW, LEASE_VIEW, LENT_VIEW, SELL_VIEW, STEAM_BUY_VIEW, STEAM_SELL_VIEW,
};
pub use catalog::{BuffIdEntry, CatalogReport, HashNameEntry, WeaponSearch};
pub use components::{ComponentAction, ComponentBatchReport, ComponentError, ComponentStats, FailedComponent};
pub use inventory::{
    InventoryEntry, InventoryGroup, InventoryOwner, InventorySearch, InventoryStats, PriceRefreshReport,
};
pub use lease::DEFAULT_LEASE_START;
pub use ledger::{order_record, unified_table, LatestOrder, Ledger, OrderWrite, SaveOutcomeTag, StatusUpdate};
pub use settings::{DataSourceHead, DataSourceInput, LAST_COLLECT_KEY};
pub use steam::{
    BatchInventoryReport, HistoryInsert, HistoryQuery, HistoryRecord, HistoryStatistics, LatestHistory,
};

use super::facade::QueryFacade;
use sqlx::sqlite::SqlitePool;

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    db: QueryFacade,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository {
            db: QueryFacade::new(pool),
        }
    }

    pub fn facade(&self) -> &QueryFacade {
        &self.db
    }
}
