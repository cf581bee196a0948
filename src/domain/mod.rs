//! Domain types for the skin trading ledger.
//!
//! This module provides:
//! - Platform / trade-side primitives, order statuses and lenient payload decoding
//! - Normalized marketplace orders, leases and Steam market/history entries
//! - Inventory payload parsing and buy-price auto-fill rules
//! - Storage-unit component classification
//! - Data-source views built from the `config` table
//! - Money rounding

pub mod component;
pub mod datasource;
pub mod inventory;
pub mod lease;
pub mod money;
pub mod order;
pub mod pricing;
pub mod primitives;
pub mod steam;

pub use datasource::{build_views, ConfigRow, DataSourceView};
pub use inventory::{InventoryItem, PriceRefresh};
pub use lease::{LeaseEntry, LeaseUpdate};
pub use order::{BuffOrderPayload, OrderEntry, StatusChange, YyypOrderPayload};
pub use primitives::{status, Platform, TradeSide};
pub use steam::{HistoryEntry, MarketTrade};
