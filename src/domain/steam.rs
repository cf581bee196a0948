//! Steam Community Market trades and inventory-history entries.

use super::primitives::{lenient, TradeSide};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One market transaction; `trade_type` is `+` for a purchase, `-` for a sale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketTrade {
    #[serde(rename = "ID", deserialize_with = "lenient::opt_string", default)]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub trade_type: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub asset_id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64", default)]
    pub price: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64", default)]
    pub price_original: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub trade_date: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub listing_date: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub game_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub weapon_type: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub weapon_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub item_name: Option<String>,
    #[serde(rename = "exterior_wear", deserialize_with = "lenient::opt_string", default)]
    pub float_range: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64", default)]
    pub weapon_float: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub inspect_link: Option<String>,
    #[serde(rename = "steamId", deserialize_with = "lenient::opt_string", default)]
    pub data_user: Option<String>,
}

impl MarketTrade {
    pub fn side(&self) -> Option<TradeSide> {
        match self.trade_type.as_deref() {
            Some("+") => Some(TradeSide::Buy),
            Some("-") => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

/// Trade categories reported by the inventory-history scraper.
pub const HISTORY_TRADE_TYPES: [&str; 8] = [
    "market_buy",
    "market_sell",
    "trade",
    "unpack",
    "receive",
    "use",
    "remove",
    "other",
];

/// One inventory-history event, keyed `{steam_id}_{trade_id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub trade_id: String,
    pub steam_id: String,
    pub trade_time: String,
    pub trade_time_timestamp: Option<String>,
    pub trade_type: String,
    pub trade_partner: String,
    pub items_gave_count: i64,
    pub items_received_count: i64,
    pub items_gave_json: Option<String>,
    pub items_received_json: Option<String>,
    pub data_user: String,
}

impl HistoryEntry {
    /// `None` when `trade_id` or `steamId` is missing.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let text = |key: &str| payload.get(key).and_then(lenient::value_to_string);
        let count = |key: &str| {
            payload
                .get(key)
                .and_then(lenient::value_to_i64)
                .unwrap_or(0)
        };
        let items_json = |key: &str| match payload.get(key) {
            Some(Value::Array(items)) if !items.is_empty() => {
                Some(Value::Array(items.clone()).to_string())
            }
            _ => None,
        };

        Some(HistoryEntry {
            trade_id: text("trade_id")?,
            steam_id: text("steamId")?,
            trade_time: text("trade_time").unwrap_or_default(),
            trade_time_timestamp: text("trade_time_timestamp"),
            trade_type: text("trade_type").unwrap_or_else(|| "other".to_string()),
            trade_partner: text("trade_partner").unwrap_or_default(),
            items_gave_count: count("items_gave_count"),
            items_received_count: count("items_received_count"),
            items_gave_json: items_json("items_gave"),
            items_received_json: items_json("items_received"),
            data_user: text("data_user").unwrap_or_else(|| "default".to_string()),
        })
    }

    pub fn id(&self) -> String {
        format!("{}_{}", self.steam_id, self.trade_id)
    }
}
