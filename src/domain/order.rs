//! Marketplace order payloads and their normalized form.

use super::primitives::{lenient, Platform, TradeSide};
use serde::{Deserialize, Serialize};

/// An order normalized across marketplaces, ready to be written to a ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderEntry {
    pub id: String,
    pub weapon_name: Option<String>,
    pub weapon_type: Option<String>,
    pub item_name: Option<String>,
    pub weapon_float: Option<f64>,
    pub float_range: Option<String>,
    pub price: Option<f64>,
    pub price_original: Option<f64>,
    pub price_all: Option<f64>,
    /// Seller on a buy, buyer on a sell.
    pub counterparty: Option<String>,
    pub status: Option<String>,
    pub status_sub: Option<String>,
    pub from: Option<String>,
    pub order_time: Option<String>,
    pub steam_id: Option<String>,
    pub buy_number: Option<i64>,
    pub err_number: Option<i64>,
    pub payment: Option<String>,
    pub trade_type: Option<String>,
    pub data_user: Option<String>,
}

impl OrderEntry {
    /// Same order, tagged with the platform it came from.
    pub fn with_from(mut self, platform: Platform) -> Self {
        self.from = Some(platform.as_str().to_string());
        self
    }
}

/// Order as the YouPin scraper posts it, for either side.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YyypOrderPayload {
    #[serde(rename = "ID", deserialize_with = "lenient::opt_string", default)]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub weapon_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub weapon_type: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub item_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64", default)]
    pub weapon_float: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub float_range: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64", default)]
    pub price: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64", default)]
    pub price_original: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64", default)]
    pub price_all: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub seller_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub buyer_user_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub status_sub: Option<String>,
    #[serde(rename = "from", deserialize_with = "lenient::opt_string", default)]
    pub from: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub order_time: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub steam_id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_i64", default)]
    pub buy_number: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_i64", default)]
    pub err_number: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub payment: Option<String>,
    #[serde(rename = "tradeType", deserialize_with = "lenient::opt_string", default)]
    pub trade_type: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub data_user: Option<String>,
}

impl YyypOrderPayload {
    /// Normalize; `None` when the order has no ID.
    pub fn into_entry(self, side: TradeSide) -> Option<OrderEntry> {
        let id = self.id?;
        let counterparty = match side {
            TradeSide::Buy => self.seller_name,
            TradeSide::Sell => self.buyer_user_name,
        };
        Some(OrderEntry {
            id,
            weapon_name: self.weapon_name,
            weapon_type: self.weapon_type,
            item_name: self.item_name,
            weapon_float: self.weapon_float,
            float_range: self.float_range,
            price: self.price,
            price_original: self.price_original,
            price_all: self.price_all,
            counterparty,
            status: self.status,
            status_sub: self.status_sub,
            from: self.from,
            order_time: self.order_time,
            steam_id: self.steam_id,
            buy_number: self.buy_number,
            err_number: self.err_number,
            payment: self.payment,
            trade_type: self.trade_type,
            data_user: self.data_user,
        })
    }
}

/// Order as the BUFF163 scraper posts it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuffOrderPayload {
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub item_id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub weapon_type: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub item_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub weaponitem_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub float_range: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64", default)]
    pub price: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64", default)]
    pub price_original: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub state: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub state_sub: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub pay_method_text: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub seller_id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64", default)]
    pub weapon_float: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub data_user: Option<String>,
}

impl BuffOrderPayload {
    pub fn into_entry(self) -> Option<OrderEntry> {
        let id = self.item_id?;
        Some(
            OrderEntry {
                id,
                weapon_name: self.weaponitem_name,
                weapon_type: self.weapon_type,
                item_name: self.item_name,
                weapon_float: self.weapon_float,
                float_range: self.float_range,
                price: self.price,
                price_original: self.price_original,
                counterparty: self.seller_id,
                status: self.state,
                status_sub: self.state_sub,
                order_time: self.created_at,
                payment: self.pay_method_text,
                data_user: self.data_user,
                ..Default::default()
            }
            .with_from(Platform::Buff),
        )
    }
}

/// Status change pushed for an existing order.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub id: String,
    pub status: String,
    pub status_sub: Option<String>,
}
