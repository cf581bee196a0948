//! Steam inventory items as the inventory scraper posts them.

use super::pricing::is_missing_price;
use super::primitives::lenient::{value_to_f64, value_to_string};
use serde::Serialize;
use serde_json::Value;

/// Asset property id carrying the paint wear value.
const WEAR_PROPERTY_ID: i64 = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryItem {
    pub assetid: Option<String>,
    pub instanceid: Option<String>,
    pub classid: Option<String>,
    pub data_user: Option<String>,
    pub weapon_type: Option<String>,
    pub weapon_name: Option<String>,
    pub item_name: Option<String>,
    pub float_range: Option<String>,
    /// Wear as sent, kept textual; the column is TEXT.
    pub weapon_float: Option<String>,
    pub remark: Option<String>,
    /// Client-supplied buy price, `None` when absent or blank.
    pub buy_price: Option<String>,
}

impl InventoryItem {
    pub fn from_payload(payload: &Value) -> Self {
        let field = |key: &str| payload.get(key).and_then(value_to_string);

        let parsed_name = payload.pointer("/tags/parsed_name");
        let name_part =
            |key: &str| parsed_name.and_then(|p| p.get(key)).and_then(value_to_string);

        let weapon_float = payload
            .get("asset_properties")
            .and_then(Value::as_array)
            .and_then(|props| {
                props.iter().find(|p| {
                    p.get("propertyid").and_then(Value::as_i64) == Some(WEAR_PROPERTY_ID)
                })
            })
            .and_then(|p| p.get("float_value"))
            .and_then(value_to_string);

        let buy_price = payload.get("buy_price");
        let buy_price = if is_missing_price(buy_price) {
            None
        } else {
            buy_price.and_then(value_to_string)
        };

        InventoryItem {
            assetid: field("assetid"),
            instanceid: field("instanceid"),
            classid: field("classid"),
            data_user: field("steamId"),
            weapon_type: name_part("weapon_type"),
            weapon_name: name_part("weapon_name"),
            item_name: name_part("item_name").or_else(|| field("name")),
            float_range: payload
                .pointer("/tags/Exterior/localized_tag_name")
                .and_then(value_to_string),
            weapon_float,
            remark: field("trade_lock_info"),
            buy_price,
        }
    }

    pub fn weapon_float_value(&self) -> Option<f64> {
        self.weapon_float
            .as_ref()
            .and_then(|s| value_to_f64(&Value::String(s.clone())))
    }
}

/// Marketplace price refresh for one held item, matched by assetid.
///
/// Unset fields leave the stored column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceRefresh {
    pub assetid: Option<String>,
    pub instanceid: Option<String>,
    pub order_time: Option<String>,
    pub yyyp_price: Option<String>,
    pub buff_price: Option<String>,
    pub steam_price: Option<String>,
}

impl PriceRefresh {
    /// A youpin inventory listing entry (`SteamAssetId`, `AssetAddTime`, `ShowMarkPrice`).
    pub fn from_yyyp(entry: &Value) -> Self {
        let field = |key: &str| entry.get(key).and_then(value_to_string);
        PriceRefresh {
            assetid: field("SteamAssetId"),
            order_time: field("AssetAddTime"),
            yyyp_price: field("ShowMarkPrice").map(|p| strip_currency(&p)),
            ..Default::default()
        }
    }

    pub fn from_buff(entry: &Value) -> Self {
        let field = |key: &str| entry.get(key).and_then(value_to_string);
        PriceRefresh {
            assetid: field("assetid"),
            instanceid: field("instanceid"),
            buff_price: field("buff_price"),
            steam_price: field("steam_price"),
            ..Default::default()
        }
    }

    /// Columns to write, in a stable order.
    pub fn updates(&self) -> Vec<(&'static str, &str)> {
        [
            ("instanceid", &self.instanceid),
            ("order_time", &self.order_time),
            ("yyyp_price", &self.yyyp_price),
            ("buff_price", &self.buff_price),
            ("steam_price", &self.steam_price),
        ]
        .into_iter()
        .filter_map(|(col, v)| v.as_deref().map(|v| (col, v)))
        .collect()
    }
}

fn strip_currency(price: &str) -> String {
    price.trim().trim_start_matches('￥').trim().to_string()
}
