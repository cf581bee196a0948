//! Domain primitives: Platform, TradeSide, order statuses and lenient payload decoding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marketplace an order or data source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Yyyp,
    Buff,
    Steam,
    PerfectWorld,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Yyyp => "yyyp",
            Platform::Buff => "buff",
            Platform::Steam => "steam",
            Platform::PerfectWorld => "perfectworld",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade side: Buy or Sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Name of the unified ledger table for this side.
    pub fn unified_table(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }

    /// Column holding the other party of the trade.
    pub fn counterparty_column(&self) -> &'static str {
        match self {
            TradeSide::Buy => "seller_name",
            TradeSide::Sell => "buyer_name",
        }
    }
}

/// Order and lease status strings as the marketplaces report them.
pub mod status {
    pub const COMPLETED: &str = "已完成";
    pub const CANCELLED: &str = "已取消";
    pub const PENDING_RECEIPT: &str = "待收货";

    /// Orders in these states no longer change.
    pub const ORDER_TERMINAL: [&str; 2] = [COMPLETED, CANCELLED];

    pub const LEASE_DONE: &str = "完成";
    pub const LEASE_FREE_TRIAL: &str = "白玩中";
    pub const LEASE_RETURNING: &str = "归还中";
    pub const LEASE_RENTING: &str = "租赁中";
    pub const LEASE_CANCELLED: &str = "已取消";

    /// A lease in one of these states past its end date is overdue.
    pub const LEASE_OUTSTANDING: [&str; 3] = [LEASE_FREE_TRIAL, LEASE_RETURNING, LEASE_RENTING];
}

/// Serde helpers for scraper payloads, which send numbers as strings,
/// strings as numbers, and `"NULL"` / `""` for missing values.
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn is_blank(s: &str) -> bool {
        let t = s.trim();
        t.is_empty() || t.eq_ignore_ascii_case("null") || t == "None"
    }

    pub fn value_to_string(v: &Value) -> Option<String> {
        match v {
            Value::Null => None,
            Value::String(s) if is_blank(s) => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Finite numbers only; `"NaN"` and `"inf"` are rejected.
    pub fn value_to_f64(v: &Value) -> Option<f64> {
        let f = match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if !is_blank(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        f.filter(|f| f.is_finite())
    }

    pub fn value_to_i64(v: &Value) -> Option<i64> {
        match v {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) if !is_blank(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(value_to_string))
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(value_to_f64))
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(value_to_i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_platform_strings() {
        assert_eq!(Platform::Yyyp.as_str(), "yyyp");
        assert_eq!(Platform::PerfectWorld.to_string(), "perfectworld");
        let p: Platform = serde_json::from_value(json!("buff")).unwrap();
        assert_eq!(p, Platform::Buff);
    }

    #[test]
    fn test_side_tables() {
        assert_eq!(TradeSide::Buy.unified_table(), "buy");
        assert_eq!(TradeSide::Sell.counterparty_column(), "buyer_name");
    }

    #[test]
    fn test_lenient_values() {
        assert_eq!(lenient::value_to_f64(&json!("0.25")), Some(0.25));
        assert_eq!(lenient::value_to_f64(&json!("NULL")), None);
        assert_eq!(lenient::value_to_f64(&json!("NaN")), None);
        assert_eq!(lenient::value_to_f64(&json!("-inf")), None);
        assert_eq!(lenient::value_to_i64(&json!("1")), Some(1));
        assert_eq!(lenient::value_to_i64(&json!("abc")), None);
        assert_eq!(lenient::value_to_string(&json!(123)), Some("123".to_string()));
        assert_eq!(lenient::value_to_string(&json!("")), None);
    }
}
