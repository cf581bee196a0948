//! Buy-price auto-fill for inventory items.

use rust_decimal::Decimal;
use serde_json::Value;

/// Items with these words in the name are free drops.
const ZERO_COST_KEYWORDS: [&str; 6] = ["赛季奖牌", "奖牌", "勋章", "徽章", "布章", "硬币"];

const STORAGE_UNIT: &str = "库存存储组件";
const STORAGE_UNIT_PRICE: i64 = 14;

/// Fixed price for items whose cost follows from their name alone.
///
/// `None` means the price has to be looked up in the buy ledger.
pub fn auto_price(item_name: &str) -> Option<Decimal> {
    if ZERO_COST_KEYWORDS.iter().any(|k| item_name.contains(k)) {
        return Some(Decimal::ZERO);
    }
    if item_name.contains(STORAGE_UNIT) {
        return Some(Decimal::from(STORAGE_UNIT_PRICE));
    }
    None
}

/// Whether a client-supplied buy price counts as missing.
pub fn is_missing_price(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => {
            let t = s.trim();
            t.is_empty() || t == "None"
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_medals_are_free() {
        assert_eq!(auto_price("2024 赛季奖牌"), Some(Decimal::ZERO));
        assert_eq!(auto_price("服役勋章"), Some(Decimal::ZERO));
        assert_eq!(auto_price("纪念硬币"), Some(Decimal::ZERO));
    }

    #[test]
    fn test_storage_unit_fixed_price() {
        assert_eq!(auto_price("库存存储组件"), Some(Decimal::from(14)));
    }

    #[test]
    fn test_regular_items_need_lookup() {
        assert_eq!(auto_price("AK-47 | 红线"), None);
    }

    #[test]
    fn test_missing_price_detection() {
        assert!(is_missing_price(None));
        assert!(is_missing_price(Some(&json!(null))));
        assert!(is_missing_price(Some(&json!(""))));
        assert!(is_missing_price(Some(&json!("None"))));
        assert!(!is_missing_price(Some(&json!("0"))));
        assert!(!is_missing_price(Some(&json!(12.5))));
    }
}
