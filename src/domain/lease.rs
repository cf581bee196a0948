//! YouPin lease (rental) payloads.

use super::primitives::lenient;
use serde::Deserialize;

/// A new lease as posted by the scraper.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaseEntry {
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
    #[serde(rename = "buyer_user_name", deserialize_with = "lenient::opt_string", default)]
    pub lenter_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub status: Option<String>,
    #[serde(rename = "orderSubStatusName", deserialize_with = "lenient::opt_string", default)]
    pub last_status: Option<String>,
    #[serde(rename = "from", deserialize_with = "lenient::opt_string", default)]
    pub from: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub lean_start_time: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub lean_end_time: Option<String>,
    #[serde(rename = "totalLeaseDays", deserialize_with = "lenient::opt_i64", default)]
    pub total_lease_days: Option<i64>,
    #[serde(rename = "leaseMaxDays", deserialize_with = "lenient::opt_i64", default)]
    pub max_lease_days: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub data_user: Option<String>,
}

impl LeaseEntry {
    /// Maximum lease length, falling back to the booked length.
    pub fn effective_max_days(&self) -> Option<i64> {
        self.max_lease_days.or(self.total_lease_days)
    }
}

/// Status refresh for an existing lease.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaseUpdate {
    #[serde(rename = "ID", deserialize_with = "lenient::opt_string", default)]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub status: Option<String>,
    #[serde(rename = "orderSubStatusName", deserialize_with = "lenient::opt_string", default)]
    pub last_status: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub lean_end_time: Option<String>,
    #[serde(rename = "totalLeaseDays", deserialize_with = "lenient::opt_i64", default)]
    pub total_lease_days: Option<i64>,
}
