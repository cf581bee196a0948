//! Money rounding backed by rust_decimal.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Round an aggregate to `dp` places, half away from zero.
///
/// Non-finite inputs round to zero.
pub fn round_money(value: f64, dp: u32) -> Decimal {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
        .unwrap_or(Decimal::ZERO)
}

pub fn round_money_opt(value: Option<f64>, dp: u32) -> Decimal {
    round_money(value.unwrap_or(0.0), dp)
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
