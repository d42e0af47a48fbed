// src/models/pricing.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One paid-pricing row: calls to numbers starting with `prefix` are
/// billed `amount` per minute. Rows are tried in `order_number` order,
/// first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRule {
    pub prefix: String,
    pub amount: Decimal,
    pub order_number: i32,
}
