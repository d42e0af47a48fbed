// src/models/extension.rs
use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;

/// An internal phone line on the PBX, holding a prepaid balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extension {
    pub id: i64,
    pub number: String,
    pub balance: Decimal,
}

/// Extension row joined with its linked monthly budget, as consumed by
/// the balance sweep. `budget_amount` is `None` for unlinked extensions.
#[derive(Debug, Clone)]
pub struct ExtensionBudget {
    pub extension_id: i64,
    pub number: String,
    pub budget_amount: Option<Decimal>,
    pub budget_label: Option<String>,
}

/// Directory profile as reported by the PBX `extension/list` query.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionProfile {
    pub id: i64,
    pub number: String,
    #[serde(default)]
    pub caller_id_name: Option<String>,
    #[serde(default)]
    pub email_addr: Option<String>,
    #[serde(default)]
    pub mobile_number: Option<String>,
}
