// src/models/mod.rs
pub mod call;
pub mod configuration;
pub mod credential;
pub mod extension;
pub mod pricing;

pub use call::{CallRecord, NewCallRecord};
pub use configuration::PbxConfiguration;
pub use credential::{Credential, TokenGrant};
pub use extension::{Extension, ExtensionBudget, ExtensionProfile};
pub use pricing::PricingRule;

use serde::{Deserialize, Serialize};

// ==================== API DTOs ====================

/// Manual trigger for the out-of-band balance check.
#[derive(Debug, Deserialize)]
pub struct BalanceCheckRequest {
    pub extension_number: String,
    pub channel_id: String,
    #[serde(default)]
    pub called_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub updated: usize,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub synced: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}
