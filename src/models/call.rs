// src/models/call.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Durable record of one call session. Created when the call is answered
/// (end/duration/cost unset), completed exactly once when it ends.
///
/// The extension is denormalized by both display number and stable id so
/// the record stays auditable if the extension is later renumbered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: String,
    pub extension_number: String,
    pub extension_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub cost: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct NewCallRecord {
    pub call_id: String,
    pub extension_number: String,
    pub extension_id: i64,
    pub start_time: DateTime<Utc>,
}
