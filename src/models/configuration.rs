// src/models/configuration.rs
use serde::{Deserialize, Serialize};

/// The single currently-active PBX endpoint/credentials record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PbxConfiguration {
    pub id: i64,
    pub ip: String,
    pub client_id: String,
    pub secret_id: String,
}
