// src/pbx/mod.rs
//
// Everything that talks to the PBX control API: token lifecycle, the
// command gateway and the wire types both share.

pub mod gateway;
pub mod token;
pub mod types;

pub use gateway::{DirectorySource, PbxControl, PbxGateway};
pub use token::{AuthEndpoint, PbxAuthClient, TokenManager};

use crate::models::PbxConfiguration;

/// Where on the PBX host the control API and the push channel live.
/// The host itself comes from the active configuration record.
#[derive(Debug, Clone)]
pub struct PbxEndpoint {
    pub port: u16,
    pub api_path: String,
}

impl PbxEndpoint {
    pub fn base_url(&self, config: &PbxConfiguration) -> String {
        format!("https://{}:{}/{}", config.ip, self.port, self.api_path)
    }

    pub fn subscribe_url(&self, config: &PbxConfiguration, access_token: &str) -> String {
        format!(
            "wss://{}:{}/{}/subscribe?access_token={}",
            config.ip, self.port, self.api_path, access_token
        )
    }
}
