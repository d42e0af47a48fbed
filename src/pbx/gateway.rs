// src/pbx/gateway.rs
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::BillingError;
use crate::models::{ExtensionProfile, PbxConfiguration};
use crate::pbx::types::{ApiResponse, ExtensionListResponse, HangupRequest};
use crate::pbx::{PbxEndpoint, TokenManager};
use crate::store::ConfigurationProvider;

/// The one PBX command the billing core needs: terminating a channel.
#[async_trait]
pub trait PbxControl: Send + Sync {
    async fn hangup_channel(&self, channel_id: &str) -> Result<(), BillingError>;
}

/// Read side of the PBX directory, consumed by the extension sync.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    async fn query_extensions(&self) -> Result<Vec<ExtensionProfile>, BillingError>;
}

/// Issues authenticated commands against the PBX control API. TLS peer
/// verification is disabled on purpose (self-signed PBX certificate).
pub struct PbxGateway {
    http: Client,
    tokens: Arc<TokenManager>,
    configs: Arc<dyn ConfigurationProvider>,
    endpoint: PbxEndpoint,
}

impl PbxGateway {
    pub fn new(
        tokens: Arc<TokenManager>,
        configs: Arc<dyn ConfigurationProvider>,
        endpoint: PbxEndpoint,
        timeout_ms: u64,
    ) -> Result<Self, BillingError> {
        let http = ClientBuilder::new()
            .timeout(Duration::from_millis(timeout_ms))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| BillingError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            tokens,
            configs,
            endpoint,
        })
    }

    async fn authenticated_base(&self) -> Result<(PbxConfiguration, String), BillingError> {
        let token = self.tokens.ensure_valid_token().await?;
        let config = self
            .configs
            .find_active()
            .await?
            .ok_or(BillingError::ConfigurationMissing)?;
        Ok((config, token))
    }
}

#[async_trait]
impl DirectorySource for PbxGateway {
    async fn query_extensions(&self) -> Result<Vec<ExtensionProfile>, BillingError> {
        let (config, token) = self.authenticated_base().await?;
        let url = format!(
            "{}/extension/list?access_token={}",
            self.endpoint.base_url(&config),
            token
        );

        let response: ExtensionListResponse = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BillingError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| BillingError::Decode(e.to_string()))?;

        if response.errcode != 0 {
            return Err(BillingError::Gateway(
                response.errmsg.unwrap_or_else(|| format!("errcode {}", response.errcode)),
            ));
        }

        info!("PBX reported {} extensions", response.data.len());
        Ok(response.data)
    }
}

#[async_trait]
impl PbxControl for PbxGateway {
    async fn hangup_channel(&self, channel_id: &str) -> Result<(), BillingError> {
        let (config, token) = self.authenticated_base().await?;
        let url = format!(
            "{}/call/hangup?access_token={}",
            self.endpoint.base_url(&config),
            token
        );

        let response: ApiResponse = self
            .http
            .post(&url)
            .json(&HangupRequest { channel_id })
            .send()
            .await
            .map_err(|e| BillingError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| BillingError::Decode(e.to_string()))?;

        if response.errcode != 0 {
            return Err(BillingError::Gateway(response.error_message()));
        }

        info!("Hung up channel {}", channel_id);
        Ok(())
    }
}
