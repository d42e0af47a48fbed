// src/pbx/token.rs
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, ClientBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::BillingError;
use crate::models::{Credential, PbxConfiguration, TokenGrant};
use crate::pbx::types::{RefreshRequest, TokenRequest, TokenResponse};
use crate::pbx::PbxEndpoint;
use crate::store::ConfigurationProvider;

/// The PBX token issue/refresh endpoints, as a port so the refresh
/// policy can be tested without a PBX.
#[async_trait]
pub trait AuthEndpoint: Send + Sync {
    async fn request_token(
        &self,
        base_url: &str,
        client_id: &str,
        secret_id: &str,
    ) -> Result<TokenGrant, BillingError>;

    async fn refresh_token(
        &self,
        base_url: &str,
        refresh_token: &str,
    ) -> Result<TokenGrant, BillingError>;
}

/// reqwest-backed implementation. TLS peer verification is disabled on
/// purpose: the PBX ships a self-signed certificate.
pub struct PbxAuthClient {
    http: Client,
}

impl PbxAuthClient {
    pub fn new(timeout_ms: u64) -> Result<Self, BillingError> {
        let http = ClientBuilder::new()
            .timeout(Duration::from_millis(timeout_ms))
            .danger_accept_invalid_certs(true)
            .user_agent("OpenAPI")
            .build()
            .map_err(|e| BillingError::Transport(e.to_string()))?;

        Ok(Self { http })
    }

    async fn post_token(
        &self,
        url: &str,
        body: &impl serde::Serialize,
    ) -> Result<TokenGrant, BillingError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| BillingError::Transport(e.to_string()))?;

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| BillingError::Decode(e.to_string()))?;

        token_response.into_grant()
    }
}

#[async_trait]
impl AuthEndpoint for PbxAuthClient {
    async fn request_token(
        &self,
        base_url: &str,
        client_id: &str,
        secret_id: &str,
    ) -> Result<TokenGrant, BillingError> {
        let url = format!("{}/get_token", base_url);
        let body = TokenRequest {
            username: client_id,
            password: secret_id,
        };
        self.post_token(&url, &body).await
    }

    async fn refresh_token(
        &self,
        base_url: &str,
        refresh_token: &str,
    ) -> Result<TokenGrant, BillingError> {
        let url = format!("{}/refresh_token", base_url);
        let body = RefreshRequest { refresh_token };
        self.post_token(&url, &body).await
    }
}

/// Owns the single shared credential slot and the acquire/refresh policy.
/// Every caller goes through `ensure_valid_token`; the slot is never read
/// or written from anywhere else.
pub struct TokenManager {
    auth: Arc<dyn AuthEndpoint>,
    configs: Arc<dyn ConfigurationProvider>,
    endpoint: PbxEndpoint,
    credential: Mutex<Option<Credential>>,
}

impl TokenManager {
    pub fn new(
        auth: Arc<dyn AuthEndpoint>,
        configs: Arc<dyn ConfigurationProvider>,
        endpoint: PbxEndpoint,
    ) -> Self {
        Self {
            auth,
            configs,
            endpoint,
            credential: Mutex::new(None),
        }
    }

    /// Returns a currently-valid access token, acquiring or refreshing as
    /// needed. A failed refresh falls back to full re-authentication, so
    /// callers only see an error when that fallback also fails.
    pub async fn ensure_valid_token(&self) -> Result<String, BillingError> {
        let mut slot = self.credential.lock().await;
        let now = Utc::now();

        if let Some(credential) = slot.as_ref() {
            if credential.access_valid(now) {
                return Ok(credential.access_token.clone());
            }

            if credential.refresh_valid(now) {
                let config = self.active_config().await?;
                let base_url = self.endpoint.base_url(&config);

                match self.auth.refresh_token(&base_url, &credential.refresh_token).await {
                    Ok(grant) => {
                        let credential = Credential::from_grant(grant, Utc::now());
                        let token = credential.access_token.clone();
                        *slot = Some(credential);
                        info!("Refreshed PBX access token");
                        return Ok(token);
                    }
                    Err(e) => {
                        // Fall through to full re-authentication.
                        warn!("Token refresh failed, re-authenticating: {}", e);
                    }
                }
            }
        }

        let config = self.active_config().await?;
        let base_url = self.endpoint.base_url(&config);

        let grant = self
            .auth
            .request_token(&base_url, &config.client_id, &config.secret_id)
            .await?;

        let credential = Credential::from_grant(grant, Utc::now());
        let token = credential.access_token.clone();
        *slot = Some(credential);
        info!("Acquired new PBX token pair");

        Ok(token)
    }

    async fn active_config(&self) -> Result<PbxConfiguration, BillingError> {
        self.configs
            .find_active()
            .await?
            .ok_or(BillingError::ConfigurationMissing)
    }
}
