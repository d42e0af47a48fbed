// src/pbx/types.rs
//
// Request/response shapes of the PBX control API. Only the fields the
// engine consumes are modeled.

use serde::{Deserialize, Serialize};

use crate::error::BillingError;
use crate::models::{ExtensionProfile, TokenGrant};

#[derive(Debug, Serialize)]
pub struct TokenRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
pub struct HangupRequest<'a> {
    pub channel_id: &'a str,
}

/// Generic control-API response envelope. `errcode == 0` means success.
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    pub errcode: i32,
    #[serde(default)]
    pub errmsg: Option<String>,
}

impl ApiResponse {
    pub fn error_message(&self) -> String {
        self.errmsg.clone().unwrap_or_else(|| format!("errcode {}", self.errcode))
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub errcode: i32,
    #[serde(default)]
    pub errmsg: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub access_token_expire_time: Option<i64>,
    #[serde(default)]
    pub refresh_token_expire_time: Option<i64>,
}

impl TokenResponse {
    /// Turn a successful token response into a grant; a non-zero errcode
    /// or missing fields are upstream rejections.
    pub fn into_grant(self) -> Result<TokenGrant, BillingError> {
        if self.errcode != 0 {
            return Err(BillingError::UpstreamAuth(
                self.errmsg.unwrap_or_else(|| format!("errcode {}", self.errcode)),
            ));
        }

        match (
            self.access_token,
            self.refresh_token,
            self.access_token_expire_time,
            self.refresh_token_expire_time,
        ) {
            (Some(access), Some(refresh), Some(access_ttl), Some(refresh_ttl)) => Ok(TokenGrant {
                access_token: access,
                refresh_token: refresh,
                access_ttl_secs: access_ttl,
                refresh_ttl_secs: refresh_ttl,
            }),
            _ => Err(BillingError::UpstreamAuth(
                "token response missing token fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExtensionListResponse {
    pub errcode: i32,
    #[serde(default)]
    pub errmsg: Option<String>,
    #[serde(default)]
    pub data: Vec<ExtensionProfile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_success() {
        let raw = r#"{
            "errcode": 0,
            "errmsg": "SUCCESS",
            "access_token": "acc",
            "refresh_token": "ref",
            "access_token_expire_time": 1800,
            "refresh_token_expire_time": 86400
        }"#;

        let grant = serde_json::from_str::<TokenResponse>(raw)
            .unwrap()
            .into_grant()
            .unwrap();

        assert_eq!(grant.access_token, "acc");
        assert_eq!(grant.access_ttl_secs, 1800);
        assert_eq!(grant.refresh_ttl_secs, 86400);
    }

    #[test]
    fn token_response_rejection() {
        let raw = r#"{"errcode": 10004, "errmsg": "Invalid client"}"#;

        let result = serde_json::from_str::<TokenResponse>(raw)
            .unwrap()
            .into_grant();

        assert!(matches!(result, Err(BillingError::UpstreamAuth(msg)) if msg == "Invalid client"));
    }

    #[test]
    fn token_response_missing_fields() {
        let raw = r#"{"errcode": 0}"#;

        let result = serde_json::from_str::<TokenResponse>(raw)
            .unwrap()
            .into_grant();

        assert!(matches!(result, Err(BillingError::UpstreamAuth(_))));
    }
}
