// src/models/credential.rs
use chrono::{DateTime, Duration, Utc};

/// Access/refresh token pair for the PBX control API. Replaced wholesale
/// on every successful grant, never partially mutated.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// A successful token issue/refresh response, with server-reported TTLs
/// in seconds.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl Credential {
    pub fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            access_expires_at: now + Duration::seconds(grant.access_ttl_secs),
            refresh_expires_at: now + Duration::seconds(grant.refresh_ttl_secs),
        }
    }

    pub fn access_valid(&self, now: DateTime<Utc>) -> bool {
        now <= self.access_expires_at
    }

    pub fn refresh_valid(&self, now: DateTime<Utc>) -> bool {
        now <= self.refresh_expires_at
    }
}
