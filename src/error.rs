// src/error.rs
use thiserror::Error;
use actix_web::{http::StatusCode, ResponseError, HttpResponse};
use serde_json::json;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("No active PBX configuration")]
    ConfigurationMissing,

    #[error("PBX rejected credentials: {0}")]
    UpstreamAuth(String),

    #[error("PBX gateway command failed: {0}")]
    Gateway(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed event payload: {0}")]
    Decode(String),

    #[error("Extension not found: {0}")]
    ExtensionNotFound(String),

    #[error("Call not found: {0}")]
    CallNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for BillingError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        HttpResponse::build(status_code).json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            BillingError::ConfigurationMissing => StatusCode::CONFLICT,
            BillingError::UpstreamAuth(_) => StatusCode::BAD_GATEWAY,
            BillingError::Gateway(_) => StatusCode::BAD_GATEWAY,
            BillingError::ExtensionNotFound(_) => StatusCode::NOT_FOUND,
            BillingError::CallNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl BillingError {
    fn error_code(&self) -> &str {
        match self {
            BillingError::Database(_) => "database_error",
            BillingError::Pool(_) => "database_error",
            BillingError::ConfigurationMissing => "configuration_missing",
            BillingError::UpstreamAuth(_) => "upstream_auth_failed",
            BillingError::Gateway(_) => "gateway_command_failed",
            BillingError::Transport(_) => "transport_error",
            BillingError::Decode(_) => "malformed_event",
            BillingError::ExtensionNotFound(_) => "extension_not_found",
            BillingError::CallNotFound(_) => "call_not_found",
            BillingError::Internal(_) => "internal_error",
        }
    }
}
