// src/config.rs
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Port of the PBX control API / push channel (8088 on stock units).
    pub pbx_port: u16,
    /// Path prefix of the PBX OpenAPI, without leading or trailing slash.
    pub pbx_api_path: String,
    /// Delay between event-stream reconnect attempts, in seconds.
    pub reconnect_delay_secs: u64,
    /// Upper bound for any outbound request to the PBX. Keeps a hung
    /// control call from blocking the event-consumption path forever.
    pub pbx_request_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        Ok(Config {
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "production".to_string()),
            host: env::var("HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "9000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            pbx_port: env::var("PBX_PORT")
                .unwrap_or_else(|_| "8088".to_string())
                .parse()?,
            pbx_api_path: env::var("PBX_API_PATH")
                .unwrap_or_else(|_| "openapi/v1.0".to_string()),
            reconnect_delay_secs: env::var("PBX_RECONNECT_DELAY_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            pbx_request_timeout_ms: env::var("PBX_REQUEST_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
        })
    }
}
