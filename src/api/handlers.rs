// src/api/handlers.rs
use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::error::BillingError;
use crate::models::{BalanceCheckRequest, HealthResponse, SweepResponse, SyncResponse};
use crate::services::{BalanceSweep, CallSessionEngine};

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "pbx-billing-engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Manual trigger of the out-of-band balance check for an in-progress
/// call. Hangs the call up if the extension can no longer afford it.
pub async fn balance_check(
    req: web::Json<BalanceCheckRequest>,
    engine: web::Data<Arc<CallSessionEngine>>,
) -> Result<HttpResponse, BillingError> {
    engine
        .check_balance_and_hangup_if_needed(
            &req.extension_number,
            &req.channel_id,
            req.called_number.as_deref(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "checked" })))
}

/// Manual trigger of the monthly balance reset.
pub async fn balance_sweep(
    sweep: web::Data<Arc<BalanceSweep>>,
) -> Result<HttpResponse, BillingError> {
    let updated = sweep.sweep_balances().await?;
    Ok(HttpResponse::Ok().json(SweepResponse { updated }))
}

/// Manual trigger of the PBX extension directory refresh.
pub async fn sync_extensions(
    sweep: web::Data<Arc<BalanceSweep>>,
) -> Result<HttpResponse, BillingError> {
    let synced = sweep.sync_directory().await?;
    Ok(HttpResponse::Ok().json(SyncResponse { synced }))
}
