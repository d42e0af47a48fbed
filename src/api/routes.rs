// src/api/routes.rs
use actix_web::web;

use crate::api::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health_check))
            .route("/calls/balance-check", web::post().to(handlers::balance_check))
            .route("/extensions/balance-sweep", web::post().to(handlers::balance_sweep))
            .route("/extensions/sync", web::post().to(handlers::sync_extensions)),
    );
}
