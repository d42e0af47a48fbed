// src/main.rs
use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::info;

use pbx_billing_engine::api;
use pbx_billing_engine::config::Config;
use pbx_billing_engine::database::create_pool;
use pbx_billing_engine::pbx::{PbxAuthClient, PbxEndpoint, PbxGateway, TokenManager};
use pbx_billing_engine::services::{BalanceSweep, CallSessionEngine};
use pbx_billing_engine::store::{
    PgCallLedger, PgConfigurationProvider, PgExtensionDirectory, PgPricingResolver,
};
use pbx_billing_engine::stream::EventStreamClient;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    info!("Starting PBX Billing Engine");

    let config = Config::from_env().expect("Failed to load configuration");

    info!("Environment: {}", config.environment);

    let db_pool = create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    info!("Database pool created");

    let endpoint = PbxEndpoint {
        port: config.pbx_port,
        api_path: config.pbx_api_path.clone(),
    };

    // Stores
    let configurations = Arc::new(PgConfigurationProvider::new(db_pool.clone()));
    let extensions = Arc::new(PgExtensionDirectory::new(db_pool.clone()));
    let calls = Arc::new(PgCallLedger::new(db_pool.clone()));
    let pricing = Arc::new(PgPricingResolver::new(db_pool.clone()));

    // PBX access
    let auth_client =
        Arc::new(PbxAuthClient::new(config.pbx_request_timeout_ms).expect("Failed to build PBX auth client"));
    let tokens = Arc::new(TokenManager::new(
        auth_client,
        configurations.clone(),
        endpoint.clone(),
    ));
    let gateway = Arc::new(
        PbxGateway::new(
            tokens.clone(),
            configurations.clone(),
            endpoint.clone(),
            config.pbx_request_timeout_ms,
        )
        .expect("Failed to build PBX gateway"),
    );

    // Billing core
    let engine = Arc::new(CallSessionEngine::new(
        extensions.clone(),
        calls.clone(),
        pricing.clone(),
        gateway.clone(),
    ));

    let sweep = Arc::new(BalanceSweep::new(extensions.clone(), gateway.clone()));

    // PBX event stream consumer
    let stream = Arc::new(EventStreamClient::new(
        tokens.clone(),
        configurations.clone(),
        engine.clone(),
        endpoint,
        Duration::from_secs(config.reconnect_delay_secs),
    ));

    tokio::spawn(stream.run());
    info!("PBX event stream consumer started");

    tokio::spawn(sweep.clone().run_monthly());
    info!("Monthly balance sweep scheduled");

    // HTTP Server
    let bind_address = format!("{}:{}", config.host, config.port);
    info!("Starting HTTP server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(web::Data::new(engine.clone()))
            .app_data(web::Data::new(sweep.clone()))
            .configure(api::routes::configure)
    })
    .bind(&bind_address)?
    .run()
    .await
}
