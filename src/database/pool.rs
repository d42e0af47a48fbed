// src/database/pool.rs
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::info;

pub type DbPool = Pool;

pub async fn create_pool(database_url: &str) -> Result<Pool, Box<dyn std::error::Error>> {
    let mut cfg = Config::new();
    cfg.url = Some(database_url.to_string());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

    // Probe once so a bad DATABASE_URL surfaces at startup, not at the
    // first billed call
    let client = pool.get().await?;
    client.simple_query("SELECT 1").await?;

    info!("Database reachable, pool ready");
    Ok(pool)
}
