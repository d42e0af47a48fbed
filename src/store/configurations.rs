// src/store/configurations.rs
use async_trait::async_trait;

use crate::database::DbPool;
use crate::error::BillingError;
use crate::models::PbxConfiguration;
use crate::store::ConfigurationProvider;

pub struct PgConfigurationProvider {
    pool: DbPool,
}

impl PgConfigurationProvider {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigurationProvider for PgConfigurationProvider {
    async fn find_active(&self) -> Result<Option<PbxConfiguration>, BillingError> {
        let client = self.pool.get().await
            .map_err(|e| BillingError::Pool(e.to_string()))?;

        let row = client
            .query_opt(
                "SELECT id, ip, client_id, secret_id
                 FROM configurations
                 WHERE is_active = TRUE
                 LIMIT 1",
                &[],
            )
            .await?;

        Ok(row.map(|r| PbxConfiguration {
            id: r.get(0),
            ip: r.get(1),
            client_id: r.get(2),
            secret_id: r.get(3),
        }))
    }
}
