// src/store/extensions.rs
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::database::DbPool;
use crate::error::BillingError;
use crate::models::{Extension, ExtensionBudget, ExtensionProfile};
use crate::store::ExtensionDirectory;

pub struct PgExtensionDirectory {
    pool: DbPool,
}

impl PgExtensionDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExtensionDirectory for PgExtensionDirectory {
    async fn find_by_number(&self, number: &str) -> Result<Option<Extension>, BillingError> {
        let client = self.pool.get().await
            .map_err(|e| BillingError::Pool(e.to_string()))?;

        let row = client
            .query_opt(
                "SELECT id, number, balance FROM extensions WHERE number = $1",
                &[&number],
            )
            .await?;

        Ok(row.map(|r| Extension {
            id: r.get(0),
            number: r.get(1),
            balance: r.get(2),
        }))
    }

    async fn update_balance(&self, number: &str, new_balance: Decimal) -> Result<(), BillingError> {
        let client = self.pool.get().await
            .map_err(|e| BillingError::Pool(e.to_string()))?;

        client
            .execute(
                "UPDATE extensions SET balance = $1, updated_at = NOW() WHERE number = $2",
                &[&new_balance, &number],
            )
            .await?;

        Ok(())
    }

    async fn list_budgets(&self) -> Result<Vec<ExtensionBudget>, BillingError> {
        let client = self.pool.get().await
            .map_err(|e| BillingError::Pool(e.to_string()))?;

        let rows = client
            .query(
                "SELECT e.id, e.number, b.amount, b.label
                 FROM extensions e
                 LEFT JOIN budgets b ON e.budget_id = b.id
                 ORDER BY e.id",
                &[],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|r| ExtensionBudget {
                extension_id: r.get(0),
                number: r.get(1),
                budget_amount: r.get(2),
                budget_label: r.get(3),
            })
            .collect())
    }

    async fn reset_balance(
        &self,
        extension_id: i64,
        amount: Decimal,
        budget_label: &str,
        year: i32,
        month: u32,
    ) -> Result<(), BillingError> {
        let client = self.pool.get().await
            .map_err(|e| BillingError::Pool(e.to_string()))?;

        client
            .execute(
                "UPDATE extensions SET balance = $1, updated_at = NOW() WHERE id = $2",
                &[&amount, &extension_id],
            )
            .await?;

        let month = month as i32;
        client
            .execute(
                "INSERT INTO extension_budget_history
                 (extension_id, year, month, budget_amount, budget_label)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (extension_id, year, month)
                 DO UPDATE SET budget_amount = $4, budget_label = $5",
                &[&extension_id, &year, &month, &amount, &budget_label],
            )
            .await?;

        Ok(())
    }

    async fn sync_profiles(&self, profiles: &[ExtensionProfile]) -> Result<usize, BillingError> {
        let client = self.pool.get().await
            .map_err(|e| BillingError::Pool(e.to_string()))?;

        let mut synced = 0;
        for profile in profiles {
            client
                .execute(
                    "INSERT INTO extensions (id, number, balance, caller_id_name, email_addr, mobile_number)
                     VALUES ($1, $2, 0, $3, $4, $5)
                     ON CONFLICT (number)
                     DO UPDATE SET id = $1, caller_id_name = $3, email_addr = $4, mobile_number = $5",
                    &[
                        &profile.id,
                        &profile.number,
                        &profile.caller_id_name,
                        &profile.email_addr,
                        &profile.mobile_number,
                    ],
                )
                .await?;
            synced += 1;
        }

        info!("Synced {} extension profiles from the PBX", synced);
        Ok(synced)
    }
}
