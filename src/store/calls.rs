// src/store/calls.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::database::DbPool;
use crate::error::BillingError;
use crate::models::{CallRecord, NewCallRecord};
use crate::store::CallLedger;

pub struct PgCallLedger {
    pool: DbPool,
}

impl PgCallLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallLedger for PgCallLedger {
    async fn create(&self, record: NewCallRecord) -> Result<(), BillingError> {
        let client = self.pool.get().await
            .map_err(|e| BillingError::Pool(e.to_string()))?;

        client
            .execute(
                "INSERT INTO calls (call_id, extension_number, extension_id, start_time)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (call_id) DO NOTHING",
                &[
                    &record.call_id,
                    &record.extension_number,
                    &record.extension_id,
                    &record.start_time,
                ],
            )
            .await?;

        Ok(())
    }

    async fn find_by_call_id(&self, call_id: &str) -> Result<Option<CallRecord>, BillingError> {
        let client = self.pool.get().await
            .map_err(|e| BillingError::Pool(e.to_string()))?;

        let row = client
            .query_opt(
                "SELECT call_id, extension_number, extension_id, start_time,
                        end_time, duration_seconds, cost
                 FROM calls
                 WHERE call_id = $1",
                &[&call_id],
            )
            .await?;

        Ok(row.map(|r| CallRecord {
            call_id: r.get(0),
            extension_number: r.get(1),
            extension_id: r.get(2),
            start_time: r.get(3),
            end_time: r.get(4),
            duration_seconds: r.get(5),
            cost: r.get(6),
        }))
    }

    async fn complete(
        &self,
        call_id: &str,
        end_time: DateTime<Utc>,
        duration_seconds: i64,
        cost: Decimal,
    ) -> Result<(), BillingError> {
        let client = self.pool.get().await
            .map_err(|e| BillingError::Pool(e.to_string()))?;

        // duration_seconds is written once; a completed call stays completed
        client
            .execute(
                "UPDATE calls
                 SET end_time = $2, duration_seconds = $3, cost = $4
                 WHERE call_id = $1 AND duration_seconds IS NULL",
                &[&call_id, &end_time, &duration_seconds, &cost],
            )
            .await?;

        Ok(())
    }
}
