// src/services/balance_sweep.rs
use chrono::{Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::BillingError;
use crate::pbx::DirectorySource;
use crate::store::ExtensionDirectory;

/// Balance assigned when an extension has no budget of its own.
pub fn fallback_budget() -> Decimal {
    Decimal::from(1000)
}

/// First instant of the month after `now`, in UTC.
pub fn next_month_start(now: chrono::DateTime<Utc>) -> chrono::DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    // The first of a month at midnight always exists.
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
}

/// Monthly reset of extension balances from their configured budgets,
/// plus the directory refresh that keeps the extension table aligned
/// with the PBX.
pub struct BalanceSweep {
    extensions: Arc<dyn ExtensionDirectory>,
    gateway: Arc<dyn DirectorySource>,
}

impl BalanceSweep {
    pub fn new(extensions: Arc<dyn ExtensionDirectory>, gateway: Arc<dyn DirectorySource>) -> Self {
        Self {
            extensions,
            gateway,
        }
    }

    /// Reset every extension's balance to its budget, recording the
    /// applied amount in the monthly history. Returns how many
    /// extensions were updated.
    pub async fn sweep_balances(&self) -> Result<usize, BillingError> {
        let now = Utc::now();
        let budgets = self.extensions.list_budgets().await?;
        info!("Balance sweep over {} extensions", budgets.len());

        let mut updated = 0;
        for budget in budgets {
            let (amount, label) = match (&budget.budget_amount, &budget.budget_label) {
                (Some(amount), Some(label)) => (*amount, label.as_str()),
                _ => {
                    warn!(
                        "Extension {} has no budget, applying the fallback",
                        budget.number
                    );
                    (fallback_budget(), "fallback")
                }
            };

            match self
                .extensions
                .reset_balance(budget.extension_id, amount, label, now.year(), now.month())
                .await
            {
                Ok(()) => {
                    info!("Extension {} reset to {} ({})", budget.number, amount, label);
                    updated += 1;
                }
                Err(e) => {
                    // One bad row must not abort the whole sweep.
                    error!("Failed to reset extension {}: {}", budget.number, e);
                }
            }
        }

        info!("Balance sweep finished, {} extensions updated", updated);
        Ok(updated)
    }

    /// Pull the extension directory from the PBX and upsert it locally.
    pub async fn sync_directory(&self) -> Result<usize, BillingError> {
        let profiles = self.gateway.query_extensions().await?;
        let synced = self.extensions.sync_profiles(&profiles).await?;
        info!("Synchronized {} extension profiles from the PBX", synced);
        Ok(synced)
    }

    /// Runs forever, sweeping at the start of each month. Failures are
    /// logged and the schedule keeps ticking.
    pub async fn run_monthly(self: Arc<Self>) {
        loop {
            let now = Utc::now();
            let next = next_month_start(now);
            let wait = (next - now)
                .to_std()
                .unwrap_or_else(|_| std::time::Duration::from_secs(0));
            info!("Next balance sweep scheduled for {}", next);
            sleep(wait).await;

            if let Err(e) = self.sweep_balances().await {
                error!("Monthly balance sweep failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_month_in_the_same_year() {
        let now = Utc.with_ymd_and_hms(2024, 5, 17, 13, 45, 0).unwrap();
        let next = next_month_start(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn december_rolls_into_january() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let next = next_month_start(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn first_of_month_schedules_the_following_month() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let next = next_month_start(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap());
    }
}
