// src/store/pricing.rs
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use crate::database::DbPool;
use crate::error::BillingError;
use crate::models::PricingRule;
use crate::store::PricingResolver;

/// Per-minute rate applied when no pricing prefix matches a dialed number.
pub fn default_rate() -> Decimal {
    Decimal::ONE_HUNDRED
}

/// First rule (in `order_number` order) whose prefix starts the dialed
/// number wins.
pub fn match_rate(rules: &[PricingRule], dialed_number: &str) -> Option<Decimal> {
    rules
        .iter()
        .find(|rule| dialed_number.starts_with(&rule.prefix))
        .map(|rule| rule.amount)
}

pub struct PgPricingResolver {
    pool: DbPool,
}

impl PgPricingResolver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PricingResolver for PgPricingResolver {
    async fn rate_for(&self, dialed_number: &str) -> Result<Decimal, BillingError> {
        let client = self.pool.get().await
            .map_err(|e| BillingError::Pool(e.to_string()))?;

        let rows = client
            .query(
                "SELECT prefix, amount, order_number
                 FROM paid_pricing
                 ORDER BY order_number ASC",
                &[],
            )
            .await?;

        let rules: Vec<PricingRule> = rows
            .iter()
            .map(|r| PricingRule {
                prefix: r.get(0),
                amount: r.get(1),
                order_number: r.get(2),
            })
            .collect();

        let rate = match match_rate(&rules, dialed_number) {
            Some(rate) => rate,
            None => {
                debug!("No pricing prefix for {}, using default rate", dialed_number);
                default_rate()
            }
        };

        Ok(rate)
    }

    async fn is_free(&self, dialed_number: &str) -> Result<bool, BillingError> {
        let client = self.pool.get().await
            .map_err(|e| BillingError::Pool(e.to_string()))?;

        let row = client
            .query_opt(
                "SELECT 1 FROM free_contacts WHERE contact = $1",
                &[&dialed_number],
            )
            .await?;

        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rule(prefix: &str, amount: Decimal, order: i32) -> PricingRule {
        PricingRule {
            prefix: prefix.to_string(),
            amount,
            order_number: order,
        }
    }

    #[test]
    fn first_matching_prefix_wins() {
        let rules = vec![
            rule("00", dec!(250), 1),
            rule("002", dec!(400), 2),
            rule("07", dec!(60), 3),
        ];

        // "002..." matches "00" first because of its lower order number
        assert_eq!(match_rate(&rules, "0021234"), Some(dec!(250)));
        assert_eq!(match_rate(&rules, "0755512"), Some(dec!(60)));
    }

    #[test]
    fn no_match_yields_none() {
        let rules = vec![rule("00", dec!(250), 1)];
        assert_eq!(match_rate(&rules, "141"), None);
    }

    #[test]
    fn default_rate_is_one_hundred() {
        assert_eq!(default_rate(), dec!(100));
    }
}
