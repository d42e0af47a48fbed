// src/store/mod.rs
//
// Data-access ports consumed by the billing core, plus their Postgres
// implementations. The core only ever sees the traits; tests substitute
// mockall mocks for them.

pub mod calls;
pub mod configurations;
pub mod extensions;
pub mod pricing;

pub use calls::PgCallLedger;
pub use configurations::PgConfigurationProvider;
pub use extensions::PgExtensionDirectory;
pub use pricing::PgPricingResolver;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::BillingError;
use crate::models::{CallRecord, Extension, ExtensionBudget, ExtensionProfile, NewCallRecord, PbxConfiguration};

/// Lookup of the single currently-active PBX endpoint/credentials record.
#[async_trait]
pub trait ConfigurationProvider: Send + Sync {
    async fn find_active(&self) -> Result<Option<PbxConfiguration>, BillingError>;
}

/// Extension identity and prepaid balance.
#[async_trait]
pub trait ExtensionDirectory: Send + Sync {
    async fn find_by_number(&self, number: &str) -> Result<Option<Extension>, BillingError>;

    async fn update_balance(&self, number: &str, new_balance: Decimal) -> Result<(), BillingError>;

    /// All extensions with their linked monthly budgets, for the sweep.
    async fn list_budgets(&self) -> Result<Vec<ExtensionBudget>, BillingError>;

    /// Reset one extension's balance and upsert its per-month history row.
    async fn reset_balance(
        &self,
        extension_id: i64,
        amount: Decimal,
        budget_label: &str,
        year: i32,
        month: u32,
    ) -> Result<(), BillingError>;

    /// Upsert directory profiles reported by the PBX, keyed by number.
    async fn sync_profiles(&self, profiles: &[ExtensionProfile]) -> Result<usize, BillingError>;
}

/// Durable record of call sessions.
#[async_trait]
pub trait CallLedger: Send + Sync {
    async fn create(&self, record: NewCallRecord) -> Result<(), BillingError>;

    async fn find_by_call_id(&self, call_id: &str) -> Result<Option<CallRecord>, BillingError>;

    /// Complete a call exactly once. A completed call_id is never re-opened.
    async fn complete(
        &self,
        call_id: &str,
        end_time: DateTime<Utc>,
        duration_seconds: i64,
        cost: Decimal,
    ) -> Result<(), BillingError>;
}

/// Per-minute rates and fee exemptions for dialed numbers.
#[async_trait]
pub trait PricingResolver: Send + Sync {
    /// Per-minute rate for a dialed number. Falls back to the default
    /// rate when no pricing prefix matches.
    async fn rate_for(&self, dialed_number: &str) -> Result<Decimal, BillingError>;

    /// Exact-match lookup against the free-contacts table.
    async fn is_free(&self, dialed_number: &str) -> Result<bool, BillingError>;
}
