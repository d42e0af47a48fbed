// src/services/call_session.rs
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::error::BillingError;
use crate::models::NewCallRecord;
use crate::pbx::PbxControl;
use crate::store::{pricing, CallLedger, ExtensionDirectory, PricingResolver};

/// Cap applied to fee-exempt calls. A very large ceiling instead of "no
/// timer" keeps every session on the same code path.
const FREE_CALL_CAP_MINUTES: i64 = 999_999;

/// Whole minutes billed for a call, always rounded up.
pub fn billed_minutes(duration_seconds: i64) -> i64 {
    if duration_seconds <= 0 {
        0
    } else {
        (duration_seconds + 59) / 60
    }
}

/// Cost of a non-exempt call of the given duration.
pub fn call_cost(duration_seconds: i64, rate_per_minute: Decimal) -> Decimal {
    Decimal::from(billed_minutes(duration_seconds)) * rate_per_minute
}

/// How many whole minutes the balance affords at the given rate. Never
/// negative; a non-positive rate affords nothing.
pub fn max_billable_minutes(balance: Decimal, rate_per_minute: Decimal) -> i64 {
    if rate_per_minute <= Decimal::ZERO {
        return 0;
    }
    (balance / rate_per_minute)
        .floor()
        .to_i64()
        .unwrap_or(0)
        .max(0)
}

/// One in-progress call on an extension, from answer to end.
struct Session {
    extension_number: String,
    channel_id: String,
    called_number: Option<String>,
    started_at: DateTime<Utc>,
    timer: JoinHandle<()>,
}

/// The billing state machine. Owns one scheduled timer per in-progress
/// call; the timer map lives inside the engine and is only touched under
/// its lock, together with record completion.
pub struct CallSessionEngine {
    extensions: Arc<dyn ExtensionDirectory>,
    ledger: Arc<dyn CallLedger>,
    pricing: Arc<dyn PricingResolver>,
    pbx: Arc<dyn PbxControl>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl CallSessionEngine {
    pub fn new(
        extensions: Arc<dyn ExtensionDirectory>,
        ledger: Arc<dyn CallLedger>,
        pricing: Arc<dyn PricingResolver>,
        pbx: Arc<dyn PbxControl>,
    ) -> Self {
        Self {
            extensions,
            ledger,
            pricing,
            pbx,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Open a session for an answered call: create its ledger record and
    /// schedule the balance-exhaustion timer. Duplicate answered events
    /// for a known call id are no-ops.
    pub async fn start_call(
        self: &Arc<Self>,
        extension_number: &str,
        call_id: &str,
        channel_id: &str,
        called_number: Option<&str>,
    ) -> Result<(), BillingError> {
        if self.ledger.find_by_call_id(call_id).await?.is_some() {
            info!("Call {} already started, keeping its original start time", call_id);
            return Ok(());
        }

        let Some(extension) = self.extensions.find_by_number(extension_number).await? else {
            warn!("Extension {} not found, ignoring answered call {}", extension_number, call_id);
            return Ok(());
        };

        let is_free = match called_number {
            Some(number) => self.pricing.is_free(number).await?,
            None => false,
        };

        let max_minutes = if is_free {
            info!("Free call to {:?}, no talk-time limit", called_number);
            FREE_CALL_CAP_MINUTES
        } else {
            let rate = self.resolve_rate(called_number).await?;
            let minutes = max_billable_minutes(extension.balance, rate);
            info!(
                "Call started on {} | balance: {} | rate/min: {} | limit: {} min",
                extension.number, extension.balance, rate, minutes
            );
            minutes
        };

        let start_time = Utc::now();
        self.ledger
            .create(NewCallRecord {
                call_id: call_id.to_string(),
                extension_number: extension.number.clone(),
                extension_id: extension.id,
                start_time,
            })
            .await?;

        let max_duration = Duration::from_secs((max_minutes * 60) as u64);

        // The timer handle is registered under the same lock its task
        // will need to deregister itself, so a zero-length allowance
        // cannot fire before the session exists.
        let mut sessions = self.sessions.lock().await;

        let engine = Arc::clone(self);
        let timer_call_id = call_id.to_string();
        let timer_extension = extension.number.clone();
        let timer_channel = channel_id.to_string();
        let timer_called = called_number.map(str::to_string);

        let timer = tokio::spawn(async move {
            sleep(max_duration).await;
            info!(
                "Talk-time allowance elapsed for {} on call {}, hanging up",
                timer_extension, timer_call_id
            );
            engine
                .hangup_exhausted(&timer_extension, &timer_channel, timer_called.as_deref())
                .await;
            engine.sessions.lock().await.remove(&timer_call_id);
        });

        sessions.insert(
            call_id.to_string(),
            Session {
                extension_number: extension.number,
                channel_id: channel_id.to_string(),
                called_number: called_number.map(str::to_string),
                started_at: start_time,
                timer,
            },
        );

        Ok(())
    }

    /// Settle a finished call: bill the elapsed time, update the balance
    /// and complete the ledger record. Exemption and rate are re-resolved
    /// here, not carried over from the start, so mid-call pricing changes
    /// take effect.
    pub async fn end_call(
        &self,
        extension_number: &str,
        call_id: &str,
        called_number: Option<&str>,
    ) -> Result<(), BillingError> {
        let Some(extension) = self.extensions.find_by_number(extension_number).await? else {
            warn!("Extension {} not found, ignoring end of call {}", extension_number, call_id);
            return Ok(());
        };

        let Some(record) = self.ledger.find_by_call_id(call_id).await? else {
            warn!("Call {} unknown, nothing to bill", call_id);
            return Ok(());
        };

        if record.end_time.is_some() {
            info!("Call {} already settled", call_id);
            return Ok(());
        }

        let end_time = Utc::now();
        let duration_seconds = (end_time - record.start_time).num_seconds();
        let minutes = billed_minutes(duration_seconds);

        let is_free = match called_number {
            Some(number) => self.pricing.is_free(number).await?,
            None => false,
        };

        let cost = if is_free {
            info!("Free call to {:?}, no deduction", called_number);
            Decimal::ZERO
        } else {
            let rate = self.resolve_rate(called_number).await?;
            let cost = call_cost(duration_seconds, rate);
            info!(
                "Call {} ended: {} min (real {}s) at {}/min, cost {}",
                call_id, minutes, duration_seconds, rate, cost
            );
            cost
        };

        if extension.balance == Decimal::ZERO {
            // Exhausted balance stays at zero; this also makes the
            // settlement after a forced hangup idempotent.
            self.extensions
                .update_balance(extension_number, Decimal::ZERO)
                .await?;
            info!("Balance of extension {} held at zero", extension_number);
        } else if !is_free {
            self.extensions
                .update_balance(extension_number, extension.balance - cost)
                .await?;
            info!("Deducted {} from extension {}", cost, extension_number);
        }

        // Timer cancellation and record completion form one critical
        // section against a concurrently firing timer.
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.remove(call_id) {
            session.timer.abort();
        }
        self.ledger
            .complete(call_id, end_time, duration_seconds, cost)
            .await?;
        drop(sessions);

        Ok(())
    }

    /// Out-of-band safety check: force a hangup if the extension can no
    /// longer afford the call it is on.
    pub async fn check_balance_and_hangup_if_needed(
        &self,
        extension_number: &str,
        channel_id: &str,
        called_number: Option<&str>,
    ) -> Result<(), BillingError> {
        let Some(extension) = self.extensions.find_by_number(extension_number).await? else {
            warn!("Extension {} not found, skipping balance check", extension_number);
            return Ok(());
        };

        if let Some(number) = called_number {
            if self.pricing.is_free(number).await? {
                info!("Free call to {}, no balance requirement", number);
                return Ok(());
            }
        }

        let rate = self.resolve_rate(called_number).await?;
        let max_minutes = max_billable_minutes(extension.balance, rate);

        if extension.balance <= Decimal::ZERO || max_minutes <= 0 {
            warn!(
                "Extension {} balance {} cannot cover {:?} at {}/min, hanging up",
                extension_number, extension.balance, called_number, rate
            );
            self.hangup_exhausted(extension_number, channel_id, called_number)
                .await;
        } else {
            info!(
                "Extension {} balance {} affords {} more minutes",
                extension_number, extension.balance, max_minutes
            );
        }

        Ok(())
    }

    /// Per-minute rate for the dialed number; absent numbers bill at the
    /// default rate, and a configured non-positive rate is replaced by
    /// the default so billing still accrues.
    async fn resolve_rate(&self, called_number: Option<&str>) -> Result<Decimal, BillingError> {
        let rate = match called_number {
            Some(number) => self.pricing.rate_for(number).await?,
            None => {
                info!("Called number not provided, using the default rate");
                pricing::default_rate()
            }
        };

        if rate <= Decimal::ZERO {
            error!("Configured rate {} is not billable, using the default rate", rate);
            return Ok(pricing::default_rate());
        }

        Ok(rate)
    }

    /// Forced termination of a call whose budget ran out. Shared by the
    /// per-call timer and the out-of-band balance check. Nothing here
    /// propagates: there is no caller, only the clock or the stream.
    async fn hangup_exhausted(
        &self,
        extension_number: &str,
        channel_id: &str,
        called_number: Option<&str>,
    ) {
        if let Err(e) = self.pbx.hangup_channel(channel_id).await {
            // No retry; the call may still end through other means.
            error!("Failed to hang up channel {}: {}", channel_id, e);
            return;
        }

        let is_free = match called_number {
            Some(number) => match self.pricing.is_free(number).await {
                Ok(free) => free,
                Err(e) => {
                    error!("Exemption lookup failed after hangup of {}: {}", channel_id, e);
                    return;
                }
            },
            None => false,
        };

        if is_free {
            info!("Free call to {:?} hung up, balance untouched", called_number);
            return;
        }

        // Terminal billing event for an exhausted balance; the matching
        // call report will settle against the zero and clamp there.
        match self
            .extensions
            .update_balance(extension_number, Decimal::ZERO)
            .await
        {
            Ok(()) => info!("Balance of extension {} set to zero", extension_number),
            Err(e) => error!("Failed to zero balance of {}: {}", extension_number, e),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // A session removed without an explicit abort must not leave its
        // timer running.
        self.timer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minutes_round_up() {
        assert_eq!(billed_minutes(0), 0);
        assert_eq!(billed_minutes(1), 1);
        assert_eq!(billed_minutes(59), 1);
        assert_eq!(billed_minutes(60), 1);
        assert_eq!(billed_minutes(61), 2);
        assert_eq!(billed_minutes(300), 5);
    }

    #[test]
    fn cost_uses_rounded_minutes() {
        assert_eq!(call_cost(95, dec!(100)), dec!(200));
        assert_eq!(call_cost(300, dec!(40)), dec!(200));
        assert_eq!(call_cost(0, dec!(100)), dec!(0));
    }

    #[test]
    fn affordable_minutes() {
        assert_eq!(max_billable_minutes(dec!(500), dec!(100)), 5);
        assert_eq!(max_billable_minutes(dec!(99), dec!(100)), 0);
        assert_eq!(max_billable_minutes(dec!(0), dec!(100)), 0);
        assert_eq!(max_billable_minutes(dec!(-50), dec!(100)), 0);
        assert_eq!(max_billable_minutes(dec!(500), dec!(0)), 0);
    }

    proptest! {
        #[test]
        fn billed_minutes_covers_duration(duration in 0i64..1_000_000) {
            let minutes = billed_minutes(duration);
            prop_assert!(minutes * 60 >= duration);
            prop_assert!((minutes - 1) * 60 < duration || minutes == 0);
        }

        #[test]
        fn cost_is_monotonic_in_duration(a in 0i64..500_000, b in 0i64..500_000) {
            let rate = dec!(100);
            let (short, long) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(call_cost(short, rate) <= call_cost(long, rate));
        }
    }
}
