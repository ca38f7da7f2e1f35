//! Proration calculator
//!
//! Prices a mid-cycle plan change: the price difference between the target
//! and current plan, scaled by the days left in the current cycle. The cycle
//! starts at the subscription's latest activation and is `cycle_days` long
//! for every billing cycle. A negative result is a credit.

use serde::Serialize;
use sqlx::SqliteConnection;
use time::OffsetDateTime;

use crate::activations::find_latest_activation;
use crate::error::BillingResult;
use crate::models::{Plan, Subscription};
use crate::plans::find_plan;

/// Default length of a proration cycle in days, for MONTHLY and YEARLY alike
pub const DEFAULT_CYCLE_DAYS: i64 = 30;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProrationPolicy {
    pub cycle_days: i64,
}

impl Default for ProrationPolicy {
    fn default() -> Self {
        Self {
            cycle_days: DEFAULT_CYCLE_DAYS,
        }
    }
}

impl ProrationPolicy {
    /// Whole days since `activated_at`, and the days left in the cycle
    /// clamped into `[0, cycle_days]`
    pub fn cycle_position(&self, activated_at: OffsetDateTime, now: OffsetDateTime) -> (i64, i64) {
        let elapsed_days = (now - activated_at)
            .whole_seconds()
            .div_euclid(SECONDS_PER_DAY);
        let remaining_days = (self.cycle_days - elapsed_days).clamp(0, self.cycle_days);
        (elapsed_days, remaining_days)
    }

    /// Unrounded price owed for `remaining_days` of a plan change worth
    /// `price_difference` per full cycle
    pub fn prorate(&self, price_difference: i64, remaining_days: i64) -> f64 {
        (price_difference as f64 / self.cycle_days as f64) * remaining_days as f64
    }
}

/// Priced plan change returned by an upgrade request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProrationQuote {
    pub subscription_id: i64,
    pub current_plan_id: Option<i64>,
    pub target_plan_id: i64,
    pub price_difference: i64,
    pub elapsed_days: Option<i64>,
    pub remaining_days: Option<i64>,
    #[serde(rename = "value")]
    pub prorated_price: f64,
    /// `prorated_price` truncated toward zero, in minor currency units
    pub amount_due: i64,
    /// Subscription version the quote was priced against
    pub subscription_version: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub activated_at: Option<OffsetDateTime>,
}

impl ProrationQuote {
    /// Zero-valued quote for a subscription without a current plan or activation
    pub fn degraded(subscription_id: i64, target_plan_id: i64, subscription_version: i64) -> Self {
        Self {
            subscription_id,
            current_plan_id: None,
            target_plan_id,
            price_difference: 0,
            elapsed_days: None,
            remaining_days: None,
            prorated_price: 0.0,
            amount_due: 0,
            subscription_version,
            activated_at: None,
        }
    }

    pub fn is_credit(&self) -> bool {
        self.prorated_price < 0.0
    }
}

/// Price moving `subscription` from its current plan to `target`.
///
/// Reads the pre-change plan and the latest activation of this subscription.
/// Falls back to [`ProrationQuote::degraded`] when either is missing.
pub async fn quote_upgrade(
    conn: &mut SqliteConnection,
    subscription: &Subscription,
    target: &Plan,
    now: OffsetDateTime,
    policy: &ProrationPolicy,
) -> BillingResult<ProrationQuote> {
    let current = find_plan(conn, subscription.plan_id).await?;
    let activation = find_latest_activation(conn, subscription.id).await?;

    let (current, activation) = match (current, activation) {
        (Some(plan), Some(activation)) => (plan, activation),
        (current, activation) => {
            tracing::warn!(
                subscription_id = subscription.id,
                target_plan_id = target.id,
                has_current_plan = current.is_some(),
                has_activation = activation.is_some(),
                "No active billing period to prorate against, quoting zero"
            );
            return Ok(ProrationQuote::degraded(
                subscription.id,
                target.id,
                subscription.version,
            ));
        }
    };

    let price_difference = target.price - current.price;
    let (elapsed_days, remaining_days) = policy.cycle_position(activation.activated_at, now);
    let prorated_price = policy.prorate(price_difference, remaining_days);

    tracing::debug!(
        subscription_id = subscription.id,
        current_plan_id = current.id,
        target_plan_id = target.id,
        price_difference,
        elapsed_days,
        remaining_days,
        prorated_price,
        "Upgrade priced"
    );

    Ok(ProrationQuote {
        subscription_id: subscription.id,
        current_plan_id: Some(current.id),
        target_plan_id: target.id,
        price_difference,
        elapsed_days: Some(elapsed_days),
        remaining_days: Some(remaining_days),
        prorated_price,
        amount_due: prorated_price.trunc() as i64,
        subscription_version: subscription.version,
        activated_at: Some(activation.activated_at),
    })
}
