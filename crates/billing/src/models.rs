//! Ledger rows and the result shapes returned by the billing facade

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{BillingError, BillingResult};
use crate::orders::OrderStatus;
use crate::proration::ProrationQuote;

/// Identity handed to the billing core by the authentication layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub is_admin: bool,
}

impl Caller {
    pub fn user(user_id: i64) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: i64) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }
}

/// Recurrence unit of a paid period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "MONTHLY",
            BillingCycle::Yearly => "YEARLY",
        }
    }

    pub fn parse(s: &str) -> BillingResult<Self> {
        match s {
            "MONTHLY" => Ok(BillingCycle::Monthly),
            "YEARLY" => Ok(BillingCycle::Yearly),
            other => Err(BillingError::InvalidInput(format!(
                "Unknown billing cycle '{other}'. Valid cycles are: MONTHLY, YEARLY"
            ))),
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    /// Minor currency units
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OrderStatusRecord {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub team_id: i64,
    pub plan_id: i64,
    /// Bumped on every plan change; used for optimistic concurrency
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: i64,
    pub subscription_id: i64,
    /// Plan this order purchases
    pub plan_id: i64,
    pub status: OrderStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activation {
    pub id: i64,
    pub subscription_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub activated_at: OffsetDateTime,
    pub billing_cycle: BillingCycle,
}

/// Read model for a single subscription
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionOverview {
    pub subscription: Subscription,
    pub plan: Plan,
    pub latest_activation: Option<Activation>,
    pub pending_order: Option<Order>,
}

/// Unified response shape for every mutating billing procedure
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BillingOutcome {
    Status {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        subscription_id: Option<i64>,
    },
    Price(ProrationQuote),
}

impl BillingOutcome {
    pub fn success() -> Self {
        BillingOutcome::Status {
            success: true,
            subscription_id: None,
        }
    }

    pub fn created(subscription_id: i64) -> Self {
        BillingOutcome::Status {
            success: true,
            subscription_id: Some(subscription_id),
        }
    }
}

impl From<ProrationQuote> for BillingOutcome {
    fn from(quote: ProrationQuote) -> Self {
        BillingOutcome::Price(quote)
    }
}

/// Timestamps are stored as unix seconds
pub(crate) fn to_unix(at: OffsetDateTime) -> i64 {
    at.unix_timestamp()
}

pub(crate) fn from_unix(secs: i64) -> BillingResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| BillingError::Internal(format!("Invalid stored timestamp {secs}: {e}")))
}
