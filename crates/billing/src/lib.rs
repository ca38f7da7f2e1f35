// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Plan Ledger Billing Core
//!
//! Transactional bookkeeping for team subscriptions.
//!
//! ## Features
//!
//! - **Orders**: PENDING -> COMPLETED / CANCELLED state machine per purchase or upgrade
//! - **Activations**: one row per confirmed payment; the latest one anchors the billing cycle
//! - **Proration**: prices a mid-cycle plan change against the days left in the cycle
//! - **Facade**: [`BillingService`] runs each procedure in a single ledger transaction
//! - **Invariants**: read-only consistency checks over the whole ledger

pub mod activations;
pub mod config;
pub mod error;
pub mod invariants;
pub mod models;
pub mod orders;
pub mod plans;
pub mod proration;
pub mod service;
pub mod store;
pub mod subscriptions;

#[cfg(test)]
mod edge_case_tests;
#[cfg(test)]
mod test_support;

// Config
pub use config::BillingConfig;

// Error
pub use error::{BillingError, BillingResult};

// Invariants
pub use invariants::{InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity};

// Models
pub use models::{
    Activation, BillingCycle, BillingOutcome, Caller, Order, OrderStatusRecord, Plan,
    Subscription, SubscriptionOverview,
};

// Orders
pub use orders::OrderStatus;

// Proration
pub use proration::{ProrationPolicy, ProrationQuote, DEFAULT_CYCLE_DAYS};

// Service
pub use service::{BillingService, ConfirmUpgradeRequest, NewPlan, OrderSubscriptionRequest};

// Store
pub use store::LedgerStore;
