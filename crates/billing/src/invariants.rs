//! Ledger Invariants Module
//!
//! Runnable consistency checks for the billing ledger. They can be run after
//! any mutation, or on demand from the admin API, to confirm that orders,
//! activations and subscription plans still agree with each other.
//!
//! ## Design Principles
//!
//! 1. **Executable**: Each invariant is a real SQL query that can be run
//! 2. **Explanatory**: Violations include enough context to debug
//! 3. **Non-destructive**: Checks only read, never write

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::error::{BillingError, BillingResult};

/// Result of running a single invariant check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    /// Subscription(s) affected; empty for ledger-wide violations
    pub subscription_ids: Vec<i64>,
    /// Human-readable description of the violation
    pub description: String,
    /// Additional context for debugging
    pub context: serde_json::Value,
    pub severity: ViolationSeverity,
}

/// Severity of an invariant violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Critical - customers may be charged or provisioned incorrectly
    Critical,
    /// High - data inconsistency that needs attention
    High,
    /// Medium - potential issue, should investigate
    Medium,
    /// Low - minor inconsistency, informational
    Low,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
            ViolationSeverity::Low => write!(f, "LOW"),
        }
    }
}

/// Summary of all invariant checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    #[serde(with = "time::serde::rfc3339")]
    pub checked_at: OffsetDateTime,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub violations: Vec<InvariantViolation>,
    /// True when no check reported a violation
    pub healthy: bool,
}

const CHECKS: [&str; 4] = [
    "canonical_statuses_present",
    "completed_order_has_activation",
    "plan_matches_latest_completed_order",
    "single_pending_order",
];

#[derive(Debug, sqlx::FromRow)]
struct UnactivatedOrdersRow {
    subscription_id: i64,
    completed_orders: i64,
    activations: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct PlanMismatchRow {
    subscription_id: i64,
    subscription_plan_id: i64,
    order_plan_id: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct PendingOrdersRow {
    subscription_id: i64,
    pending_orders: i64,
}

/// Service for running ledger invariant checks
pub struct InvariantChecker {
    pool: SqlitePool,
}

impl InvariantChecker {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run all invariant checks and return summary
    pub async fn run_all_checks(&self) -> BillingResult<InvariantCheckSummary> {
        let now = OffsetDateTime::now_utc();
        let mut violations = Vec::new();

        for name in CHECKS {
            violations.extend(self.run_check(name).await?);
        }

        let checks_run = CHECKS.len();
        let checks_failed = violations
            .iter()
            .map(|v| &v.invariant)
            .collect::<std::collections::HashSet<_>>()
            .len();
        let checks_passed = checks_run - checks_failed;

        if !violations.is_empty() {
            tracing::warn!(
                checks_failed,
                violations = violations.len(),
                "Ledger invariant violations found"
            );
        }

        Ok(InvariantCheckSummary {
            checked_at: now,
            checks_run,
            checks_passed,
            checks_failed,
            healthy: violations.is_empty(),
            violations,
        })
    }

    /// Invariant 1: PENDING and COMPLETED status rows exist
    ///
    /// Without them no order can be created or confirmed.
    async fn check_canonical_statuses_present(&self) -> BillingResult<Vec<InvariantViolation>> {
        let missing: Vec<String> = sqlx::query_scalar(
            r#"
            WITH required(name) AS (VALUES ('PENDING'), ('COMPLETED'))
            SELECT r.name
            FROM required r
            WHERE NOT EXISTS (SELECT 1 FROM order_statuses s WHERE s.name = r.name)
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(missing
            .into_iter()
            .map(|name| InvariantViolation {
                invariant: "canonical_statuses_present".to_string(),
                subscription_ids: vec![],
                description: format!("Order status '{name}' is not configured"),
                context: serde_json::json!({ "status": name }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 2: Every completed order produced an activation
    async fn check_completed_order_has_activation(
        &self,
    ) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<UnactivatedOrdersRow> = sqlx::query_as(
            r#"
            SELECT subscription_id, completed_orders, activations
            FROM (
                SELECT
                    s.id AS subscription_id,
                    (SELECT COUNT(*)
                       FROM orders o
                       JOIN order_statuses st ON st.id = o.status_id
                      WHERE o.subscription_id = s.id AND st.name = 'COMPLETED') AS completed_orders,
                    (SELECT COUNT(*)
                       FROM subscription_activations a
                      WHERE a.subscription_id = s.id) AS activations
                FROM subscriptions s
            )
            WHERE completed_orders > activations
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "completed_order_has_activation".to_string(),
                subscription_ids: vec![row.subscription_id],
                description: format!(
                    "Subscription has {} completed orders but only {} activations",
                    row.completed_orders, row.activations
                ),
                context: serde_json::json!({
                    "completed_orders": row.completed_orders,
                    "activations": row.activations,
                }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    /// Invariant 3: Subscription plan matches its latest completed order
    ///
    /// A mismatch means the customer is provisioned on a plan they did not
    /// pay for, or paid for a plan they never received.
    async fn check_plan_matches_latest_completed_order(
        &self,
    ) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<PlanMismatchRow> = sqlx::query_as(
            r#"
            SELECT subscription_id, subscription_plan_id, order_plan_id
            FROM (
                SELECT
                    s.id AS subscription_id,
                    s.plan_id AS subscription_plan_id,
                    (SELECT o.plan_id
                       FROM orders o
                       JOIN order_statuses st ON st.id = o.status_id
                      WHERE o.subscription_id = s.id AND st.name = 'COMPLETED'
                      ORDER BY o.created_at DESC, o.id DESC
                      LIMIT 1) AS order_plan_id
                FROM subscriptions s
            )
            WHERE order_plan_id IS NOT NULL
              AND order_plan_id != subscription_plan_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "plan_matches_latest_completed_order".to_string(),
                subscription_ids: vec![row.subscription_id],
                description: format!(
                    "Subscription is on plan {} but its latest completed order bought plan {}",
                    row.subscription_plan_id, row.order_plan_id
                ),
                context: serde_json::json!({
                    "subscription_plan_id": row.subscription_plan_id,
                    "order_plan_id": row.order_plan_id,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 4: At most one PENDING order per subscription
    async fn check_single_pending_order(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<PendingOrdersRow> = sqlx::query_as(
            r#"
            SELECT o.subscription_id, COUNT(*) AS pending_orders
            FROM orders o
            JOIN order_statuses st ON st.id = o.status_id
            WHERE st.name = 'PENDING'
            GROUP BY o.subscription_id
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "single_pending_order".to_string(),
                subscription_ids: vec![row.subscription_id],
                description: format!(
                    "Subscription has {} pending orders (expected at most 1)",
                    row.pending_orders
                ),
                context: serde_json::json!({ "pending_orders": row.pending_orders }),
                severity: ViolationSeverity::Medium,
            })
            .collect())
    }

    /// Run a single invariant check by name
    pub async fn run_check(&self, name: &str) -> BillingResult<Vec<InvariantViolation>> {
        match name {
            "canonical_statuses_present" => self.check_canonical_statuses_present().await,
            "completed_order_has_activation" => self.check_completed_order_has_activation().await,
            "plan_matches_latest_completed_order" => {
                self.check_plan_matches_latest_completed_order().await
            }
            "single_pending_order" => self.check_single_pending_order().await,
            other => Err(BillingError::InvalidInput(format!(
                "Unknown invariant check '{other}'"
            ))),
        }
    }

    /// Get list of all available invariant checks
    pub fn available_checks() -> Vec<&'static str> {
        CHECKS.to_vec()
    }
}
