//! Billing facade
//!
//! Every mutating procedure opens exactly one ledger transaction, runs the
//! order, activation and proration steps inside it, and commits. Any error
//! drops the transaction, which rolls back everything the procedure wrote.

use serde::Deserialize;
use time::OffsetDateTime;

use crate::activations::{activate, find_latest_activation};
use crate::config::BillingConfig;
use crate::error::{BillingError, BillingResult};
use crate::invariants::{InvariantCheckSummary, InvariantChecker};
use crate::models::{
    BillingCycle, BillingOutcome, Caller, Order, OrderStatusRecord, Plan, SubscriptionOverview,
};
use crate::orders::{cancel_order, complete_order, create_order, latest_pending_order, list_orders};
use crate::plans::{self, insert_order_status, insert_plan, require_plan};
use crate::proration::{quote_upgrade, ProrationPolicy};
use crate::store::LedgerStore;
use crate::subscriptions::{insert_subscription, subscription_for_caller, switch_plan, team_owner};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubscriptionRequest {
    pub team_id: i64,
    pub plan_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmUpgradeRequest {
    pub plan_id: i64,
    pub billing_cycle: BillingCycle,
    /// Version returned with the upgrade quote; the current version when absent
    #[serde(default)]
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlan {
    pub name: String,
    pub price: i64,
}

#[derive(Clone)]
pub struct BillingService {
    store: LedgerStore,
    policy: ProrationPolicy,
}

fn ensure_admin(caller: Caller, action: &str) -> BillingResult<()> {
    if caller.is_admin {
        return Ok(());
    }
    tracing::warn!(user_id = caller.user_id, action, "Non-admin attempted admin operation");
    Err(BillingError::Forbidden(format!("{action} requires an admin")))
}

impl BillingService {
    pub fn new(store: LedgerStore, config: &BillingConfig) -> Self {
        Self {
            store,
            policy: config.proration_policy(),
        }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Open a subscription for one of the caller's teams with a PENDING order
    pub async fn order_subscription(
        &self,
        caller: Caller,
        request: &OrderSubscriptionRequest,
    ) -> BillingResult<BillingOutcome> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.store.begin().await?;

        let owner = team_owner(&mut tx, request.team_id).await?;
        if owner != caller.user_id {
            tracing::warn!(
                team_id = request.team_id,
                owner_id = owner,
                caller_id = caller.user_id,
                "Rejected subscription order for another user's team"
            );
            return Err(BillingError::Forbidden(format!(
                "Team {} does not belong to the caller",
                request.team_id
            )));
        }
        let plan = require_plan(&mut tx, request.plan_id).await?;

        let subscription =
            insert_subscription(&mut tx, caller.user_id, request.team_id, plan.id).await?;
        create_order(&mut tx, subscription.id, plan.id, now).await?;

        tx.commit().await?;

        tracing::info!(
            subscription_id = subscription.id,
            team_id = request.team_id,
            plan = %plan.name,
            "Subscription ordered"
        );
        Ok(BillingOutcome::created(subscription.id))
    }

    /// Complete the pending order and start the first (or next) paid period
    pub async fn confirm_order_payment(
        &self,
        caller: Caller,
        subscription_id: i64,
        billing_cycle: BillingCycle,
    ) -> BillingResult<BillingOutcome> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.store.begin().await?;

        let subscription = subscription_for_caller(&mut tx, caller, subscription_id).await?;
        let pending = latest_pending_order(&mut tx, subscription_id)
            .await?
            .ok_or(BillingError::NoPendingOrder(subscription_id))?;
        if pending.plan_id != subscription.plan_id {
            return Err(BillingError::InvalidInput(format!(
                "Pending order {} changes the plan to {}; confirm it as an upgrade",
                pending.id, pending.plan_id
            )));
        }

        let order = complete_order(&mut tx, subscription_id).await?;
        let activation = activate(&mut tx, subscription_id, billing_cycle, now).await?;

        tx.commit().await?;

        tracing::info!(
            subscription_id,
            order_id = order.id,
            activation_id = activation.id,
            billing_cycle = %billing_cycle,
            "Order payment confirmed"
        );
        Ok(BillingOutcome::success())
    }

    /// Record a PENDING order for `plan_id` and price the change against the
    /// plan and activation in force before it.
    ///
    /// A subscription holds at most one PENDING order: one still awaiting
    /// payment is cancelled in the same transaction and replaced.
    pub async fn upgrade_plan_request(
        &self,
        caller: Caller,
        subscription_id: i64,
        plan_id: i64,
    ) -> BillingResult<BillingOutcome> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.store.begin().await?;

        let subscription = subscription_for_caller(&mut tx, caller, subscription_id).await?;
        let target = require_plan(&mut tx, plan_id).await?;

        if latest_pending_order(&mut tx, subscription_id).await?.is_some() {
            let superseded = cancel_order(&mut tx, subscription_id).await?;
            tracing::info!(
                subscription_id,
                order_id = superseded.id,
                plan_id = superseded.plan_id,
                "Superseded pending order"
            );
        }

        let order = create_order(&mut tx, subscription_id, target.id, now).await?;
        let quote = quote_upgrade(&mut tx, &subscription, &target, now, &self.policy).await?;

        tx.commit().await?;

        tracing::info!(
            subscription_id,
            order_id = order.id,
            target_plan_id = target.id,
            prorated_price = quote.prorated_price,
            "Upgrade requested"
        );
        Ok(quote.into())
    }

    /// Switch the plan, complete the pending upgrade order and start a new
    /// paid period, all or nothing
    pub async fn confirm_upgrade_payment(
        &self,
        caller: Caller,
        subscription_id: i64,
        request: &ConfirmUpgradeRequest,
    ) -> BillingResult<BillingOutcome> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.store.begin().await?;

        let subscription = subscription_for_caller(&mut tx, caller, subscription_id).await?;
        let pending = latest_pending_order(&mut tx, subscription_id)
            .await?
            .ok_or(BillingError::NoPendingOrder(subscription_id))?;
        if pending.plan_id != request.plan_id {
            return Err(BillingError::InvalidInput(format!(
                "Pending order {} is for plan {}, not plan {}",
                pending.id, pending.plan_id, request.plan_id
            )));
        }

        let expected_version = request.expected_version.unwrap_or(subscription.version);
        let version =
            switch_plan(&mut tx, subscription_id, request.plan_id, expected_version).await?;
        let order = complete_order(&mut tx, subscription_id).await?;
        let activation = activate(&mut tx, subscription_id, request.billing_cycle, now).await?;

        tx.commit().await?;

        tracing::info!(
            subscription_id,
            from_plan_id = subscription.plan_id,
            to_plan_id = request.plan_id,
            order_id = order.id,
            activation_id = activation.id,
            version,
            "Upgrade payment confirmed"
        );
        Ok(BillingOutcome::success())
    }

    /// Abandon the most recent PENDING order
    pub async fn cancel_pending_order(
        &self,
        caller: Caller,
        subscription_id: i64,
    ) -> BillingResult<BillingOutcome> {
        let mut tx = self.store.begin().await?;

        subscription_for_caller(&mut tx, caller, subscription_id).await?;
        let order = cancel_order(&mut tx, subscription_id).await?;

        tx.commit().await?;

        tracing::info!(subscription_id, order_id = order.id, "Pending order cancelled");
        Ok(BillingOutcome::success())
    }

    pub async fn add_order_status(
        &self,
        caller: Caller,
        name: &str,
    ) -> BillingResult<BillingOutcome> {
        ensure_admin(caller, "Adding an order status")?;

        let mut tx = self.store.begin().await?;
        insert_order_status(&mut tx, name).await?;
        tx.commit().await?;

        Ok(BillingOutcome::success())
    }

    pub async fn add_plan(&self, caller: Caller, plan: &NewPlan) -> BillingResult<BillingOutcome> {
        ensure_admin(caller, "Adding a plan")?;

        let mut tx = self.store.begin().await?;
        insert_plan(&mut tx, &plan.name, plan.price).await?;
        tx.commit().await?;

        Ok(BillingOutcome::success())
    }

    /// Configured order statuses, oldest first
    pub async fn list_order_statuses(
        &self,
        caller: Caller,
    ) -> BillingResult<Vec<OrderStatusRecord>> {
        ensure_admin(caller, "Listing order statuses")?;
        let mut conn = self.store.pool().acquire().await?;
        plans::list_order_statuses(&mut conn).await
    }

    /// Public plan catalog in creation order
    pub async fn list_plans(&self) -> BillingResult<Vec<Plan>> {
        let mut conn = self.store.pool().acquire().await?;
        plans::list_plans(&mut conn).await
    }

    pub async fn subscription_overview(
        &self,
        caller: Caller,
        subscription_id: i64,
    ) -> BillingResult<SubscriptionOverview> {
        let mut tx = self.store.begin().await?;

        let subscription = subscription_for_caller(&mut tx, caller, subscription_id).await?;
        let plan = require_plan(&mut tx, subscription.plan_id).await?;
        let latest_activation = find_latest_activation(&mut tx, subscription_id).await?;
        let pending_order = latest_pending_order(&mut tx, subscription_id).await?;

        tx.commit().await?;

        Ok(SubscriptionOverview {
            subscription,
            plan,
            latest_activation,
            pending_order,
        })
    }

    /// Every order of the subscription, newest first
    pub async fn order_history(
        &self,
        caller: Caller,
        subscription_id: i64,
    ) -> BillingResult<Vec<Order>> {
        let mut tx = self.store.begin().await?;

        subscription_for_caller(&mut tx, caller, subscription_id).await?;
        let orders = list_orders(&mut tx, subscription_id).await?;

        tx.commit().await?;
        Ok(orders)
    }

    pub async fn check_invariants(&self, caller: Caller) -> BillingResult<InvariantCheckSummary> {
        ensure_admin(caller, "Running invariant checks")?;
        InvariantChecker::new(self.store.pool().clone())
            .run_all_checks()
            .await
    }
}
