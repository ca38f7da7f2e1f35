// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for the Billing Ledger
//!
//! Exercises the facade end to end against an in-memory ledger:
//! - Ordering and payment confirmation (LEDGER-O01 to LEDGER-O05)
//! - Proration through upgrade requests (LEDGER-P01 to LEDGER-P05)
//! - Admin gating and the public catalog (LEDGER-A01 to LEDGER-A04)
//! - Activation recency (LEDGER-V01 to LEDGER-V02)

#[cfg(test)]
mod support {
    use crate::models::{BillingOutcome, Caller};
    use crate::proration::ProrationQuote;
    use crate::service::{BillingService, OrderSubscriptionRequest};
    use crate::test_support::LedgerFixture;
    use crate::BillingConfig;

    pub const DAY: i64 = 86_400;

    pub fn billing(fixture: &LedgerFixture) -> BillingService {
        BillingService::new(fixture.store.clone(), &BillingConfig::default())
    }

    pub fn owner(fixture: &LedgerFixture) -> Caller {
        Caller::user(fixture.user_id)
    }

    pub async fn order_starter(fixture: &LedgerFixture, billing: &BillingService) -> i64 {
        match billing
            .order_subscription(
                owner(fixture),
                &OrderSubscriptionRequest {
                    team_id: fixture.team_id,
                    plan_id: fixture.starter.id,
                },
            )
            .await
            .unwrap()
        {
            BillingOutcome::Status {
                success: true,
                subscription_id: Some(id),
            } => id,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    pub fn price(outcome: BillingOutcome) -> ProrationQuote {
        match outcome {
            BillingOutcome::Price(quote) => quote,
            other => panic!("expected a price outcome, got {other:?}"),
        }
    }

    /// Shift every activation of a subscription `days` into the past
    pub async fn backdate_activations(fixture: &LedgerFixture, subscription_id: i64, days: i64) {
        sqlx::query(
            "UPDATE subscription_activations SET activated_at = activated_at - ? WHERE subscription_id = ?",
        )
        .bind(days * DAY)
        .bind(subscription_id)
        .execute(fixture.store.pool())
        .await
        .unwrap();
    }
}

#[cfg(test)]
mod ordering_tests {
    use super::support::*;
    use crate::error::BillingError;
    use crate::models::{BillingCycle, BillingOutcome};
    use crate::orders::OrderStatus;
    use crate::test_support::seed_ledger;

    // =========================================================================
    // LEDGER-O01: ordering writes exactly one subscription and one PENDING order
    // =========================================================================
    #[tokio::test]
    async fn test_order_writes_one_subscription_and_one_pending_order() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);

        let subscription_id = order_starter(&fixture, &billing).await;

        assert_eq!(fixture.count("subscriptions").await, 1);
        assert_eq!(fixture.count("orders").await, 1);
        let history = billing
            .order_history(owner(&fixture), subscription_id)
            .await
            .unwrap();
        assert_eq!(history[0].status, OrderStatus::Pending);
    }

    // =========================================================================
    // LEDGER-O02: confirming payment completes the order and adds one activation
    // =========================================================================
    #[tokio::test]
    async fn test_confirm_payment_completes_and_activates_once() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);
        let subscription_id = order_starter(&fixture, &billing).await;

        let outcome = billing
            .confirm_order_payment(owner(&fixture), subscription_id, BillingCycle::Yearly)
            .await
            .unwrap();

        assert_eq!(outcome, BillingOutcome::success());
        assert_eq!(fixture.count("subscription_activations").await, 1);
        let history = billing
            .order_history(owner(&fixture), subscription_id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, OrderStatus::Completed);
    }

    // =========================================================================
    // LEDGER-O03: confirming twice fails the second time and writes nothing
    // =========================================================================
    #[tokio::test]
    async fn test_confirm_without_pending_order_writes_nothing() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);
        let subscription_id = order_starter(&fixture, &billing).await;
        billing
            .confirm_order_payment(owner(&fixture), subscription_id, BillingCycle::Monthly)
            .await
            .unwrap();

        let result = billing
            .confirm_order_payment(owner(&fixture), subscription_id, BillingCycle::Monthly)
            .await;

        assert!(
            matches!(result, Err(BillingError::NoPendingOrder(id)) if id == subscription_id),
            "got {result:?}"
        );
        assert_eq!(fixture.count("subscription_activations").await, 1);
    }

    // =========================================================================
    // LEDGER-O04: unknown subscription is NotFound, not a silent success
    // =========================================================================
    #[tokio::test]
    async fn test_confirm_unknown_subscription_not_found() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);

        let result = billing
            .confirm_order_payment(owner(&fixture), 404, BillingCycle::Monthly)
            .await;
        assert!(matches!(result, Err(BillingError::NotFound(_))));
    }

    // =========================================================================
    // LEDGER-O05: a missing COMPLETED status row rolls the whole confirmation back
    // =========================================================================
    #[tokio::test]
    async fn test_missing_completed_status_rolls_back() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);
        let subscription_id = order_starter(&fixture, &billing).await;

        // The row still exists but no longer resolves by name
        sqlx::query("UPDATE order_statuses SET name = 'DONE' WHERE name = 'COMPLETED'")
            .execute(fixture.store.pool())
            .await
            .unwrap();

        let result = billing
            .confirm_order_payment(owner(&fixture), subscription_id, BillingCycle::Monthly)
            .await;
        assert!(matches!(result, Err(BillingError::NotFound(_))));
        assert_eq!(fixture.count("subscription_activations").await, 0);
        let history = billing
            .order_history(owner(&fixture), subscription_id)
            .await
            .unwrap();
        assert_eq!(history[0].status, OrderStatus::Pending);
    }
}

#[cfg(test)]
mod proration_tests {
    use super::support::*;
    use crate::error::BillingError;
    use crate::models::BillingCycle;
    use crate::orders::OrderStatus;
    use crate::service::ConfirmUpgradeRequest;
    use crate::test_support::seed_ledger;

    // =========================================================================
    // LEDGER-P01: STARTER (30) -> PREMIUM (60) after 11 days costs 19
    // =========================================================================
    #[tokio::test]
    async fn test_upgrade_after_eleven_days_costs_nineteen() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);
        let subscription_id = order_starter(&fixture, &billing).await;
        billing
            .confirm_order_payment(owner(&fixture), subscription_id, BillingCycle::Monthly)
            .await
            .unwrap();
        backdate_activations(&fixture, subscription_id, 11).await;

        let quote = price(
            billing
                .upgrade_plan_request(owner(&fixture), subscription_id, fixture.premium.id)
                .await
                .unwrap(),
        );

        assert_eq!(quote.prorated_price, 19.0);
        assert_eq!(quote.amount_due, 19);
        assert_eq!(quote.elapsed_days, Some(11));
        assert_eq!(quote.remaining_days, Some(19));
    }

    // =========================================================================
    // LEDGER-P02: no activation yet -> degraded zero quote, order still recorded
    // =========================================================================
    #[tokio::test]
    async fn test_upgrade_without_activation_quotes_zero() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);
        let subscription_id = order_starter(&fixture, &billing).await;

        let quote = price(
            billing
                .upgrade_plan_request(owner(&fixture), subscription_id, fixture.premium.id)
                .await
                .unwrap(),
        );

        assert_eq!(quote.prorated_price, 0.0);
        assert_eq!(quote.current_plan_id, None);
        assert_eq!(fixture.count("orders").await, 2);

        // The unpaid purchase is replaced, never left dangling
        let history = billing
            .order_history(owner(&fixture), subscription_id)
            .await
            .unwrap();
        let pending: Vec<_> = history
            .iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].plan_id, fixture.premium.id);
    }

    // =========================================================================
    // LEDGER-P03: cycle overrun clamps to zero instead of going negative
    // =========================================================================
    #[tokio::test]
    async fn test_overrun_cycle_quotes_zero() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);
        let subscription_id = order_starter(&fixture, &billing).await;
        billing
            .confirm_order_payment(owner(&fixture), subscription_id, BillingCycle::Monthly)
            .await
            .unwrap();
        backdate_activations(&fixture, subscription_id, 45).await;

        let quote = price(
            billing
                .upgrade_plan_request(owner(&fixture), subscription_id, fixture.premium.id)
                .await
                .unwrap(),
        );

        assert_eq!(quote.elapsed_days, Some(45));
        assert_eq!(quote.remaining_days, Some(0));
        assert_eq!(quote.prorated_price, 0.0);
    }

    // =========================================================================
    // LEDGER-P04: upgrade to an unknown plan writes no order
    // =========================================================================
    #[tokio::test]
    async fn test_upgrade_to_unknown_plan_writes_nothing() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);
        let subscription_id = order_starter(&fixture, &billing).await;

        let result = billing
            .upgrade_plan_request(owner(&fixture), subscription_id, 999)
            .await;
        assert!(matches!(result, Err(BillingError::NotFound(_))));
        assert_eq!(fixture.count("orders").await, 1);
    }

    // =========================================================================
    // LEDGER-P05: a quote priced before another upgrade landed is refused
    // =========================================================================
    #[tokio::test]
    async fn test_stale_quote_version_is_refused() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);
        let caller = owner(&fixture);
        let subscription_id = order_starter(&fixture, &billing).await;
        billing
            .confirm_order_payment(caller, subscription_id, BillingCycle::Monthly)
            .await
            .unwrap();

        let confirm = |plan_id, version| ConfirmUpgradeRequest {
            plan_id,
            billing_cycle: BillingCycle::Monthly,
            expected_version: Some(version),
        };

        let first = price(
            billing
                .upgrade_plan_request(caller, subscription_id, fixture.premium.id)
                .await
                .unwrap(),
        );
        assert_eq!(first.subscription_version, 0);
        billing
            .confirm_upgrade_payment(
                caller,
                subscription_id,
                &confirm(fixture.premium.id, first.subscription_version),
            )
            .await
            .unwrap();

        // A client still holding the first quote tries to switch back
        billing
            .upgrade_plan_request(caller, subscription_id, fixture.starter.id)
            .await
            .unwrap();
        let result = billing
            .confirm_upgrade_payment(
                caller,
                subscription_id,
                &confirm(fixture.starter.id, first.subscription_version),
            )
            .await;

        assert!(matches!(result, Err(BillingError::ConcurrentModification(_))));
        assert_eq!(fixture.count("subscription_activations").await, 2);
    }
}

#[cfg(test)]
mod admin_tests {
    use super::support::*;
    use crate::error::BillingError;
    use crate::models::Caller;
    use crate::service::{BillingService, NewPlan};
    use crate::store::LedgerStore;
    use crate::test_support::seed_ledger;
    use crate::BillingConfig;

    // =========================================================================
    // LEDGER-A01: non-admin cannot add a plan
    // =========================================================================
    #[tokio::test]
    async fn test_non_admin_add_plan_forbidden() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);

        let result = billing
            .add_plan(
                owner(&fixture),
                &NewPlan {
                    name: "SNEAKY".to_string(),
                    price: 1,
                },
            )
            .await;

        assert!(matches!(result, Err(BillingError::Forbidden(_))));
        assert_eq!(fixture.count("plans").await, 2);
    }

    // =========================================================================
    // LEDGER-A02: non-admin cannot add an order status
    // =========================================================================
    #[tokio::test]
    async fn test_non_admin_add_order_status_forbidden() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);

        let result = billing.add_order_status(owner(&fixture), "REFUNDED").await;

        assert!(matches!(result, Err(BillingError::Forbidden(_))));
        assert_eq!(fixture.count("order_statuses").await, 3);
    }

    // =========================================================================
    // LEDGER-A03: the catalog lists exactly the admin-added plans in order
    // =========================================================================
    #[tokio::test]
    async fn test_catalog_lists_admin_plans_in_creation_order() {
        let store = LedgerStore::in_memory().await.unwrap();
        let billing = BillingService::new(store, &BillingConfig::default());
        let admin = Caller::admin(1);

        for (name, price) in [("GOLD", 90), ("BRONZE", 10), ("SILVER", 50)] {
            billing
                .add_plan(
                    admin,
                    &NewPlan {
                        name: name.to_string(),
                        price,
                    },
                )
                .await
                .unwrap();
        }

        let plans = billing.list_plans().await.unwrap();
        let names: Vec<&str> = plans.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["GOLD", "BRONZE", "SILVER"]);
    }

    // =========================================================================
    // LEDGER-A04: duplicate status names surface as a store error
    // =========================================================================
    #[tokio::test]
    async fn test_duplicate_status_is_a_store_error() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);

        let result = billing
            .add_order_status(Caller::admin(fixture.admin_id), "PENDING")
            .await;
        assert!(matches!(result, Err(BillingError::Database(_))));
    }
}

#[cfg(test)]
mod activation_tests {
    use super::support::*;
    use crate::models::BillingCycle;
    use crate::test_support::seed_ledger;

    // =========================================================================
    // LEDGER-V01: each confirmed payment adds its own activation
    // =========================================================================
    #[tokio::test]
    async fn test_each_payment_adds_an_activation() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);
        let caller = owner(&fixture);
        let subscription_id = order_starter(&fixture, &billing).await;
        billing
            .confirm_order_payment(caller, subscription_id, BillingCycle::Monthly)
            .await
            .unwrap();

        // Renewal on the same plan
        billing
            .upgrade_plan_request(caller, subscription_id, fixture.starter.id)
            .await
            .unwrap();
        billing
            .confirm_order_payment(caller, subscription_id, BillingCycle::Monthly)
            .await
            .unwrap();

        assert_eq!(fixture.count("subscription_activations").await, 2);
    }

    // =========================================================================
    // LEDGER-V02: proration anchors on the newest activation, not the last row
    // =========================================================================
    #[tokio::test]
    async fn test_proration_uses_most_recent_activation() {
        let fixture = seed_ledger().await;
        let billing = billing(&fixture);
        let caller = owner(&fixture);
        let subscription_id = order_starter(&fixture, &billing).await;
        billing
            .confirm_order_payment(caller, subscription_id, BillingCycle::Monthly)
            .await
            .unwrap();
        backdate_activations(&fixture, subscription_id, 11).await;

        // Older row inserted after the real one
        sqlx::query(
            "INSERT INTO subscription_activations (subscription_id, activated_at, billing_cycle) \
             SELECT subscription_id, activated_at - ?, 'MONTHLY' FROM subscription_activations \
             WHERE subscription_id = ?",
        )
        .bind(9 * DAY)
        .bind(subscription_id)
        .execute(fixture.store.pool())
        .await
        .unwrap();

        let quote = price(
            billing
                .upgrade_plan_request(caller, subscription_id, fixture.premium.id)
                .await
                .unwrap(),
        );
        assert_eq!(quote.elapsed_days, Some(11));
        assert_eq!(quote.prorated_price, 19.0);
    }
}
