//! Subscription rows and ownership lookups

use sqlx::SqliteConnection;

use crate::error::{BillingError, BillingResult};
use crate::models::{Caller, Subscription};

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, team_id, plan_id, version";

pub async fn insert_subscription(
    conn: &mut SqliteConnection,
    user_id: i64,
    team_id: i64,
    plan_id: i64,
) -> BillingResult<Subscription> {
    let subscription: Subscription = sqlx::query_as(&format!(
        "INSERT INTO subscriptions (user_id, team_id, plan_id) VALUES (?, ?, ?) \
         RETURNING {SUBSCRIPTION_COLUMNS}"
    ))
    .bind(user_id)
    .bind(team_id)
    .bind(plan_id)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(
        subscription_id = subscription.id,
        user_id,
        team_id,
        plan_id,
        "Subscription created"
    );
    Ok(subscription)
}

pub async fn find_subscription(
    conn: &mut SqliteConnection,
    subscription_id: i64,
) -> BillingResult<Option<Subscription>> {
    let subscription = sqlx::query_as(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?"
    ))
    .bind(subscription_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(subscription)
}

/// Load a subscription the caller may act on.
///
/// Admins may act on any subscription; everyone else only on their own.
pub async fn subscription_for_caller(
    conn: &mut SqliteConnection,
    caller: Caller,
    subscription_id: i64,
) -> BillingResult<Subscription> {
    let subscription = find_subscription(conn, subscription_id)
        .await?
        .ok_or_else(|| {
            BillingError::NotFound(format!("Subscription {subscription_id} not found"))
        })?;

    if subscription.user_id != caller.user_id && !caller.is_admin {
        tracing::warn!(
            subscription_id,
            owner_id = subscription.user_id,
            caller_id = caller.user_id,
            "Rejected access to another user's subscription"
        );
        return Err(BillingError::Forbidden(format!(
            "Subscription {subscription_id} does not belong to the caller"
        )));
    }

    Ok(subscription)
}

/// Owning user of a team
pub async fn team_owner(conn: &mut SqliteConnection, team_id: i64) -> BillingResult<i64> {
    let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM teams WHERE id = ?")
        .bind(team_id)
        .fetch_optional(&mut *conn)
        .await?;
    owner.ok_or_else(|| BillingError::NotFound(format!("Team {team_id} not found")))
}

/// Point the subscription at `plan_id` and bump its version.
///
/// The update only applies while the row is still at `expected_version`;
/// otherwise another writer got there first.
pub async fn switch_plan(
    conn: &mut SqliteConnection,
    subscription_id: i64,
    plan_id: i64,
    expected_version: i64,
) -> BillingResult<i64> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE subscriptions SET
            plan_id = ?,
            version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(plan_id)
    .bind(subscription_id)
    .bind(expected_version)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        tracing::warn!(
            subscription_id,
            expected_version,
            "Subscription version moved during plan switch"
        );
        return Err(BillingError::ConcurrentModification(format!(
            "Subscription {subscription_id} was modified by another request. Please retry."
        )));
    }

    let new_version = expected_version + 1;
    tracing::info!(
        subscription_id,
        plan_id,
        version = new_version,
        "Subscription plan switched"
    );
    Ok(new_version)
}
