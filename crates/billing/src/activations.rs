//! Activation tracker
//!
//! Each confirmed payment inserts one activation marking the start of a paid
//! period. Inserts are not idempotent; readers always take the row with the
//! greatest `activated_at` (ties broken by id), never the last inserted one.

use sqlx::SqliteConnection;
use time::OffsetDateTime;

use crate::error::{BillingError, BillingResult};
use crate::models::{from_unix, to_unix, Activation, BillingCycle};

#[derive(Debug, sqlx::FromRow)]
struct ActivationRow {
    id: i64,
    subscription_id: i64,
    activated_at: i64,
    billing_cycle: String,
}

impl TryFrom<ActivationRow> for Activation {
    type Error = BillingError;

    fn try_from(row: ActivationRow) -> BillingResult<Self> {
        Ok(Activation {
            id: row.id,
            subscription_id: row.subscription_id,
            activated_at: from_unix(row.activated_at)?,
            billing_cycle: BillingCycle::parse(&row.billing_cycle)?,
        })
    }
}

/// Record the start of a billing period at `at`
pub async fn activate(
    conn: &mut SqliteConnection,
    subscription_id: i64,
    billing_cycle: BillingCycle,
    at: OffsetDateTime,
) -> BillingResult<Activation> {
    let activated_at = to_unix(at);
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO subscription_activations (subscription_id, activated_at, billing_cycle)
        VALUES (?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(subscription_id)
    .bind(activated_at)
    .bind(billing_cycle.as_str())
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(
        activation_id = id,
        subscription_id,
        billing_cycle = %billing_cycle,
        activated_at,
        "Subscription activated"
    );

    Ok(Activation {
        id,
        subscription_id,
        activated_at: from_unix(activated_at)?,
        billing_cycle,
    })
}

/// Latest activation by `activated_at`, or `None` if the subscription was never paid
pub async fn find_latest_activation(
    conn: &mut SqliteConnection,
    subscription_id: i64,
) -> BillingResult<Option<Activation>> {
    let row: Option<ActivationRow> = sqlx::query_as(
        r#"
        SELECT id, subscription_id, activated_at, billing_cycle
        FROM subscription_activations
        WHERE subscription_id = ?
        ORDER BY activated_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(subscription_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Activation::try_from).transpose()
}

/// Latest activation by `activated_at`
pub async fn latest_activation(
    conn: &mut SqliteConnection,
    subscription_id: i64,
) -> BillingResult<Activation> {
    find_latest_activation(conn, subscription_id)
        .await?
        .ok_or_else(|| {
            BillingError::NotFound(format!(
                "Subscription {subscription_id} has no activation"
            ))
        })
}
