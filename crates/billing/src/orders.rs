//! Order state machine
//!
//! An order is created PENDING for every purchase or upgrade and moves to a
//! terminal state exactly once:
//!
//! | From      | To        | Allowed |
//! |-----------|-----------|---------|
//! | PENDING   | COMPLETED | Yes     |
//! | PENDING   | CANCELLED | Yes     |
//! | COMPLETED | *any*     | No      |
//! | CANCELLED | *any*     | No      |
//!
//! Status rows are looked up by name in `order_statuses`, so the numeric ids
//! depend only on what an admin inserted, never on seeding order.

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use time::OffsetDateTime;

use crate::error::{BillingError, BillingResult};
use crate::models::{from_unix, to_unix, Order};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PENDING" => Some(OrderStatus::Pending),
            "COMPLETED" => Some(OrderStatus::Completed),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Completed, OrderStatus::Cancelled],
            OrderStatus::Completed | OrderStatus::Cancelled => &[],
        }
    }

    pub fn validate_transition(&self, to: OrderStatus) -> BillingResult<()> {
        if self.allowed_transitions().contains(&to) {
            Ok(())
        } else {
            Err(BillingError::InvalidTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    subscription_id: i64,
    plan_id: i64,
    status_name: String,
    created_at: i64,
}

impl TryFrom<OrderRow> for Order {
    type Error = BillingError;

    fn try_from(row: OrderRow) -> BillingResult<Self> {
        let status = OrderStatus::from_name(&row.status_name).ok_or_else(|| {
            BillingError::Internal(format!(
                "Order {} carries unknown status '{}'",
                row.id, row.status_name
            ))
        })?;
        Ok(Order {
            id: row.id,
            subscription_id: row.subscription_id,
            plan_id: row.plan_id,
            status,
            created_at: from_unix(row.created_at)?,
        })
    }
}

const ORDER_COLUMNS: &str = r#"
    o.id,
    o.subscription_id,
    o.plan_id,
    s.name AS status_name,
    o.created_at
"#;

/// Resolve the `order_statuses` row id for a state
pub async fn status_id(conn: &mut SqliteConnection, status: OrderStatus) -> BillingResult<i64> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM order_statuses WHERE name = ?")
        .bind(status.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    id.ok_or_else(|| {
        tracing::error!(status = %status, "Order status row is not configured");
        BillingError::NotFound(format!("Order status '{status}' is not configured"))
    })
}

/// Insert a PENDING order for `subscription_id`
pub async fn create_order(
    conn: &mut SqliteConnection,
    subscription_id: i64,
    plan_id: i64,
    now: OffsetDateTime,
) -> BillingResult<Order> {
    let pending = status_id(conn, OrderStatus::Pending).await?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO orders (subscription_id, plan_id, status_id, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(subscription_id)
    .bind(plan_id)
    .bind(pending)
    .bind(to_unix(now))
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(
        order_id = id,
        subscription_id,
        plan_id,
        "Created pending order"
    );

    Ok(Order {
        id,
        subscription_id,
        plan_id,
        status: OrderStatus::Pending,
        created_at: from_unix(to_unix(now))?,
    })
}

/// Most recent PENDING order of a subscription, if any
pub async fn latest_pending_order(
    conn: &mut SqliteConnection,
    subscription_id: i64,
) -> BillingResult<Option<Order>> {
    let sql = format!(
        r#"
        SELECT {ORDER_COLUMNS}
        FROM orders o
        JOIN order_statuses s ON s.id = o.status_id
        WHERE o.subscription_id = ? AND s.name = ?
        ORDER BY o.created_at DESC, o.id DESC
        LIMIT 1
        "#
    );

    let row: Option<OrderRow> = sqlx::query_as(&sql)
        .bind(subscription_id)
        .bind(OrderStatus::Pending.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(Order::try_from).transpose()
}

/// Move the most recent PENDING order of a subscription to `to`
async fn transition_latest_pending(
    conn: &mut SqliteConnection,
    subscription_id: i64,
    to: OrderStatus,
) -> BillingResult<Order> {
    let order = latest_pending_order(conn, subscription_id)
        .await?
        .ok_or(BillingError::NoPendingOrder(subscription_id))?;

    order.status.validate_transition(to)?;
    let current = status_id(conn, order.status).await?;
    let target = status_id(conn, to).await?;

    let rows_affected = sqlx::query("UPDATE orders SET status_id = ? WHERE id = ? AND status_id = ?")
        .bind(target)
        .bind(order.id)
        .bind(current)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        return Err(BillingError::ConcurrentModification(format!(
            "Order {} changed state while being updated",
            order.id
        )));
    }

    tracing::info!(
        order_id = order.id,
        subscription_id,
        from = %order.status,
        to = %to,
        "Order transitioned"
    );

    Ok(Order { status: to, ..order })
}

/// PENDING -> COMPLETED for the latest pending order.
///
/// Callers must create the matching activation in the same transaction.
pub async fn complete_order(
    conn: &mut SqliteConnection,
    subscription_id: i64,
) -> BillingResult<Order> {
    transition_latest_pending(conn, subscription_id, OrderStatus::Completed).await
}

/// PENDING -> CANCELLED for the latest pending order
pub async fn cancel_order(conn: &mut SqliteConnection, subscription_id: i64) -> BillingResult<Order> {
    transition_latest_pending(conn, subscription_id, OrderStatus::Cancelled).await
}

/// Every order of a subscription, newest first
pub async fn list_orders(
    conn: &mut SqliteConnection,
    subscription_id: i64,
) -> BillingResult<Vec<Order>> {
    let sql = format!(
        r#"
        SELECT {ORDER_COLUMNS}
        FROM orders o
        JOIN order_statuses s ON s.id = o.status_id
        WHERE o.subscription_id = ?
        ORDER BY o.created_at DESC, o.id DESC
        "#
    );

    let rows: Vec<OrderRow> = sqlx::query_as(&sql)
        .bind(subscription_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(Order::try_from).collect()
}
