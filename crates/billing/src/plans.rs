//! Plan catalog and order-status reference rows

use sqlx::SqliteConnection;

use crate::error::{BillingError, BillingResult};
use crate::models::{OrderStatusRecord, Plan};

/// Trimmed, non-empty catalog name
fn normalize_name(kind: &str, name: &str) -> BillingResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(BillingError::InvalidInput(format!(
            "{kind} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub async fn insert_plan(
    conn: &mut SqliteConnection,
    name: &str,
    price: i64,
) -> BillingResult<Plan> {
    let name = normalize_name("Plan", name)?;
    if price < 0 {
        return Err(BillingError::InvalidInput(format!(
            "Plan price must be non-negative, got {price}"
        )));
    }

    let plan: Plan =
        sqlx::query_as("INSERT INTO plans (name, price) VALUES (?, ?) RETURNING id, name, price")
            .bind(&name)
            .bind(price)
            .fetch_one(&mut *conn)
            .await?;

    tracing::info!(plan_id = plan.id, name = %plan.name, price, "Plan added");
    Ok(plan)
}

/// All plans in creation order
pub async fn list_plans(conn: &mut SqliteConnection) -> BillingResult<Vec<Plan>> {
    let plans = sqlx::query_as("SELECT id, name, price FROM plans ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;
    Ok(plans)
}

pub async fn find_plan(conn: &mut SqliteConnection, plan_id: i64) -> BillingResult<Option<Plan>> {
    let plan = sqlx::query_as("SELECT id, name, price FROM plans WHERE id = ?")
        .bind(plan_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(plan)
}

pub async fn require_plan(conn: &mut SqliteConnection, plan_id: i64) -> BillingResult<Plan> {
    find_plan(conn, plan_id)
        .await?
        .ok_or_else(|| BillingError::NotFound(format!("Plan {plan_id} not found")))
}

pub async fn insert_order_status(
    conn: &mut SqliteConnection,
    name: &str,
) -> BillingResult<OrderStatusRecord> {
    let name = normalize_name("Order status", name)?;

    let status: OrderStatusRecord =
        sqlx::query_as("INSERT INTO order_statuses (name) VALUES (?) RETURNING id, name")
            .bind(&name)
            .fetch_one(&mut *conn)
            .await?;

    tracing::info!(status_id = status.id, name = %status.name, "Order status added");
    Ok(status)
}

pub async fn list_order_statuses(
    conn: &mut SqliteConnection,
) -> BillingResult<Vec<OrderStatusRecord>> {
    let statuses = sqlx::query_as("SELECT id, name FROM order_statuses ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;
    Ok(statuses)
}
