//! Customer-facing billing routes
//!
//! Every handler forwards to the billing facade with the authenticated
//! caller; ownership checks happen inside the facade.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use planledger_billing::{
    BillingCycle, BillingOutcome, ConfirmUpgradeRequest, Order, OrderSubscriptionRequest, Plan,
    SubscriptionOverview,
};
use serde::Deserialize;

use crate::{auth::AuthUser, error::ApiResult, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentBody {
    pub billing_cycle: BillingCycle,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeBody {
    pub plan_id: i64,
}

/// Public plan catalog
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<Plan>>> {
    Ok(Json(state.billing.list_plans().await?))
}

pub async fn order_subscription(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<OrderSubscriptionRequest>,
) -> ApiResult<(StatusCode, Json<BillingOutcome>)> {
    let outcome = state
        .billing
        .order_subscription(auth_user.caller(), &body)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(subscription_id): Path<i64>,
) -> ApiResult<Json<SubscriptionOverview>> {
    let overview = state
        .billing
        .subscription_overview(auth_user.caller(), subscription_id)
        .await?;
    Ok(Json(overview))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(subscription_id): Path<i64>,
) -> ApiResult<Json<Vec<Order>>> {
    let orders = state
        .billing
        .order_history(auth_user.caller(), subscription_id)
        .await?;
    Ok(Json(orders))
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(subscription_id): Path<i64>,
    Json(body): Json<ConfirmPaymentBody>,
) -> ApiResult<Json<BillingOutcome>> {
    let outcome = state
        .billing
        .confirm_order_payment(auth_user.caller(), subscription_id, body.billing_cycle)
        .await?;
    Ok(Json(outcome))
}

pub async fn request_upgrade(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(subscription_id): Path<i64>,
    Json(body): Json<UpgradeBody>,
) -> ApiResult<Json<BillingOutcome>> {
    let outcome = state
        .billing
        .upgrade_plan_request(auth_user.caller(), subscription_id, body.plan_id)
        .await?;
    Ok(Json(outcome))
}

pub async fn confirm_upgrade(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(subscription_id): Path<i64>,
    Json(body): Json<ConfirmUpgradeRequest>,
) -> ApiResult<Json<BillingOutcome>> {
    let outcome = state
        .billing
        .confirm_upgrade_payment(auth_user.caller(), subscription_id, &body)
        .await?;
    Ok(Json(outcome))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(subscription_id): Path<i64>,
) -> ApiResult<Json<BillingOutcome>> {
    let outcome = state
        .billing
        .cancel_pending_order(auth_user.caller(), subscription_id)
        .await?;
    Ok(Json(outcome))
}
