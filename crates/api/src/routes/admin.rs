//! Admin billing routes
//!
//! Mounted behind `require_admin`; the facade checks the admin flag again.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use planledger_billing::{BillingOutcome, InvariantCheckSummary, NewPlan, OrderStatusRecord};
use serde::Deserialize;

use crate::{auth::AuthUser, error::ApiResult, state::AppState};

#[derive(Debug, Deserialize)]
pub struct NewOrderStatusBody {
    pub name: String,
}

pub async fn list_order_statuses(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<OrderStatusRecord>>> {
    let statuses = state.billing.list_order_statuses(auth_user.caller()).await?;
    Ok(Json(statuses))
}

pub async fn add_order_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<NewOrderStatusBody>,
) -> ApiResult<(StatusCode, Json<BillingOutcome>)> {
    let outcome = state
        .billing
        .add_order_status(auth_user.caller(), &body.name)
        .await?;
    tracing::info!(admin_id = auth_user.user_id, name = %body.name, "Admin added order status");
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn add_plan(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<NewPlan>,
) -> ApiResult<(StatusCode, Json<BillingOutcome>)> {
    let outcome = state.billing.add_plan(auth_user.caller(), &body).await?;
    tracing::info!(
        admin_id = auth_user.user_id,
        name = %body.name,
        price = body.price,
        "Admin added plan"
    );
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Run every ledger invariant check
pub async fn run_invariants(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<InvariantCheckSummary>> {
    let summary = state.billing.check_invariants(auth_user.caller()).await?;
    Ok(Json(summary))
}
