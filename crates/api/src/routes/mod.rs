//! API routes

pub mod admin;
pub mod billing;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{
    auth::{require_admin, require_auth},
    state::AppState,
};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    let public = Router::new()
        .route("/health", get(health))
        .route("/api/v1/billing/plans", get(billing::list_plans));

    let customer = Router::new()
        .route(
            "/api/v1/billing/subscriptions",
            post(billing::order_subscription),
        )
        .route(
            "/api/v1/billing/subscriptions/{id}",
            get(billing::get_subscription),
        )
        .route(
            "/api/v1/billing/subscriptions/{id}/orders",
            get(billing::list_orders),
        )
        .route(
            "/api/v1/billing/subscriptions/{id}/confirm-payment",
            post(billing::confirm_payment),
        )
        .route(
            "/api/v1/billing/subscriptions/{id}/upgrade",
            post(billing::request_upgrade),
        )
        .route(
            "/api/v1/billing/subscriptions/{id}/confirm-upgrade",
            post(billing::confirm_upgrade),
        )
        .route(
            "/api/v1/billing/subscriptions/{id}/cancel-order",
            post(billing::cancel_order),
        )
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            require_auth,
        ));

    // require_auth is added last so it runs before require_admin
    let admin = Router::new()
        .route(
            "/api/v1/admin/billing/order-statuses",
            get(admin::list_order_statuses).post(admin::add_order_status),
        )
        .route("/api/v1/admin/billing/plans", post(admin::add_plan))
        .route(
            "/api/v1/admin/billing/invariants",
            get(admin::run_invariants),
        )
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    Router::new()
        .merge(public)
        .merge(customer)
        .merge(admin)
        .with_state(state)
}
