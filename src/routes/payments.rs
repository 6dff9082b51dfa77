use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::handlers::payments;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    let authed = Router::new()
        .route("/deposit", post(payments::create_deposit))
        .route("/status/:order_code", get(payments::check_payment_status))
        .layer(middleware::from_fn(auth_middleware));

    // The webhook authenticates itself by signature, not by bearer token.
    Router::new()
        .route("/health", get(payments_health))
        .route("/webhook", post(payments::payos_webhook))
        .merge(authed)
}

async fn payments_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "payments",
        "timestamp": Utc::now().to_rfc3339(),
        "features": ["deposit", "payout", "webhook", "payment-status-check"]
    }))
}
