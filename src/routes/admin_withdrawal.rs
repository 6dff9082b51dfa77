use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::admin_withdrawal;
use crate::middleware::auth::{auth_middleware, require_admin};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bank-account", post(admin_withdrawal::upsert_bank_account))
        .route("/bank-account", get(admin_withdrawal::get_bank_account))
        .route("/withdraw", post(admin_withdrawal::withdraw_to_bank))
        .route("/history", get(admin_withdrawal::get_withdrawal_history))
        .route("/available-balance", get(admin_withdrawal::get_available_balance))
        .route("/status/:order_code", get(admin_withdrawal::check_withdrawal_status))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn(auth_middleware))
}
