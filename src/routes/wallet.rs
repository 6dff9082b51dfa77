use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::wallet;
use crate::middleware::auth::{auth_middleware, require_admin};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    let caregiver = Router::new()
        .route("/my-wallet", get(wallet::get_my_wallet))
        .route("/transactions", get(wallet::get_transactions))
        .layer(middleware::from_fn(auth_middleware));

    let admin = Router::new()
        .route("/overview", get(wallet::get_wallet_overview))
        .route("/settlements/run", post(wallet::run_settlements))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn(auth_middleware));

    caregiver.merge(admin)
}
