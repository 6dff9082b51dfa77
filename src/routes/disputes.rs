use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::disputes;
use crate::middleware::auth::{auth_middleware, require_admin};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    let party = Router::new()
        .route("/", post(disputes::create_dispute))
        .route("/my", get(disputes::list_my_disputes))
        .route("/:id", get(disputes::get_dispute))
        .route("/:id/respond", post(disputes::respond_to_dispute))
        .route("/:id/withdraw", post(disputes::withdraw_dispute))
        .route("/:id/rate-resolution", post(disputes::rate_resolution))
        .layer(middleware::from_fn(auth_middleware));

    let admin = Router::new()
        .route("/admin/all", get(disputes::admin_list_disputes))
        .route("/:id/assign", put(disputes::assign_dispute))
        .route("/:id/status", put(disputes::update_dispute_status))
        .route("/:id/decide", post(disputes::decide_dispute))
        .route("/:id/internal-note", post(disputes::add_internal_note))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn(auth_middleware));

    party.merge(admin)
}
