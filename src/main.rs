use axum::extract::State;
use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

mod config;
mod database;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use database::connection::get_db_client;
use services::events::LogEventPublisher;
use services::payos_service::PayosService;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let db = get_db_client().await;
    let app_state = initialize_app_state(db).await;

    let app = build_router(app_state);
    start_server(app).await;
}

async fn initialize_app_state(db: mongodb::Database) -> AppState {
    let events = Arc::new(LogEventPublisher);
    let mut app_state = AppState::new(db, events);

    tracing::info!("Attempting to initialize PayOS service...");

    // A missing credential panics inside from_env; the settlement API
    // stays up with the gateway disabled rather than refusing to boot.
    let config_result = std::panic::catch_unwind(config::AppConfig::from_env);

    match config_result {
        Ok(config) => {
            tracing::info!("PayOS config loaded");
            tracing::info!("Gateway URL: {}", config.payos_api_url);

            let payos = Arc::new(PayosService::new(config));
            if payos.has_collection_credentials() {
                if !payos.has_payout_credentials() {
                    tracing::warn!("Payout credentials missing; withdrawals will fail");
                }
                app_state = app_state.with_payos(payos);
                tracing::info!("PayOS service initialized and ready");
            } else {
                tracing::warn!("PayOS credentials empty; gateway disabled");
            }
        }
        Err(_) => {
            tracing::error!("Failed to load PayOS config (panic caught)");
            tracing::warn!("PayOS service will be disabled");
        }
    }

    app_state
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .route("/debug/payos", get(debug_payos))
        .nest("/api/wallet", routes::wallet::routes())
        .nest("/api/admin-withdrawal", routes::admin_withdrawal::routes())
        .nest("/api/disputes", routes::disputes::routes())
        .nest("/api/payments", routes::payments::routes())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router) {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = SocketAddr::from(([0, 0, 0, 0], port.parse().unwrap_or(3000)));

    tracing::info!("Server starting on {}", addr);

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            axum::serve(listener, app).await.unwrap();
        }
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

async fn root_handler() -> &'static str {
    "CareLink settlement API"
}

// Debug endpoint to inspect gateway configuration without leaking keys
async fn debug_payos(State(state): State<AppState>) -> Json<Value> {
    match &state.payos {
        Some(payos) => Json(json!({
            "status": "PayOS configured",
            "config": payos.config_info(),
        })),
        None => Json(json!({
            "status": "PayOS not initialized",
        })),
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    use bson::doc;

    let db_status = match state.db.run_command(doc! {"ping": 1}).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "payos": state.payos.is_some(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
