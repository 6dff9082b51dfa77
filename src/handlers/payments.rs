// handlers/payments.rs
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    errors::{AppError, Result},
    models::user::Claims,
    services::payos_service::{PaymentOutcome, StatusOutcome},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: i64,
    pub description: Option<String>,
}

/// Create a PayOS collection link for a wallet deposit. The gateway leg
/// either yields a checkout URL or a captured failure; both are returned
/// to the caller.
pub async fn create_deposit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<Value>> {
    if request.amount <= 0 {
        return Err(AppError::InvalidAmount(
            "Deposit amount must be greater than 0".to_string(),
        ));
    }

    let payos = state.payos()?;
    let description = request
        .description
        .unwrap_or_else(|| format!("Wallet deposit {}", claims.sub));
    let return_url = format!("{}/wallet/deposit/success", payos.frontend_url());
    let cancel_url = format!("{}/wallet/deposit/cancel", payos.frontend_url());

    match payos
        .create_collection_payment(request.amount, &description, &return_url, &cancel_url)
        .await
    {
        PaymentOutcome::Created(link) => Ok(Json(json!({
            "success": true,
            "data": {
                "order_code": link.order_code,
                "transaction_id": link.transaction_id,
                "payment_url": link.payment_url,
                "qr_code": link.qr_code,
            }
        }))),
        PaymentOutcome::Failed { error, raw } => Ok(Json(json!({
            "success": false,
            "error": error,
            "payos_response": raw,
        }))),
    }
}

/// Poll the gateway for the state of a collection order.
pub async fn check_payment_status(
    State(state): State<AppState>,
    Path(order_code): Path<String>,
) -> Result<Json<Value>> {
    let payos = state.payos()?;

    match payos.check_status(&order_code).await {
        StatusOutcome::Known { status, raw } => Ok(Json(json!({
            "success": true,
            "data": { "order_code": order_code, "status": status, "payos_response": raw }
        }))),
        StatusOutcome::Failed { error } => Ok(Json(json!({
            "success": false,
            "error": error,
        }))),
    }
}

/// Inbound PayOS webhook. The payload is authenticated with the
/// collection checksum key before it is acknowledged; processing beyond
/// the acknowledgment is driven by status polls.
pub async fn payos_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let payos = state.payos()?;

    let signature = headers
        .get("x-signature")
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| body.get("signature").and_then(Value::as_str).map(String::from))
        .ok_or(AppError::Auth)?;

    let payload = body.get("data").unwrap_or(&body);

    if !payos.verify_signature(payload, &signature) {
        warn!("Rejected PayOS webhook with bad signature");
        return Err(AppError::Auth);
    }

    info!("Verified PayOS webhook for order: {:?}", payload.get("orderCode"));
    Ok(Json(json!({ "success": true })))
}
