// handlers/wallet.rs
use axum::{
    extract::{Query, State},
    response::Json,
    Extension,
};
use bson::doc;
use futures::TryStreamExt;
use mongodb::Collection;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    errors::Result,
    models::user::Claims,
    models::wallet::{TransactionKind, Wallet, WalletSummary},
    services::wallet_service::{self, PLATFORM_FEE_PERCENTAGE},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub page: Option<u64>,
    pub limit: Option<usize>,
    pub kind: Option<TransactionKind>,
}

/// Caregiver wallet summary. Wallets come into existence on the first
/// earning event, so a caregiver without one gets a zeroed view rather
/// than an inserted document.
pub async fn get_my_wallet(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>> {
    let caregiver = claims.actor_id()?;
    let wallet = wallet_service::find_wallet(&state.db, &caregiver).await?;

    let summary = match wallet {
        Some(wallet) => WalletSummary {
            available_balance: wallet.available_balance,
            total_earnings: wallet.total_earnings,
            total_platform_fees: wallet.total_platform_fees,
            pending_amount: wallet.pending_amount,
            platform_fee_percentage: PLATFORM_FEE_PERCENTAGE,
            last_updated: Some(wallet.last_updated),
        },
        None => WalletSummary {
            available_balance: 0,
            total_earnings: 0,
            total_platform_fees: 0,
            pending_amount: 0,
            platform_fee_percentage: PLATFORM_FEE_PERCENTAGE,
            last_updated: None,
        },
    };

    Ok(Json(json!({ "success": true, "data": summary })))
}

/// Transaction history, newest first, with optional kind filter. The log
/// is embedded in the wallet document, so paging happens in memory.
pub async fn get_transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Value>> {
    let caregiver = claims.actor_id()?;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let Some(wallet) = wallet_service::find_wallet(&state.db, &caregiver).await? else {
        return Ok(Json(json!({
            "success": true,
            "data": {
                "transactions": [],
                "total_pages": 0,
                "current_page": 1,
                "total": 0,
                "platform_fee_percentage": PLATFORM_FEE_PERCENTAGE,
            }
        })));
    };

    let mut transactions = wallet.transactions;
    if let Some(kind) = query.kind {
        transactions.retain(|t| t.kind == kind);
    }
    transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let total = transactions.len();
    let total_pages = total.div_ceil(limit);
    let start = (page as usize - 1).saturating_mul(limit);
    let page_items: Vec<_> = transactions.into_iter().skip(start).take(limit).collect();

    Ok(Json(json!({
        "success": true,
        "data": {
            "transactions": page_items,
            "total_pages": total_pages,
            "current_page": page,
            "total": total,
            "platform_fee_percentage": PLATFORM_FEE_PERCENTAGE,
        }
    })))
}

/// Admin overview of every caregiver wallet plus fleet totals.
pub async fn get_wallet_overview(State(state): State<AppState>) -> Result<Json<Value>> {
    let collection: Collection<Wallet> = state.db.collection("wallets");
    let mut wallets: Vec<Wallet> = collection.find(doc! {}).await?.try_collect().await?;
    wallets.sort_by(|a, b| b.total_earnings.cmp(&a.total_earnings));

    let totals = wallet_service::wallet_totals(&state.db).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "stats": {
                "total_caregivers": totals.wallet_count,
                "total_available_balance": totals.total_available_balance,
                "total_earnings": totals.total_earnings,
                "total_platform_fees": totals.total_platform_fees,
                "total_pending_amount": totals.total_pending,
            },
            "wallets": wallets,
            "platform_fee_percentage": PLATFORM_FEE_PERCENTAGE,
        }
    })))
}

/// Credit every eligible completed booking. Request-triggered settlement;
/// there is no scheduler in this service.
pub async fn run_settlements(State(state): State<AppState>) -> Result<Json<Value>> {
    let processed = wallet_service::settle_completed_bookings(&state.db).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Processed {} bookings", processed),
        "data": { "processed": processed }
    })))
}
