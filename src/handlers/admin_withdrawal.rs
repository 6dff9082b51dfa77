// handlers/admin_withdrawal.rs
//
// Admin withdrawal pipeline: bank account registry, the withdrawal flow
// against the platform ledger, history and gateway reconciliation. The
// balance check and the reservation are one atomic ledger update, so two
// concurrent withdrawals can never both take the last available amount.
use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use bson::{doc, oid::ObjectId};
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::{Collection, Database};
use serde_json::{json, Value};
use tracing::{error, info};
use validator::Validate;

use crate::{
    errors::{AppError, Result},
    models::bank_account::{AdminBankAccount, BankAccountSnapshot, UpsertBankAccountRequest},
    models::user::Claims,
    models::withdrawal::{
        AdminWithdrawal, AvailableBalanceReport, WithdrawRequest, WithdrawalHistoryQuery,
        WithdrawalOutcome, WithdrawalStatus, MIN_WITHDRAWAL_AMOUNT,
    },
    services::events::{DomainEvent, Event},
    services::payos_service::{PayoutKind, PayoutOutcome, StatusOutcome},
    services::wallet_service,
    state::AppState,
};

fn bank_accounts(db: &Database) -> Collection<AdminBankAccount> {
    db.collection("admin_bank_accounts")
}

fn withdrawals(db: &Database) -> Collection<AdminWithdrawal> {
    db.collection("admin_withdrawals")
}

/// Create or replace the admin's single payout destination.
pub async fn upsert_bank_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<UpsertBankAccountRequest>,
) -> Result<Json<Value>> {
    request.validate()?;
    let admin = claims.actor_id()?;
    let now = Utc::now();

    bank_accounts(&state.db)
        .update_one(
            doc! { "admin": admin },
            doc! {
                "$set": {
                    "bank_name": &request.bank_name,
                    "bank_code": &request.bank_code,
                    "account_number": &request.account_number,
                    "account_name": &request.account_name,
                    "is_active": true,
                    "updated_at": now,
                },
                "$setOnInsert": { "is_default": true, "created_at": now },
            },
        )
        .upsert(true)
        .await?;

    let account = bank_accounts(&state.db)
        .find_one(doc! { "admin": admin })
        .await?
        .ok_or_else(|| AppError::not_found("Bank account"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Bank account saved",
        "data": account,
    })))
}

pub async fn get_bank_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>> {
    let admin = claims.actor_id()?;
    let account = bank_accounts(&state.db).find_one(doc! { "admin": admin }).await?;

    Ok(Json(json!({ "success": true, "data": account })))
}

async fn active_bank_account(db: &Database, admin: ObjectId) -> Result<AdminBankAccount> {
    bank_accounts(db)
        .find_one(doc! { "admin": admin, "is_active": true })
        .await?
        .ok_or_else(|| AppError::not_found("Active bank account"))
}

/// Withdraw aggregated platform fees to the admin's bank account.
///
/// Order matters: validate, reserve on the ledger (atomic), create the
/// withdrawal record, then talk to the gateway. A gateway failure releases
/// the reservation and leaves a `failed` record the admin can reattempt;
/// the ledger itself is untouched.
pub async fn withdraw_to_bank(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<WithdrawRequest>,
) -> Result<Json<Value>> {
    let admin = claims.actor_id()?;

    if request.amount < MIN_WITHDRAWAL_AMOUNT {
        return Err(AppError::validation(format!(
            "Minimum withdrawal amount is {} VND",
            MIN_WITHDRAWAL_AMOUNT
        )));
    }

    let bank_account = active_bank_account(&state.db, admin).await?;
    let snapshot = BankAccountSnapshot::from(&bank_account);

    if wallet_service::reserve_withdrawal_amount(&state.db, request.amount)
        .await?
        .is_none()
    {
        let available = wallet_service::platform_ledger(&state.db).await?.available();
        return Err(AppError::InsufficientBalance { available });
    }

    let now = Utc::now();
    let withdrawal_id = ObjectId::new();
    let withdrawal = AdminWithdrawal {
        id: Some(withdrawal_id),
        admin,
        amount: request.amount,
        bank_account: snapshot.clone(),
        status: WithdrawalStatus::Processing,
        payos_transaction_id: None,
        payos_order_code: None,
        payos_response: None,
        note: request.note.clone(),
        failure_reason: None,
        processed_at: Some(now),
        completed_at: None,
        created_at: now,
        updated_at: now,
    };
    withdrawals(&state.db).insert_one(&withdrawal).await?;

    let description = request
        .note
        .clone()
        .unwrap_or_else(|| format!("Admin withdrawal {}", withdrawal_id.to_hex()));

    let gateway_result = match state.payos() {
        Ok(payos) => {
            payos
                .create_payout(
                    request.amount,
                    &snapshot,
                    &withdrawal_id.to_hex(),
                    &description,
                    PayoutKind::AdminWithdrawal,
                )
                .await
        }
        Err(e) => PayoutOutcome::Failed {
            error: e.to_string(),
            raw: None,
        },
    };

    let outcome = match gateway_result {
        PayoutOutcome::Sent(receipt) => {
            let completed_at = Utc::now();
            withdrawals(&state.db)
                .update_one(
                    doc! { "_id": withdrawal_id },
                    doc! { "$set": {
                        "status": bson::to_bson(&WithdrawalStatus::Completed)?,
                        "payos_transaction_id": receipt.transaction_id.clone(),
                        "payos_order_code": &receipt.order_code,
                        "payos_response": bson::to_bson(&receipt.raw)?,
                        "completed_at": completed_at.to_rfc3339(),
                        "updated_at": completed_at,
                    }},
                )
                .await?;
            wallet_service::commit_withdrawal_amount(&state.db, request.amount).await?;

            info!(
                "Withdrawal {} completed: {} VND via {}",
                withdrawal_id.to_hex(),
                request.amount,
                receipt.order_code
            );
            state.events.publish(Event::new(DomainEvent::WithdrawalSettled {
                withdrawal_id: withdrawal_id.to_hex(),
                status: WithdrawalStatus::Completed,
            }));

            WithdrawalOutcome {
                withdrawal_id: withdrawal_id.to_hex(),
                amount: request.amount,
                status: WithdrawalStatus::Completed,
                payos_order_code: Some(receipt.order_code),
                payment_url: receipt.payment_url,
                bank_account: snapshot,
                completed_at: Some(completed_at),
                failure_reason: None,
            }
        }
        PayoutOutcome::Failed { error, raw } => {
            let now = Utc::now();
            withdrawals(&state.db)
                .update_one(
                    doc! { "_id": withdrawal_id },
                    doc! { "$set": {
                        "status": bson::to_bson(&WithdrawalStatus::Failed)?,
                        "failure_reason": &error,
                        "payos_response": bson::to_bson(&raw)?,
                        "updated_at": now,
                    }},
                )
                .await?;
            wallet_service::release_withdrawal_amount(&state.db, request.amount).await?;

            error!("Withdrawal {} failed: {}", withdrawal_id.to_hex(), error);
            state.events.publish(Event::new(DomainEvent::WithdrawalSettled {
                withdrawal_id: withdrawal_id.to_hex(),
                status: WithdrawalStatus::Failed,
            }));

            WithdrawalOutcome {
                withdrawal_id: withdrawal_id.to_hex(),
                amount: request.amount,
                status: WithdrawalStatus::Failed,
                payos_order_code: None,
                payment_url: None,
                bank_account: snapshot,
                completed_at: None,
                failure_reason: Some(error),
            }
        }
    };

    let success = outcome.status == WithdrawalStatus::Completed;
    Ok(Json(json!({
        "success": success,
        "message": if success { "Withdrawal completed".to_string() } else {
            format!("Withdrawal failed: {}", outcome.failure_reason.as_deref().unwrap_or("unknown"))
        },
        "data": outcome,
    })))
}

/// Withdrawal history for the requesting admin, newest first.
pub async fn get_withdrawal_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<WithdrawalHistoryQuery>,
) -> Result<Json<Value>> {
    let admin = claims.actor_id()?;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let mut filter = doc! { "admin": admin };
    if let Some(status) = query.status {
        filter.insert("status", bson::to_bson(&status)?);
    }

    let total = withdrawals(&state.db).count_documents(filter.clone()).await?;
    let items: Vec<AdminWithdrawal> = withdrawals(&state.db)
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .skip((page - 1) * limit as u64)
        .limit(limit)
        .await?
        .try_collect()
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "withdrawals": items,
            "total_pages": (total as f64 / limit as f64).ceil() as u64,
            "current_page": page,
            "total": total,
        }
    })))
}

/// Read-only report of what is currently withdrawable, alongside the
/// caregiver-side totals for operational visibility.
pub async fn get_available_balance(State(state): State<AppState>) -> Result<Json<Value>> {
    let ledger = wallet_service::platform_ledger(&state.db).await?;
    let totals = wallet_service::wallet_totals(&state.db).await?;
    // Fee total recomputed from the wallets themselves; a drift against
    // the ledger counter would show up right here.
    let total_platform_fees = wallet_service::aggregate_platform_fees(&state.db).await?;

    let report = AvailableBalanceReport {
        available_balance: ledger.available(),
        total_platform_fees,
        total_withdrawn: ledger.total_withdrawn,
        total_caregiver_balance: totals.total_available_balance,
        total_pending: totals.total_pending,
    };

    Ok(Json(json!({ "success": true, "data": report })))
}

/// Reconcile a withdrawal against the gateway's view. Terminal local
/// records are returned as-is; a still-processing record is promoted on
/// "PAID" and demoted on "CANCELLED".
pub async fn check_withdrawal_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(order_code): Path<String>,
) -> Result<Json<Value>> {
    let admin = claims.actor_id()?;

    let withdrawal = withdrawals(&state.db)
        .find_one(doc! { "payos_order_code": &order_code, "admin": admin })
        .await?
        .ok_or_else(|| AppError::not_found("Withdrawal"))?;
    let withdrawal_id = withdrawal.id.ok_or_else(|| AppError::not_found("Withdrawal"))?;

    let payos = state.payos()?;
    let status_result = payos.check_status(&order_code).await;

    // Terminal local records are never reopened; the poll result is
    // returned for information only.
    if let (false, StatusOutcome::Known { status, .. }) =
        (withdrawal.status.is_terminal(), &status_result)
    {
        let gateway_status = status.to_uppercase();

        if gateway_status == "PAID"
            && withdrawal.status.can_transition_to(WithdrawalStatus::Completed)
        {
            let now = Utc::now();
            withdrawals(&state.db)
                .update_one(
                    doc! { "_id": withdrawal_id },
                    doc! { "$set": {
                        "status": bson::to_bson(&WithdrawalStatus::Completed)?,
                        "completed_at": now.to_rfc3339(),
                        "updated_at": now,
                    }},
                )
                .await?;
            wallet_service::commit_withdrawal_amount(&state.db, withdrawal.amount).await?;
        } else if gateway_status == "CANCELLED"
            && withdrawal.status.can_transition_to(WithdrawalStatus::Failed)
        {
            let now = Utc::now();
            withdrawals(&state.db)
                .update_one(
                    doc! { "_id": withdrawal_id },
                    doc! { "$set": {
                        "status": bson::to_bson(&WithdrawalStatus::Failed)?,
                        "failure_reason": "Cancelled by user or expired",
                        "updated_at": now,
                    }},
                )
                .await?;
            wallet_service::release_withdrawal_amount(&state.db, withdrawal.amount).await?;
        }
    }

    let refreshed = withdrawals(&state.db)
        .find_one(doc! { "_id": withdrawal_id })
        .await?;

    let payos_status = match status_result {
        StatusOutcome::Known { status, raw } => json!({ "status": status, "raw": raw }),
        StatusOutcome::Failed { error } => json!({ "error": error }),
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "withdrawal": refreshed,
            "payos_status": payos_status,
        }
    })))
}
