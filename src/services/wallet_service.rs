// services/wallet_service.rs
//
// Ledger bookkeeping. Every balance mutation appends an immutable
// transaction entry and updates the cached totals in the same MongoDB
// update; guards are expressed as filter conditions so a miss means the
// operation did not happen at all.
use bson::{doc, oid::ObjectId, Bson};
use chrono::{Duration, Utc};
use futures_util::TryStreamExt;
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};
use tracing::info;

use crate::errors::{AppError, Result};
use crate::models::booking::{Booking, BookingStatus, PaymentStatus};
use crate::models::wallet::{
    PlatformLedger, TransactionKind, TransactionStatus, Wallet, WalletTransaction,
    PLATFORM_LEDGER_ID,
};

pub const PLATFORM_FEE_PERCENTAGE: i64 = 15;

/// Settlement window between payment and wallet credit.
const SETTLEMENT_HOLD_HOURS: i64 = 24;

pub fn platform_fee_for(gross: i64) -> i64 {
    (gross * PLATFORM_FEE_PERCENTAGE + 50) / 100
}

fn wallets(db: &Database) -> Collection<Wallet> {
    db.collection("wallets")
}

fn ledger(db: &Database) -> Collection<PlatformLedger> {
    db.collection("platform_ledger")
}

fn bookings(db: &Database) -> Collection<Booking> {
    db.collection("bookings")
}

/// Append one transaction to a caregiver wallet and update the cached
/// totals in the same write. Creates the wallet on the first earning
/// event. Fails with `InvalidAmount` when the write would drive
/// `available_balance` or `total_platform_fees` negative.
pub async fn record_transaction(
    db: &Database,
    caregiver: ObjectId,
    entry: WalletTransaction,
) -> Result<()> {
    let now = Utc::now();
    let entry_bson = bson::to_bson(&entry)?;

    let completed = entry.status == TransactionStatus::Completed;
    let (available_delta, earnings_delta, fees_delta) = match entry.kind {
        TransactionKind::Earning if completed => (entry.amount, entry.amount, 0),
        TransactionKind::PlatformFee if completed => (entry.amount, 0, -entry.amount),
        // Refunds are funded from the accumulated fee pool; the caregiver's
        // spendable balance is untouched.
        TransactionKind::Refund if completed => (0, 0, entry.amount),
        _ => (0, 0, 0),
    };

    let update = doc! {
        "$push": { "transactions": entry_bson },
        "$inc": {
            "available_balance": available_delta,
            "total_earnings": earnings_delta,
            "total_platform_fees": fees_delta,
        },
        "$set": { "last_updated": now, "updated_at": now },
        "$setOnInsert": { "pending_amount": 0_i64, "created_at": now },
    };

    let mut filter = doc! { "caregiver": caregiver };
    if available_delta < 0 {
        filter.insert("available_balance", doc! { "$gte": -available_delta });
    }
    if fees_delta < 0 {
        filter.insert("total_platform_fees", doc! { "$gte": -fees_delta });
    }

    // Only an earning may create the wallet; anything else against a
    // missing wallet is a hard error, not an implicit zero-balance doc.
    let upsert = entry.kind == TransactionKind::Earning;
    let result = wallets(db)
        .update_one(filter, update)
        .upsert(upsert)
        .await?;

    if result.matched_count == 0 && result.upserted_id.is_none() {
        return Err(AppError::InvalidAmount(format!(
            "{:?} of {} would overdraw the wallet",
            entry.kind, entry.amount
        )));
    }

    Ok(())
}

pub async fn find_wallet(db: &Database, caregiver: &ObjectId) -> Result<Option<Wallet>> {
    Ok(wallets(db).find_one(doc! { "caregiver": caregiver }).await?)
}

// ---- platform ledger (admin-available balance guard) ----

async fn ensure_platform_ledger(db: &Database) -> Result<()> {
    ledger(db)
        .update_one(
            doc! { "_id": PLATFORM_LEDGER_ID },
            doc! { "$setOnInsert": {
                "total_fees": 0_i64,
                "total_withdrawn": 0_i64,
                "reserved": 0_i64,
            }},
        )
        .upsert(true)
        .await?;
    Ok(())
}

pub async fn platform_ledger(db: &Database) -> Result<PlatformLedger> {
    Ok(ledger(db)
        .find_one(doc! { "_id": PLATFORM_LEDGER_ID })
        .await?
        .unwrap_or(PlatformLedger {
            id: PLATFORM_LEDGER_ID.to_string(),
            total_fees: 0,
            total_withdrawn: 0,
            reserved: 0,
        }))
}

pub async fn accrue_platform_fee(db: &Database, amount: i64) -> Result<()> {
    ensure_platform_ledger(db).await?;
    ledger(db)
        .update_one(
            doc! { "_id": PLATFORM_LEDGER_ID },
            doc! { "$inc": { "total_fees": amount } },
        )
        .await?;
    Ok(())
}

/// Atomically reserve `amount` against the admin-available balance.
/// The guard and the increment are one conditional update, so two
/// concurrent reservations for the last available amount cannot both
/// succeed. Returns the post-reservation ledger, or `None` when the
/// balance was insufficient.
pub async fn reserve_withdrawal_amount(
    db: &Database,
    amount: i64,
) -> Result<Option<PlatformLedger>> {
    ensure_platform_ledger(db).await?;
    let guarded = doc! {
        "_id": PLATFORM_LEDGER_ID,
        "$expr": { "$gte": [
            { "$subtract": [
                "$total_fees",
                { "$add": ["$total_withdrawn", "$reserved"] },
            ]},
            amount,
        ]},
    };
    Ok(ledger(db)
        .find_one_and_update(guarded, doc! { "$inc": { "reserved": amount } })
        .return_document(ReturnDocument::After)
        .await?)
}

/// Convert a reservation into a completed withdrawal.
pub async fn commit_withdrawal_amount(db: &Database, amount: i64) -> Result<()> {
    ledger(db)
        .update_one(
            doc! { "_id": PLATFORM_LEDGER_ID },
            doc! { "$inc": { "reserved": -amount, "total_withdrawn": amount } },
        )
        .await?;
    Ok(())
}

/// Release a reservation after a failed gateway leg.
pub async fn release_withdrawal_amount(db: &Database, amount: i64) -> Result<()> {
    ledger(db)
        .update_one(
            doc! { "_id": PLATFORM_LEDGER_ID },
            doc! { "$inc": { "reserved": -amount } },
        )
        .await?;
    Ok(())
}

/// Debit the fee pool for a dispute refund, guarded against overdraw the
/// same way reservations are.
pub async fn debit_platform_fees(db: &Database, amount: i64) -> Result<Option<PlatformLedger>> {
    ensure_platform_ledger(db).await?;
    let guarded = doc! {
        "_id": PLATFORM_LEDGER_ID,
        "$expr": { "$gte": [
            { "$subtract": [
                "$total_fees",
                { "$add": ["$total_withdrawn", "$reserved"] },
            ]},
            amount,
        ]},
    };
    Ok(ledger(db)
        .find_one_and_update(guarded, doc! { "$inc": { "total_fees": -amount } })
        .await?)
}

pub async fn credit_platform_fees(db: &Database, amount: i64) -> Result<()> {
    accrue_platform_fee(db, amount).await
}

/// Sum of `total_platform_fees` across all wallets. The platform ledger
/// is the authoritative guard; this scan backs the operational report.
pub async fn aggregate_platform_fees(db: &Database) -> Result<i64> {
    let totals = wallet_totals(db).await?;
    Ok(totals.total_platform_fees)
}

#[derive(Debug, Default)]
pub struct WalletTotals {
    pub wallet_count: i64,
    pub total_available_balance: i64,
    pub total_earnings: i64,
    pub total_platform_fees: i64,
    pub total_pending: i64,
}

pub async fn wallet_totals(db: &Database) -> Result<WalletTotals> {
    let pipeline = vec![doc! {
        "$group": {
            "_id": Bson::Null,
            "wallet_count": { "$sum": 1 },
            "total_available_balance": { "$sum": "$available_balance" },
            "total_earnings": { "$sum": "$total_earnings" },
            "total_platform_fees": { "$sum": "$total_platform_fees" },
            "total_pending": { "$sum": "$pending_amount" },
        }
    }];

    let mut cursor = db.collection::<bson::Document>("wallets").aggregate(pipeline).await?;
    let Some(row) = cursor.try_next().await? else {
        return Ok(WalletTotals::default());
    };

    let get = |key: &str| row.get_i64(key).unwrap_or_else(|_| i64::from(row.get_i32(key).unwrap_or(0)));
    Ok(WalletTotals {
        wallet_count: get("wallet_count"),
        total_available_balance: get("total_available_balance"),
        total_earnings: get("total_earnings"),
        total_platform_fees: get("total_platform_fees"),
        total_pending: get("total_pending"),
    })
}

// ---- booking settlement ----

/// Credit every completed, paid booking whose settlement hold has lapsed
/// and which has not been transferred yet. Request-triggered; there is no
/// background scheduler.
pub async fn settle_completed_bookings(db: &Database) -> Result<u64> {
    let cutoff = Utc::now() - Duration::hours(SETTLEMENT_HOLD_HOURS);

    let filter = doc! {
        "status": bson::to_bson(&BookingStatus::Completed)?,
        "payment.status": bson::to_bson(&PaymentStatus::Paid)?,
        "payment.transferred_to_caregiver": { "$ne": true },
    };
    let candidates: Vec<Booking> = bookings(db).find(filter).await?.try_collect().await?;

    let mut processed = 0_u64;
    for booking in candidates {
        let Some(paid_at) = booking.payment.paid_at else {
            continue;
        };
        if paid_at > cutoff {
            continue;
        }
        settle_booking(db, &booking).await?;
        processed += 1;
    }

    info!("Settled {} completed bookings", processed);
    Ok(processed)
}

async fn settle_booking(db: &Database, booking: &Booking) -> Result<()> {
    let booking_id = booking
        .id
        .ok_or_else(|| AppError::not_found("Booking"))?;
    let gross = booking.total_price;
    let fee = platform_fee_for(gross);
    let now = Utc::now();

    record_transaction(
        db,
        booking.caregiver,
        WalletTransaction {
            booking: Some(booking_id),
            kind: TransactionKind::Earning,
            amount: gross,
            description: Some(format!("Earnings from booking {}", booking_id.to_hex())),
            status: TransactionStatus::Completed,
            processed_at: Some(now),
            payos_order_code: None,
            payos_transaction_id: None,
            created_at: now,
        },
    )
    .await?;

    record_transaction(
        db,
        booking.caregiver,
        WalletTransaction {
            booking: Some(booking_id),
            kind: TransactionKind::PlatformFee,
            amount: -fee,
            description: Some(format!("Platform fee {}%", PLATFORM_FEE_PERCENTAGE)),
            status: TransactionStatus::Completed,
            processed_at: Some(now),
            payos_order_code: None,
            payos_transaction_id: None,
            created_at: now,
        },
    )
    .await?;

    // Release any hold recorded while the booking sat in its window.
    wallets(db)
        .update_one(
            doc! { "caregiver": booking.caregiver, "pending_amount": { "$gte": gross } },
            doc! { "$inc": { "pending_amount": -gross } },
        )
        .await?;

    accrue_platform_fee(db, fee).await?;

    bookings(db)
        .update_one(
            doc! { "_id": booking_id },
            doc! { "$set": {
                "payment.transferred_to_caregiver": true,
                "payment.transferred_at": now.to_rfc3339(),
            }},
        )
        .await?;

    info!(
        "Credited booking {}: {} gross, {} fee",
        booking_id.to_hex(),
        gross,
        fee
    );
    Ok(())
}

/// Record a dispute refund against the ledger: the platform fee pool is
/// debited first (guarded), then the caregiver wallet logs the refund and
/// gives back `amount` of its accumulated fees. A wallet-side miss rolls
/// the pool debit back.
pub async fn record_refund(
    db: &Database,
    caregiver: ObjectId,
    booking: ObjectId,
    amount: i64,
    order_code: &str,
    transaction_id: Option<&str>,
) -> Result<()> {
    if amount <= 0 {
        return Err(AppError::InvalidAmount("Refund amount must be positive".to_string()));
    }

    if debit_platform_fees(db, amount).await?.is_none() {
        let available = platform_ledger(db).await?.available();
        return Err(AppError::InsufficientBalance { available });
    }

    let now = Utc::now();
    let result = record_transaction(
        db,
        caregiver,
        WalletTransaction {
            booking: Some(booking),
            kind: TransactionKind::Refund,
            amount: -amount,
            description: Some(format!("Dispute refund for booking {}", booking.to_hex())),
            status: TransactionStatus::Completed,
            processed_at: Some(now),
            payos_order_code: Some(order_code.to_string()),
            payos_transaction_id: transaction_id.map(|s| s.to_string()),
            created_at: now,
        },
    )
    .await;

    if let Err(e) = result {
        credit_platform_fees(db, amount).await?;
        return Err(e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_fee_is_fifteen_percent_rounded() {
        assert_eq!(platform_fee_for(100_000), 15_000);
        assert_eq!(platform_fee_for(99_999), 15_000);
        assert_eq!(platform_fee_for(333), 50);
        assert_eq!(platform_fee_for(0), 0);
    }

    #[test]
    fn net_amount_never_exceeds_gross() {
        for gross in [1_i64, 999, 10_000, 123_456, 10_000_000] {
            let fee = platform_fee_for(gross);
            assert!(fee >= 0);
            assert!(fee <= gross);
        }
    }
}
