// models/wallet.rs
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Earning,
    PlatformFee,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// One immutable ledger entry. Amounts are signed by kind: earnings are
/// positive, platform fees and refunds negative. Never rewritten once
/// `status` is `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking: Option<ObjectId>,
    pub kind: TransactionKind,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payos_order_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payos_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-caregiver wallet. Created on the first earning event, never deleted.
/// Balance fields are caches over the completed transactions and are updated
/// in the same write that appends the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub caregiver: ObjectId,
    pub available_balance: i64,
    pub total_earnings: i64,
    pub total_platform_fees: i64,
    pub pending_amount: i64,
    #[serde(default)]
    pub transactions: Vec<WalletTransaction>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub last_updated: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Singleton aggregate guarding admin withdrawals. `total_fees` mirrors the
/// sum of `total_platform_fees` across wallets; `reserved` holds amounts of
/// withdrawals currently in flight. The reservation update is conditional on
/// `available() >= amount`, which closes the read-then-act race between
/// concurrent withdrawals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformLedger {
    #[serde(rename = "_id")]
    pub id: String,
    pub total_fees: i64,
    pub total_withdrawn: i64,
    pub reserved: i64,
}

pub const PLATFORM_LEDGER_ID: &str = "platform";

impl PlatformLedger {
    pub fn available(&self) -> i64 {
        self.total_fees - self.total_withdrawn - self.reserved
    }
}

#[derive(Debug, Serialize)]
pub struct WalletSummary {
    pub available_balance: i64,
    pub total_earnings: i64,
    pub total_platform_fees: i64,
    pub pending_amount: i64,
    pub platform_fee_percentage: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(total_fees: i64, total_withdrawn: i64, reserved: i64) -> PlatformLedger {
        PlatformLedger {
            id: PLATFORM_LEDGER_ID.to_string(),
            total_fees,
            total_withdrawn,
            reserved,
        }
    }

    #[test]
    fn available_is_fees_minus_withdrawn_when_nothing_in_flight() {
        assert_eq!(ledger(1_000_000, 500_000, 0).available(), 500_000);
    }

    #[test]
    fn in_flight_reservations_reduce_available() {
        let l = ledger(1_000_000, 200_000, 300_000);
        assert_eq!(l.available(), 500_000);
    }

    #[test]
    fn full_balance_cannot_be_reserved_twice() {
        let mut l = ledger(500_000, 0, 0);
        // First reservation passes the guard and takes effect.
        assert!(l.available() >= 500_000);
        l.reserved += 500_000;
        // The second request now fails the same guard.
        assert!(l.available() < 500_000);
    }

    #[test]
    fn committed_withdrawal_moves_reservation_into_withdrawn() {
        let mut l = ledger(1_000_000, 0, 0);
        l.reserved += 500_000;
        assert_eq!(l.available(), 500_000);

        l.reserved -= 500_000;
        l.total_withdrawn += 500_000;
        assert_eq!(l.available(), 500_000);
        assert_eq!(l.total_withdrawn, 500_000);
    }

    #[test]
    fn kinds_serialize_snake_case() {
        let json = serde_json::to_string(&TransactionKind::PlatformFee).unwrap();
        assert_eq!(json, "\"platform_fee\"");
        let back: TransactionKind = serde_json::from_str("\"earning\"").unwrap();
        assert_eq!(back, TransactionKind::Earning);
    }
}
