// models/withdrawal.rs
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::bank_account::BankAccountSnapshot;

pub const MIN_WITHDRAWAL_AMOUNT: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl WithdrawalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Completed | WithdrawalStatus::Failed | WithdrawalStatus::Cancelled
        )
    }

    /// Transitions are one-directional; gateway reconciliation may settle a
    /// `Processing` record either way, nothing reopens a terminal one.
    pub fn can_transition_to(self, next: WithdrawalStatus) -> bool {
        use WithdrawalStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminWithdrawal {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub admin: ObjectId,
    pub amount: i64,
    pub bank_account: BankAccountSnapshot,
    pub status: WithdrawalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payos_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payos_order_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payos_response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: i64,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalHistoryQuery {
    pub page: Option<u64>,
    pub limit: Option<i64>,
    pub status: Option<WithdrawalStatus>,
}

/// Outcome returned to the caller whether or not the gateway leg succeeded.
#[derive(Debug, Serialize)]
pub struct WithdrawalOutcome {
    pub withdrawal_id: String,
    pub amount: i64,
    pub status: WithdrawalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payos_order_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    pub bank_account: BankAccountSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Read-only report of what the admin can withdraw.
#[derive(Debug, Serialize)]
pub struct AvailableBalanceReport {
    pub available_balance: i64,
    pub total_platform_fees: i64,
    pub total_withdrawn: i64,
    pub total_caregiver_balance: i64,
    pub total_pending: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_settles_either_way() {
        assert!(WithdrawalStatus::Processing.can_transition_to(WithdrawalStatus::Completed));
        assert!(WithdrawalStatus::Processing.can_transition_to(WithdrawalStatus::Failed));
    }

    #[test]
    fn terminal_statuses_never_reopen() {
        for terminal in [
            WithdrawalStatus::Completed,
            WithdrawalStatus::Failed,
            WithdrawalStatus::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                WithdrawalStatus::Pending,
                WithdrawalStatus::Processing,
                WithdrawalStatus::Completed,
                WithdrawalStatus::Failed,
                WithdrawalStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn completed_does_not_regress_to_failed() {
        assert!(!WithdrawalStatus::Completed.can_transition_to(WithdrawalStatus::Failed));
    }
}
