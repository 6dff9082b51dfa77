// models/bank_account.rs
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Single payout destination per admin. Upserted, never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminBankAccount {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub admin: ObjectId,
    pub bank_name: String,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
    pub is_default: bool,
    pub is_active: bool,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Copy of the destination embedded into a withdrawal at creation time.
/// Stays as-written even if the registry record changes later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccountSnapshot {
    pub bank_name: String,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

impl From<&AdminBankAccount> for BankAccountSnapshot {
    fn from(account: &AdminBankAccount) -> Self {
        BankAccountSnapshot {
            bank_name: account.bank_name.clone(),
            bank_code: account.bank_code.clone(),
            account_number: account.account_number.clone(),
            account_name: account.account_name.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertBankAccountRequest {
    #[validate(length(min = 1, message = "Bank name is required"))]
    pub bank_name: String,
    #[validate(length(min = 1, message = "Bank code is required"))]
    pub bank_code: String,
    #[validate(length(min = 1, message = "Account number is required"))]
    pub account_number: String,
    #[validate(length(min = 1, message = "Account holder name is required"))]
    pub account_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_request_rejects_empty_fields() {
        let req = UpsertBankAccountRequest {
            bank_name: "Vietcombank".to_string(),
            bank_code: "VCB".to_string(),
            account_number: String::new(),
            account_name: "CARELINK OPS".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn upsert_request_accepts_complete_details() {
        let req = UpsertBankAccountRequest {
            bank_name: "Vietcombank".to_string(),
            bank_code: "VCB".to_string(),
            account_number: "0011002233445".to_string(),
            account_name: "CARELINK OPS".to_string(),
        };
        assert!(req.validate().is_ok());
    }
}
