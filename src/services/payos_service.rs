// services/payos_service.rs
//
// Stateless protocol layer over the PayOS merchant API. Two credential
// sets exist: one for inbound payment collection, one for outbound
// payouts. They sign with different checksum keys and must never be
// mixed. All outcomes cross this boundary as tagged results; nothing in
// here panics or returns Err to callers.
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{header, Client};
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::models::bank_account::BankAccountSnapshot;

type HmacSha256 = Hmac<Sha256>;

const MONEY_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutKind {
    AdminWithdrawal,
    CaregiverWithdrawal,
    DisputeRefund,
}

impl PayoutKind {
    /// Order-code prefix, kept distinct per payout kind for traceability
    /// in the gateway dashboard.
    pub fn order_prefix(self) -> &'static str {
        match self {
            PayoutKind::AdminWithdrawal => "ADMIN_WD",
            PayoutKind::CaregiverWithdrawal => "CG_WD",
            PayoutKind::DisputeRefund => "REFUND",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentLink {
    pub order_code: String,
    pub transaction_id: Option<String>,
    pub payment_url: Option<String>,
    pub qr_code: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Created(PaymentLink),
    Failed { error: String, raw: Option<Value> },
}

#[derive(Debug, Clone)]
pub struct PayoutReceipt {
    pub order_code: String,
    pub transaction_id: Option<String>,
    /// Raw gateway status. "processing" is a normal non-terminal state,
    /// not a failure.
    pub status: String,
    /// Confirmation URL, when the gateway asks for one.
    pub payment_url: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub enum PayoutOutcome {
    Sent(PayoutReceipt),
    Failed { error: String, raw: Option<Value> },
}

#[derive(Debug, Clone)]
pub enum StatusOutcome {
    Known { status: String, raw: Value },
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct PayosService {
    config: AppConfig,
    client: Client,
}

impl PayosService {
    pub fn new(config: AppConfig) -> Self {
        let client = Client::builder()
            .timeout(MONEY_CALL_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        PayosService { config, client }
    }

    pub fn frontend_url(&self) -> &str {
        &self.config.frontend_url
    }

    pub fn config_info(&self) -> Value {
        self.config.get_config_info()
    }

    pub fn has_collection_credentials(&self) -> bool {
        !self.config.payos_client_id.is_empty()
            && !self.config.payos_api_key.is_empty()
            && !self.config.payos_checksum_key.is_empty()
    }

    pub fn has_payout_credentials(&self) -> bool {
        !self.config.payos_payout_client_id.is_empty()
            && !self.config.payos_payout_api_key.is_empty()
            && !self.config.payos_payout_checksum_key.is_empty()
    }

    fn generate_order_code(prefix: &str) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();
        format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), suffix)
    }

    /// Top-level keys sorted, then serialized; the signature is computed
    /// over exactly these bytes. Key order of the input map must not
    /// matter.
    fn canonical_json(payload: &Value) -> String {
        match payload {
            Value::Object(map) => {
                let sorted: std::collections::BTreeMap<&String, &Value> = map.iter().collect();
                serde_json::to_string(&sorted).unwrap_or_default()
            }
            other => other.to_string(),
        }
    }

    fn hmac_sha256_hex(key: &str, data: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(data.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn sign(payload: &Value, checksum_key: &str) -> String {
        Self::hmac_sha256_hex(checksum_key, &Self::canonical_json(payload))
    }

    /// Authenticate an inbound webhook payload against the collection
    /// checksum key. Comparison is constant-time.
    pub fn verify_signature(&self, payload: &Value, provided_signature: &str) -> bool {
        let canonical = Self::canonical_json(payload);
        let mut mac = match HmacSha256::new_from_slice(self.config.payos_checksum_key.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(canonical.as_bytes());
        match hex::decode(provided_signature) {
            Ok(expected) => mac.verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }

    /// Create an inbound collection payment link (careseeker deposits,
    /// booking payments). Uses the collection credential set.
    pub async fn create_collection_payment(
        &self,
        amount: i64,
        description: &str,
        return_url: &str,
        cancel_url: &str,
    ) -> PaymentOutcome {
        if !self.has_collection_credentials() {
            return PaymentOutcome::Failed {
                error: "PayOS credentials not configured".to_string(),
                raw: None,
            };
        }

        let order_code = Self::generate_order_code("DEPOSIT");
        let payload = json!({
            "orderCode": order_code,
            "amount": amount,
            "description": description,
            "cancelUrl": cancel_url,
            "returnUrl": return_url,
        });
        let signature = Self::sign(&payload, &self.config.payos_checksum_key);

        let response = self
            .client
            .post(self.config.payment_requests_url())
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-client-id", &self.config.payos_client_id)
            .header("x-api-key", &self.config.payos_api_key)
            .header("x-signature", signature)
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                error!("PayOS payment request failed: {}", e);
                return PaymentOutcome::Failed {
                    error: e.to_string(),
                    raw: None,
                };
            }
        };

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            error!("PayOS payment request rejected: {} - {}", status, body);
            return PaymentOutcome::Failed {
                error: gateway_error_message(&body, status.as_u16()),
                raw: Some(body),
            };
        }

        info!("PayOS payment created for order: {}", order_code);
        PaymentOutcome::Created(PaymentLink {
            order_code,
            transaction_id: extract_string(&body, &["data", "id"])
                .or_else(|| extract_string(&body, &["paymentLinkId"])),
            payment_url: extract_string(&body, &["data", "checkoutUrl"])
                .or_else(|| extract_string(&body, &["checkoutUrl"])),
            qr_code: extract_string(&body, &["data", "qrCode"]),
            raw: body,
        })
    }

    /// Create an outbound disbursement. Uses the payout credential set and
    /// a kind-specific order-code prefix.
    pub async fn create_payout(
        &self,
        amount: i64,
        bank_account: &BankAccountSnapshot,
        correlation_id: &str,
        description: &str,
        kind: PayoutKind,
    ) -> PayoutOutcome {
        if !self.has_payout_credentials() {
            return PayoutOutcome::Failed {
                error: "PayOS Payout API credentials not configured".to_string(),
                raw: None,
            };
        }

        let order_code = Self::generate_order_code(kind.order_prefix());
        let description = if description.is_empty() {
            format!("{} {}", kind.order_prefix(), correlation_id)
        } else {
            description.to_string()
        };
        let payload = json!({
            "orderCode": order_code,
            "amount": amount,
            "description": description,
            "accountNumber": bank_account.account_number,
            "accountName": bank_account.account_name,
            "bankCode": bank_account.bank_code,
        });
        let signature = Self::sign(&payload, &self.config.payos_payout_checksum_key);

        let response = self
            .client
            .post(self.config.payouts_url())
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-client-id", &self.config.payos_payout_client_id)
            .header("x-api-key", &self.config.payos_payout_api_key)
            .header("x-signature", signature)
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                error!("PayOS payout request failed: {}", e);
                return PayoutOutcome::Failed {
                    error: e.to_string(),
                    raw: None,
                };
            }
        };

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            error!("PayOS payout rejected: {} - {}", status, body);
            return PayoutOutcome::Failed {
                error: gateway_error_message(&body, status.as_u16()),
                raw: Some(body),
            };
        }

        info!("PayOS payout initiated for order: {} amount: {}", order_code, amount);
        PayoutOutcome::Sent(PayoutReceipt {
            order_code,
            transaction_id: extract_string(&body, &["data", "id"])
                .or_else(|| extract_string(&body, &["payoutId"])),
            status: extract_string(&body, &["data", "status"])
                .unwrap_or_else(|| "processing".to_string()),
            payment_url: extract_string(&body, &["data", "checkoutUrl"]),
            raw: body,
        })
    }

    /// Poll the gateway for the current status of an order. GET requests
    /// carry the collection credentials and no signature.
    pub async fn check_status(&self, order_code: &str) -> StatusOutcome {
        if !self.has_collection_credentials() {
            return StatusOutcome::Failed {
                error: "PayOS credentials not configured".to_string(),
            };
        }

        let response = self
            .client
            .get(self.config.payment_status_url(order_code))
            .header("x-client-id", &self.config.payos_client_id)
            .header("x-api-key", &self.config.payos_api_key)
            .timeout(STATUS_CALL_TIMEOUT)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                error!("PayOS status check failed: {}", e);
                return StatusOutcome::Failed { error: e.to_string() };
            }
        };

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            return StatusOutcome::Failed {
                error: gateway_error_message(&body, status.as_u16()),
            };
        }

        StatusOutcome::Known {
            status: extract_string(&body, &["data", "status"]).unwrap_or_default(),
            raw: body,
        }
    }
}

fn extract_string(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str().map(|s| s.to_string())
}

fn gateway_error_message(body: &Value, status: u16) -> String {
    extract_string(body, &["message"])
        .or_else(|| extract_string(body, &["desc"]))
        .unwrap_or_else(|| format!("PayOS request failed with status {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            payos_api_url: "https://api-merchant.payos.vn".to_string(),
            payos_client_id: "client".to_string(),
            payos_api_key: "api-key".to_string(),
            payos_checksum_key: "collection-secret".to_string(),
            payos_payout_client_id: "payout-client".to_string(),
            payos_payout_api_key: "payout-api-key".to_string(),
            payos_payout_checksum_key: "payout-secret".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            jwt_secret: "jwt".to_string(),
            database_url: "mongodb://localhost".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }

    #[test]
    fn canonical_json_sorts_top_level_keys() {
        let payload = json!({
            "returnUrl": "https://x/ok",
            "amount": 50000,
            "orderCode": "DEPOSIT_1_ab12cd",
            "cancelUrl": "https://x/no",
            "description": "wallet deposit",
        });
        let canonical = PayosService::canonical_json(&payload);
        assert_eq!(
            canonical,
            r#"{"amount":50000,"cancelUrl":"https://x/no","description":"wallet deposit","orderCode":"DEPOSIT_1_ab12cd","returnUrl":"https://x/ok"}"#
        );
    }

    #[test]
    fn hmac_matches_rfc4231_test_vector() {
        // RFC 4231, test case 2.
        let digest = PayosService::hmac_sha256_hex("Jefe", "what do ya want for nothing?");
        assert_eq!(
            digest,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn signature_is_independent_of_key_insertion_order() {
        let a = json!({"amount": 1, "orderCode": "X"});
        let b = json!({"orderCode": "X", "amount": 1});
        assert_eq!(
            PayosService::sign(&a, "k"),
            PayosService::sign(&b, "k")
        );
    }

    #[test]
    fn verify_accepts_own_signature_and_rejects_tampering() {
        let service = PayosService::new(test_config());
        let payload = json!({"orderCode": "DEPOSIT_1_x", "amount": 75000, "status": "PAID"});
        let signature = PayosService::sign(&payload, "collection-secret");

        assert!(service.verify_signature(&payload, &signature));

        let tampered = json!({"orderCode": "DEPOSIT_1_x", "amount": 99000, "status": "PAID"});
        assert!(!service.verify_signature(&tampered, &signature));
        assert!(!service.verify_signature(&payload, "not-even-hex"));
    }

    #[test]
    fn signature_uses_the_named_key_only() {
        let service = PayosService::new(test_config());
        let payload = json!({"orderCode": "X", "amount": 1});
        // Signed with the payout key, verified against the collection key.
        let payout_signed = PayosService::sign(&payload, "payout-secret");
        assert!(!service.verify_signature(&payload, &payout_signed));
    }

    #[test]
    fn order_codes_carry_kind_prefix_and_random_suffix() {
        let code = PayosService::generate_order_code(PayoutKind::AdminWithdrawal.order_prefix());
        assert!(code.starts_with("ADMIN_WD_"));

        let suffix = code.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn payout_kinds_have_distinct_prefixes() {
        assert_eq!(PayoutKind::AdminWithdrawal.order_prefix(), "ADMIN_WD");
        assert_eq!(PayoutKind::CaregiverWithdrawal.order_prefix(), "CG_WD");
        assert_eq!(PayoutKind::DisputeRefund.order_prefix(), "REFUND");
    }

    #[test]
    fn gateway_error_prefers_body_message() {
        let body = json!({"message": "insufficient merchant balance"});
        assert_eq!(
            gateway_error_message(&body, 400),
            "insufficient merchant balance"
        );
        assert_eq!(
            gateway_error_message(&Value::Null, 502),
            "PayOS request failed with status 502"
        );
    }
}
