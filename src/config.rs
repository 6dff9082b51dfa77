// config.rs
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub payos_api_url: String,
    // Payment collection credentials
    pub payos_client_id: String,
    pub payos_api_key: String,
    pub payos_checksum_key: String,
    // Payout (disbursement) credentials - separate key set, never mixed
    // with the collection keys
    pub payos_payout_client_id: String,
    pub payos_payout_api_key: String,
    pub payos_payout_checksum_key: String,
    pub frontend_url: String,
    pub jwt_secret: String,
    pub database_url: String,
    pub port: u16,
    pub host: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv().ok();

        let payos_client_id = env::var("PAYOS_CLIENT_ID")
            .expect("PAYOS_CLIENT_ID must be set");
        let payos_api_key = env::var("PAYOS_API_KEY")
            .expect("PAYOS_API_KEY must be set");
        let payos_checksum_key = env::var("PAYOS_CHECKSUM_KEY")
            .expect("PAYOS_CHECKSUM_KEY must be set");

        // Payout keys fall back to the collection keys so sandbox setups
        // can run with a single credential pair.
        let payos_payout_client_id = env::var("PAYOS_PAYOUT_CLIENT_ID")
            .unwrap_or_else(|_| payos_client_id.clone());
        let payos_payout_api_key = env::var("PAYOS_PAYOUT_API_KEY")
            .unwrap_or_else(|_| payos_api_key.clone());
        let payos_payout_checksum_key = env::var("PAYOS_PAYOUT_CHECKSUM_KEY")
            .unwrap_or_else(|_| payos_checksum_key.clone());

        AppConfig {
            payos_api_url: env::var("PAYOS_API_URL")
                .unwrap_or_else(|_| "https://api-merchant.payos.vn".to_string()),
            payos_client_id,
            payos_api_key,
            payos_checksum_key,
            payos_payout_client_id,
            payos_payout_api_key,
            payos_payout_checksum_key,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a number"),
            host: env::var("HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
        }
    }

    pub fn payment_requests_url(&self) -> String {
        format!("{}/v2/payment-requests", self.payos_api_url)
    }

    pub fn payouts_url(&self) -> String {
        format!("{}/v2/payouts", self.payos_api_url)
    }

    pub fn payment_status_url(&self, order_code: &str) -> String {
        format!("{}/v2/payment-requests/{}", self.payos_api_url, order_code)
    }

    pub fn get_config_info(&self) -> serde_json::Value {
        serde_json::json!({
            "api_url": self.payos_api_url,
            "client_id_set": !self.payos_client_id.is_empty(),
            "checksum_key_set": !self.payos_checksum_key.is_empty(),
            "payout_client_id_set": !self.payos_payout_client_id.is_empty(),
            "payout_keys_distinct": self.payos_payout_checksum_key != self.payos_checksum_key,
            "frontend_url": self.frontend_url,
            "port": self.port,
            "host": self.host,
        })
    }
}
