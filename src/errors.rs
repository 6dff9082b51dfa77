// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Authorization(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Insufficient balance: available {available} VND")]
    InsufficientBalance { available: i64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("PayOS error: {0}")]
    Gateway(String),

    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),

    #[error("Authentication error")]
    Auth,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MongoDB(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string()),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation failed".to_string()),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, "Unauthorized access".to_string()),
            AppError::InvalidState(_) => (StatusCode::CONFLICT, "Invalid state".to_string()),
            AppError::InsufficientBalance { .. } => (StatusCode::BAD_REQUEST, "Insufficient balance".to_string()),
            AppError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "Invalid amount".to_string()),
            AppError::Gateway(_) => (StatusCode::BAD_GATEWAY, "Payment gateway error".to_string()),
            AppError::InvalidObjectId(_) => (StatusCode::BAD_REQUEST, "Invalid ID format".to_string()),
            AppError::Auth => (StatusCode::UNAUTHORIZED, "Authentication failed".to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<bson::oid::Error> for AppError {
    fn from(err: bson::oid::Error) -> Self {
        AppError::InvalidObjectId(err.to_string())
    }
}

impl From<bson::ser::Error> for AppError {
    fn from(err: bson::ser::Error) -> Self {
        AppError::Validation(format!("BSON serialization error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

// Helper constructors
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Authorization(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        AppError::InvalidState(msg.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        AppError::Gateway(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
