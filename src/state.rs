use std::sync::Arc;

use mongodb::Database;

use crate::services::events::EventPublisher;
use crate::services::payos_service::PayosService;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub payos: Option<Arc<PayosService>>,
    pub events: Arc<dyn EventPublisher>,
}

impl AppState {
    pub fn new(db: Database, events: Arc<dyn EventPublisher>) -> Self {
        AppState {
            db,
            payos: None,
            events,
        }
    }

    pub fn with_payos(mut self, payos: Arc<PayosService>) -> Self {
        self.payos = Some(payos);
        self
    }

    /// Gateway client, or a `Gateway` error when credentials were missing
    /// at startup and the service is disabled.
    pub fn payos(&self) -> crate::errors::Result<&Arc<PayosService>> {
        self.payos
            .as_ref()
            .ok_or_else(|| crate::errors::AppError::gateway("PayOS credentials not configured"))
    }
}
