// services/events.rs
//
// Counterparty notification hook. Handlers publish through the capability
// injected in `AppState` instead of reaching a process-global notifier; a
// transport-backed implementation can be swapped in without touching the
// handlers.
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::dispute::{DecisionKind, DisputeStatus};
use crate::models::withdrawal::WithdrawalStatus;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    DisputeOpened {
        dispute_id: String,
        respondent: String,
    },
    DisputeResponded {
        dispute_id: String,
        complainant: String,
    },
    DisputeStatusChanged {
        dispute_id: String,
        status: DisputeStatus,
    },
    DisputeDecided {
        dispute_id: String,
        decision: DecisionKind,
    },
    RefundIssued {
        dispute_id: String,
        amount: i64,
    },
    WithdrawalSettled {
        withdrawal_id: String,
        status: WithdrawalStatus,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: DomainEvent,
}

impl Event {
    pub fn new(payload: DomainEvent) -> Self {
        Event {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            payload,
        }
    }
}

pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: Event);
}

/// Default publisher: structured log only. Real-time delivery (socket,
/// push) plugs in behind the same trait.
pub struct LogEventPublisher;

impl EventPublisher for LogEventPublisher {
    fn publish(&self, event: Event) {
        match serde_json::to_string(&event.payload) {
            Ok(json) => tracing::info!(event_id = %event.id, "domain event: {}", json),
            Err(_) => tracing::info!(event_id = %event.id, "domain event: {:?}", event.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingPublisher {
        seen: Arc<Mutex<Vec<Event>>>,
    }

    impl EventPublisher for RecordingPublisher {
        fn publish(&self, event: Event) {
            self.seen.lock().unwrap().push(event);
        }
    }

    #[test]
    fn events_flow_through_injected_publisher() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let publisher: Arc<dyn EventPublisher> = Arc::new(RecordingPublisher { seen: seen.clone() });

        publisher.publish(Event::new(DomainEvent::RefundIssued {
            dispute_id: "d1".to_string(),
            amount: 250_000,
        }));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(
            seen[0].payload,
            DomainEvent::RefundIssued { amount: 250_000, .. }
        ));
    }

    #[test]
    fn event_payload_tags_serialize_snake_case() {
        let event = Event::new(DomainEvent::DisputeStatusChanged {
            dispute_id: "d2".to_string(),
            status: DisputeStatus::UnderReview,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "dispute_status_changed");
        assert_eq!(json["status"], "under_review");
    }
}
