use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingPayment {
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transferred_to_caregiver: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transferred_at: Option<DateTime<Utc>>,
}

/// Collaborator entity: supplies participant identities and the price the
/// settlement pipeline splits. The full booking CRUD lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub caregiver: ObjectId,
    pub careseeker: ObjectId,
    pub total_price: i64,
    pub status: BookingStatus,
    pub payment: BookingPayment,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// The counterparty of `user` on this booking, if `user` is a participant.
    pub fn other_participant(&self, user: &ObjectId) -> Option<ObjectId> {
        if self.caregiver == *user {
            Some(self.careseeker)
        } else if self.careseeker == *user {
            Some(self.caregiver)
        } else {
            None
        }
    }
}

/// Booking summary embedded in dispute responses.
#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    pub id: String,
    pub total_price: i64,
    pub status: BookingStatus,
}

impl From<&Booking> for BookingSummary {
    fn from(booking: &Booking) -> Self {
        BookingSummary {
            id: booking.id.map(|id| id.to_hex()).unwrap_or_default(),
            total_price: booking.total_price,
            status: booking.status,
        }
    }
}
