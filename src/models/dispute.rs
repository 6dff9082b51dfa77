// models/dispute.rs
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeType {
    ServiceQuality,
    PaymentIssue,
    NoShow,
    LateArrival,
    EarlyDeparture,
    UnprofessionalBehavior,
    SafetyConcern,
    BreachOfAgreement,
    Harassment,
    TheftOrDamage,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Priority is derived at creation and not recomputed afterwards.
    pub fn derived_priority(self) -> Priority {
        match self {
            Severity::Critical | Severity::High => Priority::High,
            Severity::Medium | Severity::Low => Priority::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestedResolution {
    Refund,
    PartialRefund,
    Compensation,
    Apology,
    AccountWarning,
    AccountSuspension,
    Other,
}

impl RequestedResolution {
    pub fn is_refund(self) -> bool {
        matches!(self, RequestedResolution::Refund | RequestedResolution::PartialRefund)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Image,
    Video,
    Document,
    Audio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub kind: EvidenceKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundBankInfo {
    pub account_name: String,
    pub account_number: String,
    pub bank_name: String,
    /// Gateway bank code (VCB, TCB, ...). Falls back to `bank_name` when
    /// the complainant did not supply one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_branch: Option<String>,
}

impl RefundBankInfo {
    pub fn is_complete(&self) -> bool {
        !self.account_name.trim().is_empty()
            && !self.account_number.trim().is_empty()
            && !self.bank_name.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondentResponse {
    pub message: String,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    FavorComplainant,
    FavorRespondent,
    PartialFavor,
    NoFault,
    MutualFault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    WarningIssued,
    AccountSuspended,
    RefundProcessed,
    CompensationPaid,
    NoAction,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminDecision {
    pub decision: DecisionKind,
    pub resolution: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compensation_amount: Option<i64>,
    #[serde(default)]
    pub actions: Vec<DecisionAction>,
    pub decided_by: ObjectId,
    pub decided_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Immutable audit record of one action on the dispute. The timeline is
/// append-only and never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub action: String,
    pub description: String,
    pub performed_by: ObjectId,
    pub performed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalNote {
    pub note: String,
    pub added_by: ObjectId,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatisfactionRating {
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub rated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Pending,
    UnderReview,
    AwaitingResponse,
    Investigating,
    Mediation,
    RefundApproved,
    RefundProcessing,
    RefundCompleted,
    Resolved,
    Rejected,
    Withdrawn,
    Escalated,
}

impl DisputeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DisputeStatus::Resolved
                | DisputeStatus::Rejected
                | DisputeStatus::Withdrawn
                | DisputeStatus::RefundCompleted
        )
    }

    /// States in which the respondent may still file a response.
    pub fn accepts_response(self) -> bool {
        matches!(
            self,
            DisputeStatus::Pending | DisputeStatus::UnderReview | DisputeStatus::AwaitingResponse
        )
    }

    /// States in which an admin may record a decision.
    pub fn accepts_decision(self) -> bool {
        matches!(
            self,
            DisputeStatus::UnderReview
                | DisputeStatus::Investigating
                | DisputeStatus::Mediation
                | DisputeStatus::Escalated
        )
    }

    /// Satisfaction ratings only make sense once the case is closed.
    pub fn accepts_rating(self) -> bool {
        matches!(
            self,
            DisputeStatus::Resolved | DisputeStatus::Rejected | DisputeStatus::RefundCompleted
        )
    }

    /// The closed transition graph. Every status change goes through here;
    /// anything not listed is an `InvalidState` error at the call site.
    pub fn can_transition_to(self, next: DisputeStatus) -> bool {
        use DisputeStatus::*;
        if self == next {
            return false;
        }
        match self {
            Pending => matches!(
                next,
                UnderReview | AwaitingResponse | Investigating | Withdrawn | Escalated
            ),
            UnderReview => matches!(
                next,
                AwaitingResponse
                    | Investigating
                    | Mediation
                    | RefundApproved
                    | Resolved
                    | Rejected
                    | Withdrawn
                    | Escalated
            ),
            AwaitingResponse => matches!(
                next,
                UnderReview | Investigating | Mediation | Withdrawn | Escalated
            ),
            Investigating => matches!(
                next,
                AwaitingResponse
                    | Mediation
                    | RefundApproved
                    | Resolved
                    | Rejected
                    | Withdrawn
                    | Escalated
            ),
            Mediation => matches!(
                next,
                RefundApproved | Resolved | Rejected | Withdrawn | Escalated
            ),
            Escalated => matches!(
                next,
                Investigating | Mediation | RefundApproved | Resolved | Rejected | Withdrawn
            ),
            RefundApproved => matches!(next, RefundProcessing),
            RefundProcessing => matches!(next, RefundCompleted),
            Resolved | Rejected | Withdrawn | RefundCompleted => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub complainant: ObjectId,
    pub respondent: ObjectId,
    pub booking: ObjectId,
    pub dispute_type: DisputeType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    pub requested_resolution: RequestedResolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_bank_info: Option<RefundBankInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respondent_response: Option<RespondentResponse>,
    pub status: DisputeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_decision: Option<AdminDecision>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub internal_notes: Vec<InternalNote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complainant_satisfaction: Option<SatisfactionRating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respondent_satisfaction: Option<SatisfactionRating>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Dispute {
    pub fn is_complainant(&self, user: &ObjectId) -> bool {
        self.complainant == *user
    }

    pub fn is_respondent(&self, user: &ObjectId) -> bool {
        self.respondent == *user
    }

    pub fn is_party(&self, user: &ObjectId) -> bool {
        self.is_complainant(user) || self.is_respondent(user)
    }

    pub fn satisfaction_for(&self, user: &ObjectId) -> Option<&SatisfactionRating> {
        if self.is_complainant(user) {
            self.complainant_satisfaction.as_ref()
        } else if self.is_respondent(user) {
            self.respondent_satisfaction.as_ref()
        } else {
            None
        }
    }
}

// ---- request / query DTOs ----

#[derive(Debug, Deserialize)]
pub struct EvidenceInput {
    pub kind: EvidenceKind,
    pub url: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDisputeRequest {
    pub booking_id: String,
    pub respondent_id: String,
    pub dispute_type: DisputeType,
    pub severity: Severity,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 3000, message = "Description must be 1-3000 characters"))]
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<EvidenceInput>,
    pub requested_resolution: RequestedResolution,
    pub requested_amount: Option<i64>,
    pub refund_bank_info: Option<RefundBankInfo>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub message: String,
    #[serde(default)]
    pub evidence: Vec<EvidenceInput>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawDisputeRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub admin_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: DecisionKind,
    pub resolution: String,
    pub refund_amount: Option<i64>,
    pub compensation_amount: Option<i64>,
    #[serde(default)]
    pub actions: Vec<DecisionAction>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DisputeStatus,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RateResolutionRequest {
    pub rating: u8,
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InternalNoteRequest {
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct DisputeListQuery {
    pub page: Option<u64>,
    pub limit: Option<i64>,
    pub status: Option<DisputeStatus>,
    pub dispute_type: Option<DisputeType>,
    pub priority: Option<Priority>,
    pub severity: Option<Severity>,
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_and_high_severity_derive_high_priority() {
        assert_eq!(Severity::Critical.derived_priority(), Priority::High);
        assert_eq!(Severity::High.derived_priority(), Priority::High);
        assert_eq!(Severity::Medium.derived_priority(), Priority::Medium);
        assert_eq!(Severity::Low.derived_priority(), Priority::Medium);
    }

    #[test]
    fn response_only_accepted_before_investigation() {
        assert!(DisputeStatus::Pending.accepts_response());
        assert!(DisputeStatus::UnderReview.accepts_response());
        assert!(DisputeStatus::AwaitingResponse.accepts_response());

        assert!(!DisputeStatus::Investigating.accepts_response());
        assert!(!DisputeStatus::Mediation.accepts_response());
        assert!(!DisputeStatus::Resolved.accepts_response());
        assert!(!DisputeStatus::Withdrawn.accepts_response());
    }

    #[test]
    fn terminal_states_admit_no_transitions() {
        use DisputeStatus::*;
        let all = [
            Pending,
            UnderReview,
            AwaitingResponse,
            Investigating,
            Mediation,
            RefundApproved,
            RefundProcessing,
            RefundCompleted,
            Resolved,
            Rejected,
            Withdrawn,
            Escalated,
        ];
        for terminal in [Resolved, Rejected, Withdrawn, RefundCompleted] {
            for next in all {
                assert!(
                    !terminal.can_transition_to(next),
                    "{:?} -> {:?} should be closed",
                    terminal,
                    next
                );
            }
        }
    }

    #[test]
    fn refund_pipeline_is_linear() {
        use DisputeStatus::*;
        assert!(RefundApproved.can_transition_to(RefundProcessing));
        assert!(RefundProcessing.can_transition_to(RefundCompleted));
        assert!(!RefundApproved.can_transition_to(RefundCompleted));
        assert!(!RefundProcessing.can_transition_to(Resolved));
        assert!(!RefundProcessing.can_transition_to(Rejected));
    }

    #[test]
    fn self_transitions_are_rejected() {
        assert!(!DisputeStatus::Pending.can_transition_to(DisputeStatus::Pending));
        assert!(!DisputeStatus::Mediation.can_transition_to(DisputeStatus::Mediation));
    }

    #[test]
    fn ratings_only_in_terminal_review_states() {
        assert!(DisputeStatus::Resolved.accepts_rating());
        assert!(DisputeStatus::Rejected.accepts_rating());
        assert!(DisputeStatus::RefundCompleted.accepts_rating());
        assert!(!DisputeStatus::Withdrawn.accepts_rating());
        assert!(!DisputeStatus::Mediation.accepts_rating());
    }

    #[test]
    fn refund_resolutions_are_flagged() {
        assert!(RequestedResolution::Refund.is_refund());
        assert!(RequestedResolution::PartialRefund.is_refund());
        assert!(!RequestedResolution::Apology.is_refund());
        assert!(!RequestedResolution::Compensation.is_refund());
    }

    #[test]
    fn refund_bank_info_requires_all_core_fields() {
        let complete = RefundBankInfo {
            account_name: "NGUYEN VAN A".to_string(),
            account_number: "0451000123456".to_string(),
            bank_name: "Vietcombank".to_string(),
            bank_code: Some("VCB".to_string()),
            bank_branch: None,
        };
        assert!(complete.is_complete());

        let missing = RefundBankInfo {
            account_number: String::new(),
            ..complete
        };
        assert!(!missing.is_complete());
    }
}
