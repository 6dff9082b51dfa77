// handlers/disputes.rs
//
// Dispute lifecycle: creation, respondent response, withdrawal by the
// complainant, admin triage and decision, refund execution, and the
// post-closure satisfaction ratings. Every mutation goes through the
// closed transition graph in `models::dispute` and appends one immutable
// timeline entry.
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use bson::{doc, oid::ObjectId, Document};
use chrono::{Duration, Utc};
use futures_util::TryStreamExt;
use mongodb::{Collection, Database};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::{error, info};
use validator::Validate;

use crate::{
    errors::{AppError, Result},
    models::booking::{Booking, BookingSummary},
    models::dispute::{
        AdminDecision, AssignRequest, CreateDisputeRequest, DecisionKind, DecisionRequest,
        Dispute, DisputeListQuery, DisputeStatus, Evidence, EvidenceInput, InternalNote,
        InternalNoteRequest, RateResolutionRequest, RespondRequest, RespondentResponse,
        SatisfactionRating, TimelineEntry, UpdateStatusRequest, WithdrawDisputeRequest,
    },
    models::user::{Claims, User, UserSummary},
    services::events::{DomainEvent, Event},
    services::payos_service::{PayoutKind, PayoutOutcome},
    services::wallet_service,
    state::AppState,
};

const DISPUTE_DEADLINE_DAYS: i64 = 7;

fn disputes(db: &Database) -> Collection<Dispute> {
    db.collection("disputes")
}

fn bookings(db: &Database) -> Collection<Booking> {
    db.collection("bookings")
}

fn users(db: &Database) -> Collection<User> {
    db.collection("users")
}

async fn load_dispute(db: &Database, id: &str) -> Result<(ObjectId, Dispute)> {
    let dispute_id = ObjectId::parse_str(id)?;
    let dispute = disputes(db)
        .find_one(doc! { "_id": dispute_id })
        .await?
        .ok_or_else(|| AppError::not_found("Dispute"))?;
    Ok((dispute_id, dispute))
}

fn timeline_entry(action: &str, description: String, actor: ObjectId) -> TimelineEntry {
    TimelineEntry {
        action: action.to_string(),
        description,
        performed_by: actor,
        performed_at: Utc::now(),
    }
}

fn evidence_from_inputs(inputs: Vec<EvidenceInput>) -> Vec<Evidence> {
    let now = Utc::now();
    inputs
        .into_iter()
        .map(|input| Evidence {
            kind: input.kind,
            url: input.url,
            description: input.description,
            uploaded_at: now,
        })
        .collect()
}

/// Serialize a dispute with participant and booking summaries attached.
/// Internal notes are stripped for non-admin readers.
async fn dispute_view(db: &Database, dispute: &Dispute, include_internal: bool) -> Result<Value> {
    let mut view = match serde_json::to_value(dispute) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    if !include_internal {
        view.remove("internal_notes");
    }

    let participant_ids = vec![dispute.complainant, dispute.respondent];
    let found: Vec<User> = users(db)
        .find(doc! { "_id": { "$in": participant_ids } })
        .await?
        .try_collect()
        .await?;
    for user in &found {
        let summary = serde_json::to_value(UserSummary::from(user)).unwrap_or(Value::Null);
        if user.id == Some(dispute.complainant) {
            view.insert("complainant_profile".to_string(), summary);
        } else if user.id == Some(dispute.respondent) {
            view.insert("respondent_profile".to_string(), summary);
        }
    }

    if let Some(booking) = bookings(db).find_one(doc! { "_id": dispute.booking }).await? {
        view.insert(
            "booking_summary".to_string(),
            serde_json::to_value(BookingSummary::from(&booking)).unwrap_or(Value::Null),
        );
    }

    Ok(Value::Object(view))
}

/// Apply a validated status change plus its timeline entry in one update.
async fn transition(
    db: &Database,
    dispute_id: ObjectId,
    dispute: &Dispute,
    next: DisputeStatus,
    entry: TimelineEntry,
    extra_set: Document,
) -> Result<()> {
    if !dispute.status.can_transition_to(next) {
        return Err(AppError::invalid_state(format!(
            "Cannot move dispute from {:?} to {:?}",
            dispute.status, next
        )));
    }

    let now = Utc::now();
    let mut set = doc! {
        "status": bson::to_bson(&next)?,
        "updated_at": now,
    };
    if next.is_terminal() && dispute.closed_at.is_none() {
        set.insert("closed_at", now.to_rfc3339());
    }
    for (key, value) in extra_set {
        set.insert(key, value);
    }

    disputes(db)
        .update_one(
            doc! { "_id": dispute_id },
            doc! {
                "$set": set,
                "$push": { "timeline": bson::to_bson(&entry)? },
            },
        )
        .await?;
    Ok(())
}

/// File a dispute against the other participant of a booking.
pub async fn create_dispute(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateDisputeRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    request.validate()?;
    let actor = claims.actor_id()?;

    let booking_id = ObjectId::parse_str(&request.booking_id)?;
    let respondent_id = ObjectId::parse_str(&request.respondent_id)?;

    let booking = bookings(&state.db)
        .find_one(doc! { "_id": booking_id })
        .await?
        .ok_or_else(|| AppError::not_found("Booking"))?;

    let Some(counterparty) = booking.other_participant(&actor) else {
        return Err(AppError::forbidden(
            "Only booking participants may open a dispute",
        ));
    };
    if respondent_id != counterparty {
        return Err(AppError::validation(
            "Respondent must be the other participant of the booking",
        ));
    }

    // A careseeker asking for money back must say where to send it.
    let complainant_is_careseeker = booking.careseeker == actor;
    if request.requested_resolution.is_refund() && complainant_is_careseeker {
        let complete = request
            .refund_bank_info
            .as_ref()
            .map(|info| info.is_complete())
            .unwrap_or(false);
        if !complete {
            return Err(AppError::validation(
                "Refund requests require account name, account number and bank name",
            ));
        }
    }

    let now = Utc::now();
    let dispute_id = ObjectId::new();
    let dispute = Dispute {
        id: Some(dispute_id),
        complainant: actor,
        respondent: respondent_id,
        booking: booking_id,
        dispute_type: request.dispute_type,
        severity: request.severity,
        title: request.title,
        description: request.description,
        evidence: evidence_from_inputs(request.evidence),
        requested_resolution: request.requested_resolution,
        requested_amount: request.requested_amount,
        refund_bank_info: request.refund_bank_info,
        respondent_response: None,
        status: DisputeStatus::Pending,
        assigned_to: None,
        admin_decision: None,
        timeline: vec![timeline_entry(
            "dispute_created",
            "Dispute filed".to_string(),
            actor,
        )],
        internal_notes: Vec::new(),
        complainant_satisfaction: None,
        respondent_satisfaction: None,
        priority: request.severity.derived_priority(),
        deadline: Some(now + Duration::days(DISPUTE_DEADLINE_DAYS)),
        closed_at: None,
        created_at: now,
        updated_at: now,
    };

    disputes(&state.db).insert_one(&dispute).await?;

    info!("Dispute {} created against {}", dispute_id.to_hex(), respondent_id.to_hex());
    state.events.publish(Event::new(DomainEvent::DisputeOpened {
        dispute_id: dispute_id.to_hex(),
        respondent: respondent_id.to_hex(),
    }));

    let view = dispute_view(&state.db, &dispute, claims.is_admin()).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Dispute submitted. We will review it within 24-48 hours.",
            "data": view,
        })),
    ))
}

pub async fn get_dispute(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let (_, dispute) = load_dispute(&state.db, &id).await?;
    let actor = claims.actor_id()?;

    if !claims.is_admin() && !dispute.is_party(&actor) {
        return Err(AppError::forbidden("Not a party to this dispute"));
    }

    let view = dispute_view(&state.db, &dispute, claims.is_admin()).await?;
    Ok(Json(json!({ "success": true, "data": view })))
}

/// Disputes the actor is a party to, newest first.
pub async fn list_my_disputes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<DisputeListQuery>,
) -> Result<Json<Value>> {
    let actor = claims.actor_id()?;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let mut filter = doc! { "$or": [
        { "complainant": actor },
        { "respondent": actor },
    ]};
    if let Some(status) = query.status {
        filter.insert("status", bson::to_bson(&status)?);
    }

    let total = disputes(&state.db).count_documents(filter.clone()).await?;
    let mut items: Vec<Value> = Vec::new();
    let found: Vec<Dispute> = disputes(&state.db)
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .skip((page - 1) * limit as u64)
        .limit(limit)
        .await?
        .try_collect()
        .await?;
    for dispute in &found {
        items.push(dispute_view(&state.db, dispute, false).await?);
    }

    Ok(Json(json!({
        "success": true,
        "data": {
            "disputes": items,
            "total_pages": (total as f64 / limit as f64).ceil() as u64,
            "current_page": page,
            "total": total,
        }
    })))
}

/// The respondent answers the complaint. Moves the case to review and
/// folds any new evidence into the shared evidence log.
pub async fn respond_to_dispute(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<RespondRequest>,
) -> Result<Json<Value>> {
    let (dispute_id, dispute) = load_dispute(&state.db, &id).await?;
    let actor = claims.actor_id()?;

    if !dispute.is_respondent(&actor) {
        return Err(AppError::forbidden("Only the respondent may respond"));
    }
    if !dispute.status.accepts_response() {
        return Err(AppError::invalid_state(format!(
            "Dispute in {:?} no longer accepts a response",
            dispute.status
        )));
    }
    if request.message.trim().is_empty() {
        return Err(AppError::validation("Response message is required"));
    }

    let evidence = evidence_from_inputs(request.evidence);
    let response = RespondentResponse {
        message: request.message,
        evidence: evidence.clone(),
        responded_at: Utc::now(),
    };

    let now = Utc::now();
    let mut push = doc! {
        "timeline": bson::to_bson(&timeline_entry(
            "respondent_responded",
            "Respondent replied to the complaint".to_string(),
            actor,
        ))?,
    };
    if !evidence.is_empty() {
        push.insert("evidence", doc! { "$each": bson::to_bson(&evidence)? });
    }

    disputes(&state.db)
        .update_one(
            doc! { "_id": dispute_id },
            doc! {
                "$set": {
                    "respondent_response": bson::to_bson(&response)?,
                    "status": bson::to_bson(&DisputeStatus::UnderReview)?,
                    "updated_at": now,
                },
                "$push": push,
            },
        )
        .await?;

    state.events.publish(Event::new(DomainEvent::DisputeResponded {
        dispute_id: dispute_id.to_hex(),
        complainant: dispute.complainant.to_hex(),
    }));

    let (_, refreshed) = load_dispute(&state.db, &id).await?;
    let view = dispute_view(&state.db, &refreshed, false).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Response submitted",
        "data": view,
    })))
}

/// The complainant retracts the case. Closed cases stay closed.
pub async fn withdraw_dispute(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<WithdrawDisputeRequest>,
) -> Result<Json<Value>> {
    let (dispute_id, dispute) = load_dispute(&state.db, &id).await?;
    let actor = claims.actor_id()?;

    if !dispute.is_complainant(&actor) {
        return Err(AppError::forbidden("Only the complainant may withdraw a dispute"));
    }

    let description = request
        .reason
        .unwrap_or_else(|| "Complainant withdrew the dispute".to_string());
    transition(
        &state.db,
        dispute_id,
        &dispute,
        DisputeStatus::Withdrawn,
        timeline_entry("dispute_withdrawn", description, actor),
        doc! {},
    )
    .await?;

    state.events.publish(Event::new(DomainEvent::DisputeStatusChanged {
        dispute_id: dispute_id.to_hex(),
        status: DisputeStatus::Withdrawn,
    }));

    Ok(Json(json!({ "success": true, "message": "Dispute withdrawn" })))
}

/// Either party rates how the dispute was handled, once, after closure.
pub async fn rate_resolution(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<RateResolutionRequest>,
) -> Result<Json<Value>> {
    let (dispute_id, dispute) = load_dispute(&state.db, &id).await?;
    let actor = claims.actor_id()?;

    if !dispute.is_party(&actor) {
        return Err(AppError::forbidden("Not a party to this dispute"));
    }
    if !dispute.status.accepts_rating() {
        return Err(AppError::invalid_state(
            "Resolutions can only be rated after the dispute is closed",
        ));
    }
    if !(1..=5).contains(&request.rating) {
        return Err(AppError::validation("Rating must be between 1 and 5"));
    }
    if dispute.satisfaction_for(&actor).is_some() {
        return Err(AppError::invalid_state("Resolution already rated"));
    }

    let rating = SatisfactionRating {
        rating: request.rating,
        feedback: request.feedback,
        rated_at: Utc::now(),
    };
    let field = if dispute.is_complainant(&actor) {
        "complainant_satisfaction"
    } else {
        "respondent_satisfaction"
    };

    let mut set = doc! { "updated_at": Utc::now() };
    set.insert(field, bson::to_bson(&rating)?);

    disputes(&state.db)
        .update_one(
            doc! { "_id": dispute_id },
            doc! {
                "$set": set,
                "$push": { "timeline": bson::to_bson(&timeline_entry(
                    "resolution_rated",
                    format!("Resolution rated {}/5", request.rating),
                    actor,
                ))?},
            },
        )
        .await?;

    Ok(Json(json!({ "success": true, "message": "Thank you for the feedback" })))
}

// ========== admin endpoints ==========

/// Admin listing with filters, text search and distribution statistics.
pub async fn admin_list_disputes(
    State(state): State<AppState>,
    Query(query): Query<DisputeListQuery>,
) -> Result<Json<Value>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let mut filter = doc! {};
    if let Some(status) = query.status {
        filter.insert("status", bson::to_bson(&status)?);
    }
    if let Some(dispute_type) = query.dispute_type {
        filter.insert("dispute_type", bson::to_bson(&dispute_type)?);
    }
    if let Some(priority) = query.priority {
        filter.insert("priority", bson::to_bson(&priority)?);
    }
    if let Some(severity) = query.severity {
        filter.insert("severity", bson::to_bson(&severity)?);
    }
    if let Some(search) = &query.search {
        filter.insert(
            "$or",
            vec![
                doc! { "title": { "$regex": search, "$options": "i" } },
                doc! { "description": { "$regex": search, "$options": "i" } },
            ],
        );
    }

    let total = disputes(&state.db).count_documents(filter.clone()).await?;
    let found: Vec<Dispute> = disputes(&state.db)
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .skip((page - 1) * limit as u64)
        .limit(limit)
        .await?
        .try_collect()
        .await?;

    let mut items: Vec<Value> = Vec::new();
    for dispute in &found {
        items.push(dispute_view(&state.db, dispute, true).await?);
    }

    // Corpus-wide distributions for the triage dashboard.
    let mut by_status: HashMap<String, u64> = HashMap::new();
    let mut by_type: HashMap<String, u64> = HashMap::new();
    let mut by_priority: HashMap<String, u64> = HashMap::new();
    let mut by_severity: HashMap<String, u64> = HashMap::new();
    let mut stats_cursor = disputes(&state.db)
        .clone_with_type::<Document>()
        .find(doc! {})
        .projection(doc! { "status": 1, "dispute_type": 1, "priority": 1, "severity": 1 })
        .await?;
    let mut corpus_total = 0_u64;
    while let Some(row) = stats_cursor.try_next().await? {
        corpus_total += 1;
        for (key, bucket) in [
            ("status", &mut by_status),
            ("dispute_type", &mut by_type),
            ("priority", &mut by_priority),
            ("severity", &mut by_severity),
        ] {
            if let Ok(value) = row.get_str(key) {
                *bucket.entry(value.to_string()).or_insert(0) += 1;
            }
        }
    }

    Ok(Json(json!({
        "success": true,
        "data": {
            "disputes": items,
            "statistics": {
                "total": corpus_total,
                "by_status": by_status,
                "by_type": by_type,
                "by_priority": by_priority,
                "by_severity": by_severity,
            },
            "pagination": {
                "current_page": page,
                "total_pages": (total as f64 / limit as f64).ceil() as u64,
                "total": total,
            }
        }
    })))
}

/// Assign the case to an admin and open the investigation.
pub async fn assign_dispute(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<Value>> {
    let (dispute_id, dispute) = load_dispute(&state.db, &id).await?;
    let actor = claims.actor_id()?;
    let assignee = match request.admin_id {
        Some(admin_id) => ObjectId::parse_str(&admin_id)?,
        None => actor,
    };

    transition(
        &state.db,
        dispute_id,
        &dispute,
        DisputeStatus::Investigating,
        timeline_entry(
            "dispute_assigned",
            "Dispute assigned to an admin".to_string(),
            actor,
        ),
        doc! { "assigned_to": assignee },
    )
    .await?;

    state.events.publish(Event::new(DomainEvent::DisputeStatusChanged {
        dispute_id: dispute_id.to_hex(),
        status: DisputeStatus::Investigating,
    }));

    Ok(Json(json!({ "success": true, "message": "Dispute assigned" })))
}

/// Move the case along the triage pipeline.
pub async fn update_dispute_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>> {
    let (dispute_id, dispute) = load_dispute(&state.db, &id).await?;
    let actor = claims.actor_id()?;

    let description = request.note.unwrap_or_else(|| {
        format!(
            "Status changed from {:?} to {:?}",
            dispute.status, request.status
        )
    });
    transition(
        &state.db,
        dispute_id,
        &dispute,
        request.status,
        timeline_entry("status_updated", description, actor),
        doc! {},
    )
    .await?;

    state.events.publish(Event::new(DomainEvent::DisputeStatusChanged {
        dispute_id: dispute_id.to_hex(),
        status: request.status,
    }));

    Ok(Json(json!({ "success": true, "message": "Status updated" })))
}

/// Record the admin decision. A refund-granting decision drives the
/// refund pipeline: approve, mark processing, disburse via the gateway,
/// and on success debit the fee pool and close the case.
pub async fn decide_dispute(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Value>> {
    let (dispute_id, dispute) = load_dispute(&state.db, &id).await?;
    let actor = claims.actor_id()?;

    if !dispute.status.accepts_decision() {
        return Err(AppError::invalid_state(format!(
            "Dispute in {:?} cannot be decided",
            dispute.status
        )));
    }
    if let Some(refund) = request.refund_amount {
        if refund < 0 {
            return Err(AppError::InvalidAmount("Refund amount cannot be negative".to_string()));
        }
    }

    let decision = AdminDecision {
        decision: request.decision,
        resolution: request.resolution,
        refund_amount: request.refund_amount,
        compensation_amount: request.compensation_amount,
        actions: request.actions,
        decided_by: actor,
        decided_at: Utc::now(),
        notes: request.notes,
    };

    let grants_refund = matches!(
        request.decision,
        DecisionKind::FavorComplainant | DecisionKind::PartialFavor
    ) && request.refund_amount.unwrap_or(0) > 0;

    if !grants_refund {
        // FavorRespondent closes the case as rejected; everything else
        // resolves it.
        let next = match request.decision {
            DecisionKind::FavorRespondent => DisputeStatus::Rejected,
            _ => DisputeStatus::Resolved,
        };
        transition(
            &state.db,
            dispute_id,
            &dispute,
            next,
            timeline_entry(
                "decision_made",
                format!("Admin decision: {:?}", request.decision),
                actor,
            ),
            doc! { "admin_decision": bson::to_bson(&decision)? },
        )
        .await?;

        state.events.publish(Event::new(DomainEvent::DisputeDecided {
            dispute_id: dispute_id.to_hex(),
            decision: request.decision,
        }));
        let (_, refreshed) = load_dispute(&state.db, &id).await?;
        let view = dispute_view(&state.db, &refreshed, true).await?;
        return Ok(Json(json!({ "success": true, "message": "Decision recorded", "data": view })));
    }

    let refund_amount = request.refund_amount.unwrap_or(0);
    let bank_info = dispute
        .refund_bank_info
        .clone()
        .filter(|info| info.is_complete())
        .ok_or_else(|| {
            AppError::validation("Dispute has no refund bank details on file")
        })?;

    // Resolve the gateway and make sure the fee pool can cover the
    // refund before any state moves or money moves.
    let payos = state.payos()?;
    let ledger = wallet_service::platform_ledger(&state.db).await?;
    if ledger.available() < refund_amount {
        return Err(AppError::InsufficientBalance {
            available: ledger.available(),
        });
    }

    let booking = bookings(&state.db)
        .find_one(doc! { "_id": dispute.booking })
        .await?
        .ok_or_else(|| AppError::not_found("Booking"))?;

    transition(
        &state.db,
        dispute_id,
        &dispute,
        DisputeStatus::RefundApproved,
        timeline_entry(
            "decision_made",
            format!("Admin decision: {:?}, refund {} VND", request.decision, refund_amount),
            actor,
        ),
        doc! { "admin_decision": bson::to_bson(&decision)? },
    )
    .await?;

    let (_, approved) = load_dispute(&state.db, &id).await?;
    transition(
        &state.db,
        dispute_id,
        &approved,
        DisputeStatus::RefundProcessing,
        timeline_entry("refund_processing", "Refund sent to the gateway".to_string(), actor),
        doc! {},
    )
    .await?;

    state.events.publish(Event::new(DomainEvent::DisputeDecided {
        dispute_id: dispute_id.to_hex(),
        decision: request.decision,
    }));

    let destination = crate::models::bank_account::BankAccountSnapshot {
        bank_name: bank_info.bank_name.clone(),
        bank_code: bank_info
            .bank_code
            .clone()
            .unwrap_or_else(|| bank_info.bank_name.clone()),
        account_number: bank_info.account_number.clone(),
        account_name: bank_info.account_name.clone(),
    };

    let payout = payos
        .create_payout(
            refund_amount,
            &destination,
            &dispute_id.to_hex(),
            &format!("Dispute refund {}", dispute_id.to_hex()),
            PayoutKind::DisputeRefund,
        )
        .await;

    match payout {
        PayoutOutcome::Sent(receipt) => {
            if let Err(e) = wallet_service::record_refund(
                &state.db,
                booking.caregiver,
                dispute.booking,
                refund_amount,
                &receipt.order_code,
                receipt.transaction_id.as_deref(),
            )
            .await
            {
                // The disbursement already happened; flag the ledger gap
                // for manual review instead of failing the request.
                error!(
                    "Refund ledger write failed for dispute {}: {}",
                    dispute_id.to_hex(),
                    e
                );
                disputes(&state.db)
                    .update_one(
                        doc! { "_id": dispute_id },
                        doc! { "$push": { "timeline": bson::to_bson(&timeline_entry(
                            "refund_ledger_discrepancy",
                            format!("Payout {} sent but ledger update failed", receipt.order_code),
                            actor,
                        ))?}},
                    )
                    .await?;
            }

            let (_, processing) = load_dispute(&state.db, &id).await?;
            transition(
                &state.db,
                dispute_id,
                &processing,
                DisputeStatus::RefundCompleted,
                timeline_entry(
                    "refund_completed",
                    format!("Refund of {} VND disbursed ({})", refund_amount, receipt.order_code),
                    actor,
                ),
                doc! {},
            )
            .await?;

            state.events.publish(Event::new(DomainEvent::RefundIssued {
                dispute_id: dispute_id.to_hex(),
                amount: refund_amount,
            }));

            let (_, refreshed) = load_dispute(&state.db, &id).await?;
            let view = dispute_view(&state.db, &refreshed, true).await?;
            Ok(Json(json!({
                "success": true,
                "message": "Decision recorded and refund disbursed",
                "data": view,
            })))
        }
        PayoutOutcome::Failed { error: reason, .. } => {
            // The case stays in refund_processing; the ledger was never
            // touched. The admin re-issues by checking and re-deciding.
            disputes(&state.db)
                .update_one(
                    doc! { "_id": dispute_id },
                    doc! { "$push": { "timeline": bson::to_bson(&timeline_entry(
                        "refund_failed",
                        format!("Gateway refused the refund: {}", reason),
                        actor,
                    ))?}},
                )
                .await?;

            let (_, refreshed) = load_dispute(&state.db, &id).await?;
            let view = dispute_view(&state.db, &refreshed, true).await?;
            Ok(Json(json!({
                "success": false,
                "message": format!("Decision recorded but the refund failed: {}", reason),
                "data": view,
            })))
        }
    }
}

/// Append an admin-only note. Not part of the public timeline.
pub async fn add_internal_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<InternalNoteRequest>,
) -> Result<Json<Value>> {
    let (dispute_id, _) = load_dispute(&state.db, &id).await?;
    let actor = claims.actor_id()?;

    if request.note.trim().is_empty() {
        return Err(AppError::validation("Note text is required"));
    }

    let note = InternalNote {
        note: request.note,
        added_by: actor,
        added_at: Utc::now(),
    };
    disputes(&state.db)
        .update_one(
            doc! { "_id": dispute_id },
            doc! { "$push": { "internal_notes": bson::to_bson(&note)? } },
        )
        .await?;

    Ok(Json(json!({ "success": true, "message": "Note added" })))
}
