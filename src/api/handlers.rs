use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    ActionSpec, Approval, ApprovalDecisionEvent, ApprovalInfo, ApprovalStatus, Decision, Intent,
    IntentContext, PolicyRule, RiskAssessment,
};

/// Health check endpoint
pub async fn health_check() -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Prometheus exposition endpoint
pub async fn export_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

/// Intent submission body shared by /evaluate and /decide; the server
/// assigns the event id.
#[derive(Debug, Deserialize, Validate)]
pub struct IntentRequest {
    #[validate(length(min = 1))]
    pub trace_id: String,

    #[serde(default)]
    pub agent_id: String,

    #[serde(default)]
    pub session_id: String,

    #[serde(default)]
    pub user_id: String,

    pub action: ActionSpec,

    #[serde(default)]
    pub context: IntentContext,
}

impl IntentRequest {
    fn into_intent(self) -> Intent {
        Intent {
            event_id: Uuid::new_v4().to_string(),
            trace_id: self.trace_id,
            timestamp: Some(Utc::now()),
            agent_id: self.agent_id,
            session_id: self.session_id,
            user_id: self.user_id,
            action: self.action,
            context: self.context,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub decision: Decision,
    pub risk: RiskAssessment,
    pub policy_hits: Vec<String>,
    pub rewrite: Option<Value>,
    pub approval: ApprovalInfo,
}

/// Run the full pipeline in-process and return the decision payload.
/// No action record is persisted and no event is emitted.
pub async fn evaluate(
    State(state): State<AppState>,
    Json(request): Json<IntentRequest>,
) -> Result<Json<EvaluateResponse>> {
    request.validate()?;

    let record = state.pipeline.evaluate_sync(request.into_intent()).await?;

    Ok(Json(EvaluateResponse {
        decision: record.decision,
        risk: record.risk,
        policy_hits: record.policy_hits,
        rewrite: record.rewrite,
        approval: record.approval,
    }))
}

#[derive(Debug, Serialize)]
pub struct DecideAccepted {
    pub event_id: String,
    pub trace_id: String,
}

/// Append an intent to the intent stream; the worker evaluates it and
/// emits to the decision stream.
pub async fn submit_intent(
    State(state): State<AppState>,
    Json(request): Json<IntentRequest>,
) -> Result<(StatusCode, Json<DecideAccepted>)> {
    request.validate()?;

    let intent = request.into_intent();
    state.bus.append(&state.streams.intent, &intent).await?;

    tracing::info!(
        event_id = %intent.event_id,
        trace_id = %intent.trace_id,
        "Intent submitted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DecideAccepted {
            event_id: intent.event_id,
            trace_id: intent.trace_id,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ApprovalListQuery {
    pub status: Option<String>,
}

/// List approvals, newest first; optional ?status= filter.
pub async fn list_approvals(
    State(state): State<AppState>,
    Query(query): Query<ApprovalListQuery>,
) -> Result<Json<Vec<Approval>>> {
    let status = query
        .status
        .map(|s| {
            s.to_uppercase()
                .parse::<ApprovalStatus>()
                .map_err(|_| AppError::Validation(format!("Unknown approval status: {s}")))
        })
        .transpose()?;

    Ok(Json(state.store.list_approvals(status).await?))
}

/// List approvals awaiting a reviewer, newest first.
pub async fn list_pending_approvals(
    State(state): State<AppState>,
) -> Result<Json<Vec<Approval>>> {
    Ok(Json(
        state.store.list_approvals(Some(ApprovalStatus::Pending)).await?,
    ))
}

/// Fetch a single approval.
pub async fn get_approval(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Approval>> {
    let request_id = Uuid::parse_str(&id)
        .map_err(|_| AppError::NotFound(format!("Approval {id} not found")))?;

    state
        .store
        .get_approval(&request_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Approval {id} not found")))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveBody {
    pub comment: Option<String>,
    pub reviewer_id: Option<String>,
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ResolveBody>>,
) -> Result<Json<Approval>> {
    resolve(state, id, ApprovalStatus::Approved, body.map(|Json(b)| b)).await
}

pub async fn deny(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ResolveBody>>,
) -> Result<Json<Approval>> {
    resolve(state, id, ApprovalStatus::Denied, body.map(|Json(b)| b)).await
}

/// Conditionally resolve a pending approval and emit the approval-decision
/// event. 400 for malformed ids and already-resolved approvals, 404 for
/// unknown ids.
async fn resolve(
    state: AppState,
    id: String,
    status: ApprovalStatus,
    body: Option<ResolveBody>,
) -> Result<Json<Approval>> {
    let request_id = Uuid::parse_str(&id)
        .map_err(|_| AppError::Validation(format!("Approval id must be a UUID: {id}")))?;

    let body = body.unwrap_or_default();
    let reviewer_id = body.reviewer_id.unwrap_or_else(|| "api".to_string());

    let approval = state
        .store
        .resolve_approval(&request_id, status, Some(reviewer_id), body.comment)
        .await?;

    metrics::APPROVALS_RESOLVED_TOTAL
        .with_label_values(&[&status.to_string()])
        .inc();

    let event = ApprovalDecisionEvent {
        request_id,
        decision: status,
        comment: approval.comment.clone(),
        timestamp: approval.resolved_at.unwrap_or_else(Utc::now),
    };
    // the resolution is already durable; a broker outage only delays the
    // notification
    if let Err(e) = state
        .bus
        .append(&state.streams.approval_decision, &event)
        .await
    {
        tracing::error!(
            request_id = %request_id,
            error = %e,
            "Failed to emit approval-decision event"
        );
    }

    tracing::info!(
        request_id = %request_id,
        status = %status,
        "Approval resolved"
    );

    Ok(Json(approval))
}

/// List policy rule documents.
pub async fn list_policies(State(state): State<AppState>) -> Result<Json<Vec<PolicyRule>>> {
    Ok(Json(state.store.list_policies().await?))
}

/// Insert a policy rule document. Duplicate policy ids are rejected.
pub async fn create_policy(
    State(state): State<AppState>,
    Json(rule): Json<PolicyRule>,
) -> Result<(StatusCode, Json<PolicyRule>)> {
    rule.validate()?;

    if !state.store.insert_policy(&rule).await? {
        return Err(AppError::Validation(format!(
            "Policy {} already exists",
            rule.policy_id
        )));
    }

    Ok((StatusCode::CREATED, Json(rule)))
}
