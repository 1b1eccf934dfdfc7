use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{CallPreferences, EngagementKind, LeadId, TaskId};
use super::queue::TaskQueueProcessor;
use super::repository::{ContactChannel, NotificationSink, RecordStore, StoreError};
use super::service::AutomationError;

/// Router builder exposing the automation engine over HTTP.
pub fn nurture_router<S, C, N>(processor: Arc<TaskQueueProcessor<S, C, N>>) -> Router
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/automation/tasks/process",
            post(process_tasks_handler::<S, C, N>),
        )
        .route(
            "/api/v1/automation/tasks/status",
            get(queue_status_handler::<S, C, N>),
        )
        .route(
            "/api/v1/automation/tasks/statistics",
            get(statistics_handler::<S, C, N>),
        )
        .route(
            "/api/v1/automation/tasks/:task_id/process",
            post(process_single_handler::<S, C, N>),
        )
        .route(
            "/api/v1/automation/tasks/:task_id/retry",
            post(retry_task_handler::<S, C, N>),
        )
        .route(
            "/api/v1/automation/tasks/:task_id/cancel",
            post(cancel_task_handler::<S, C, N>),
        )
        .route(
            "/api/v1/automation/leads/:lead_id/score",
            post(score_lead_handler::<S, C, N>),
        )
        .route(
            "/api/v1/automation/leads/:lead_id/compliance",
            get(compliance_handler::<S, C, N>),
        )
        .route(
            "/api/v1/automation/leads/:lead_id/call-time",
            get(call_time_handler::<S, C, N>),
        )
        .route(
            "/api/v1/automation/engagement",
            post(engagement_handler::<S, C, N>),
        )
        .route(
            "/api/v1/automation/sequences",
            post(start_sequence_handler::<S, C, N>),
        )
        .route(
            "/api/v1/automation/calls",
            post(schedule_call_handler::<S, C, N>),
        )
        .with_state(processor)
}

#[derive(Debug, Deserialize)]
pub(crate) struct EngagementRequest {
    pub(crate) lead_id: String,
    pub(crate) event_type: EngagementKind,
    #[serde(default)]
    pub(crate) occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartSequenceRequest {
    pub(crate) lead_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScheduleCallRequest {
    pub(crate) lead_id: String,
    #[serde(default)]
    pub(crate) preferred_time: Option<DateTime<Utc>>,
}

pub(crate) async fn process_tasks_handler<S, C, N>(
    State(processor): State<Arc<TaskQueueProcessor<S, C, N>>>,
) -> Response
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    match processor.process_due(Utc::now()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(crate) async fn process_single_handler<S, C, N>(
    State(processor): State<Arc<TaskQueueProcessor<S, C, N>>>,
    Path(task_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    match processor.process_task(&TaskId(task_id), Utc::now()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => automation_error_response(err),
    }
}

pub(crate) async fn queue_status_handler<S, C, N>(
    State(processor): State<Arc<TaskQueueProcessor<S, C, N>>>,
) -> Response
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    match processor.queue_status(Utc::now()) {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(crate) async fn statistics_handler<S, C, N>(
    State(processor): State<Arc<TaskQueueProcessor<S, C, N>>>,
) -> Response
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    match processor.statistics(Utc::now()) {
        Ok(statistics) => (StatusCode::OK, Json(statistics)).into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(crate) async fn retry_task_handler<S, C, N>(
    State(processor): State<Arc<TaskQueueProcessor<S, C, N>>>,
    Path(task_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    let task_id = TaskId(task_id);
    match processor.retry_failed(&task_id, Utc::now()) {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({ "task_id": task_id, "status": "rescheduled_for_retry" })),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "task is not in a failed state" })),
        )
            .into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(crate) async fn cancel_task_handler<S, C, N>(
    State(processor): State<Arc<TaskQueueProcessor<S, C, N>>>,
    Path(task_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    let task_id = TaskId(task_id);
    match processor.cancel(&task_id) {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({ "task_id": task_id, "status": "cancelled" })),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "task has already been claimed or finished" })),
        )
            .into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(crate) async fn score_lead_handler<S, C, N>(
    State(processor): State<Arc<TaskQueueProcessor<S, C, N>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    match processor.service().score_lead(&LeadId(lead_id), Utc::now()) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => automation_error_response(err),
    }
}

pub(crate) async fn compliance_handler<S, C, N>(
    State(processor): State<Arc<TaskQueueProcessor<S, C, N>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    match processor
        .service()
        .compliance_check(&LeadId(lead_id), Utc::now())
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => automation_error_response(err),
    }
}

pub(crate) async fn call_time_handler<S, C, N>(
    State(processor): State<Arc<TaskQueueProcessor<S, C, N>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    match processor
        .service()
        .optimal_call_time(&LeadId(lead_id), None, Utc::now())
    {
        Ok(optimal_time) => (
            StatusCode::OK,
            Json(json!({ "optimal_time": optimal_time })),
        )
            .into_response(),
        Err(err) => automation_error_response(err),
    }
}

pub(crate) async fn engagement_handler<S, C, N>(
    State(processor): State<Arc<TaskQueueProcessor<S, C, N>>>,
    Json(request): Json<EngagementRequest>,
) -> Response
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    let now = Utc::now();
    let occurred_at = request.occurred_at.unwrap_or(now);
    match processor.service().record_engagement(
        &LeadId(request.lead_id),
        request.event_type,
        occurred_at,
        now,
    ) {
        Ok(update) => (StatusCode::OK, Json(update)).into_response(),
        Err(err) => automation_error_response(err),
    }
}

pub(crate) async fn start_sequence_handler<S, C, N>(
    State(processor): State<Arc<TaskQueueProcessor<S, C, N>>>,
    Json(request): Json<StartSequenceRequest>,
) -> Response
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    match processor
        .service()
        .start_sequence(&LeadId(request.lead_id), Utc::now())
    {
        Ok(sequence) => (StatusCode::ACCEPTED, Json(sequence)).into_response(),
        Err(err) => automation_error_response(err),
    }
}

pub(crate) async fn schedule_call_handler<S, C, N>(
    State(processor): State<Arc<TaskQueueProcessor<S, C, N>>>,
    Json(request): Json<ScheduleCallRequest>,
) -> Response
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    let preferences = request.preferred_time.map(|preferred_time| CallPreferences {
        preferred_time: Some(preferred_time),
    });
    match processor.service().schedule_warm_call(
        &LeadId(request.lead_id),
        preferences,
        Utc::now(),
    ) {
        Ok(call) => (StatusCode::CREATED, Json(call)).into_response(),
        Err(err) => automation_error_response(err),
    }
}

fn automation_error_response(error: AutomationError) -> Response {
    match &error {
        AutomationError::LeadNotFound(_)
        | AutomationError::TaskNotFound(_)
        | AutomationError::SequenceNotFound(_)
        | AutomationError::CallNotFound(_)
        | AutomationError::LandingPageNotFound(_)
        | AutomationError::Store(StoreError::NotFound) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        AutomationError::Compliance { failed } => {
            let payload = json!({
                "error": error.to_string(),
                "requirements_failed": failed,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        AutomationError::CallLimitReached { limit } => {
            let payload = json!({
                "error": error.to_string(),
                "monthly_limit": limit,
            });
            (StatusCode::TOO_MANY_REQUESTS, Json(payload)).into_response()
        }
        AutomationError::NotCleared(_)
        | AutomationError::LeadEmailMissing(_)
        | AutomationError::StepOutOfOrder { .. }
        | AutomationError::InvalidCallTransition { .. } => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        AutomationError::Store(StoreError::Conflict) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        _ => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

fn store_error_response(error: StoreError) -> Response {
    automation_error_response(AutomationError::Store(error))
}
