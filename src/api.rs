//! HTTP API handlers for DogSquad.
//!
//! # Surface
//!
//! - `POST /reports` - submit a report (runs the submission flow)
//! - `GET /reports/:id` - fetch a report
//! - `GET /reports/:id/timeline` - audit trail, oldest first
//! - `PATCH /reports/:id/status` - lifecycle transition
//! - `POST /reports/:id/alerts` - record dispatched volunteer alerts
//! - `GET /reports/:id/alerts` - alerts for a report
//! - `POST /alerts/:id/response` - volunteer outcome
//! - `GET /health` - liveness check
//!
//! Error mapping: validation and missing-location problems come back as 422
//! with the offending field named, stale references as 404, illegal
//! transitions and duplicate alert outcomes as 409, and store failures as
//! 500. Timeline-append failures after a successful mutation are logged and
//! swallowed; the mutation stands.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::error::StoreError;
use crate::images::HttpImageStore;
use crate::model::{
    AlertResponseRequest, AlertsResponse, CreateReportRequest, CreateReportResponse,
    DispatchAlertsRequest, ImageAttachment, IssueType, Report, ReportStatus, ResolutionInput,
    TimelineResponse, UpdateStatusRequest,
};
use crate::storage::Storage;
use crate::submission::{SubmissionFlow, SubmissionInput};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    /// Image store collaborator; `None` when no store is configured, in
    /// which case attachments are dropped with a warning.
    pub images: Option<HttpImageStore>,
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/reports", post(create_report))
        .route("/reports/:id", get(get_report))
        .route("/reports/:id/status", patch(update_status))
        .route("/reports/:id/timeline", get(get_timeline))
        .route("/reports/:id/alerts", post(dispatch_alerts).get(get_alerts))
        .route("/alerts/:id/response", post(respond_alert))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON body returned for every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    /// Present for validation errors: the first missing/invalid field.
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

/// Wrapper turning a [`StoreError`] into an HTTP response.
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, field) = match &self.0 {
            StoreError::Validation { field } => (StatusCode::UNPROCESSABLE_ENTITY, Some(*field)),
            StoreError::LocationRequired => (StatusCode::UNPROCESSABLE_ENTITY, None),
            StoreError::Upload(_) => (StatusCode::BAD_GATEWAY, None),
            StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, None),
            StoreError::InvalidTransition { .. } | StoreError::AlertAlreadyResolved { .. } => {
                (StatusCode::CONFLICT, None)
            }
            StoreError::Persistence(e) => {
                warn!(error = %e, "Store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let body = ErrorBody {
            error: self.0.to_string(),
            field,
        };
        (status, Json(body)).into_response()
    }
}

/// POST /reports - Submit a new welfare report.
///
/// Runs the full submission flow: validation, best-effort image upload,
/// report creation, and the first timeline append. Returns `201 Created`
/// with the new report id. A failed image upload does not fail the request;
/// the response simply carries no `image_url`.
#[instrument(skip(state, request), fields(issue_type, user_id))]
pub async fn create_report(
    State(state): State<AppState>,
    Json(request): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<CreateReportResponse>), ApiError> {
    tracing::Span::current().record("issue_type", request.issue_type.as_str());
    tracing::Span::current().record("user_id", request.user_id.as_str());

    let issue_type =
        IssueType::parse(&request.issue_type).ok_or_else(|| StoreError::missing("issue_type"))?;

    let image = match (&request.image_base64, &request.image_filename) {
        (Some(data), Some(filename)) => {
            let bytes = BASE64
                .decode(data)
                .map_err(|_| StoreError::missing("image_base64"))?;
            Some(ImageAttachment {
                filename: filename.clone(),
                bytes,
            })
        }
        (Some(_), None) => return Err(StoreError::missing("image_filename").into()),
        _ => None,
    };

    let input = SubmissionInput {
        user_id: request.user_id,
        issue_type,
        title: request.title,
        description: request.description,
        latitude: request.latitude,
        longitude: request.longitude,
        location_address: request.location_address,
        observed_at: request.observed_at,
        image,
    };

    let outcome = SubmissionFlow::new(&state.storage)
        .run(state.images.as_ref(), input)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateReportResponse {
            report_id: outcome.report_id,
            status: ReportStatus::Pending,
            image_url: outcome.image_url,
        }),
    ))
}

/// GET /reports/:id - Fetch one report.
///
/// Exposes the full row, including location and issue type, which is what an
/// external alert dispatcher needs to pick candidate volunteers.
#[instrument(skip(state))]
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Report>, ApiError> {
    let report = state.storage.get_report(id).await?;
    Ok(Json(report))
}

/// PATCH /reports/:id/status - Move a report through its lifecycle.
///
/// The store validates the transition against the currently persisted status
/// and rejects anything outside the lifecycle with `409 Conflict`. On
/// success an audit entry is appended to the timeline; if that append fails
/// the status change still stands.
#[instrument(skip(state, request), fields(status))]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Report>, ApiError> {
    tracing::Span::current().record("status", request.status.as_str());

    if request.actor_id.trim().is_empty() {
        return Err(StoreError::missing("actor_id").into());
    }

    let resolution = ResolutionInput {
        notes: request.resolution_notes.clone(),
        image_url: request.resolution_image_url.clone(),
    };
    state
        .storage
        .update_status(id, request.status, Some(&resolution))
        .await?;

    let action = match request.status {
        ReportStatus::Pending => "Status changed to pending",
        ReportStatus::InProgress => "Status changed to in progress",
        ReportStatus::Resolved => "Report resolved",
        ReportStatus::Closed => "Report closed",
    };
    if let Err(e) = state
        .storage
        .append_timeline(
            id,
            &request.actor_id,
            action,
            request.resolution_notes.as_deref(),
            request.resolution_image_url.as_deref(),
        )
        .await
    {
        warn!(report_id = id, error = %e, "Failed to append status-change timeline entry");
    }

    info!(report_id = id, status = request.status.as_str(), "Report status changed");

    let report = state.storage.get_report(id).await?;
    Ok(Json(report))
}

/// GET /reports/:id/timeline - The report's audit trail, oldest entry first.
#[instrument(skip(state))]
pub async fn get_timeline(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TimelineResponse>, ApiError> {
    let entries = state.storage.list_timeline(id).await?;
    Ok(Json(TimelineResponse {
        report_id: id,
        entries,
    }))
}

/// POST /reports/:id/alerts - Record alerts dispatched to candidate
/// volunteers.
///
/// Candidate selection happens outside this service; callers supply the
/// volunteer ids. Volunteers who already have an alert for this report are
/// skipped, so re-dispatching is safe.
#[instrument(skip(state, request), fields(candidates = request.volunteer_ids.len()))]
pub async fn dispatch_alerts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<DispatchAlertsRequest>,
) -> Result<(StatusCode, Json<AlertsResponse>), ApiError> {
    if request.volunteer_ids.is_empty() {
        return Err(StoreError::missing("volunteer_ids").into());
    }

    let created = state
        .storage
        .dispatch_alerts(id, &request.volunteer_ids)
        .await?;

    info!(report_id = id, created = created.len(), "Alerts recorded");

    Ok((
        StatusCode::CREATED,
        Json(AlertsResponse {
            report_id: id,
            alerts: created,
        }),
    ))
}

/// GET /reports/:id/alerts - All alerts recorded for a report.
#[instrument(skip(state))]
pub async fn get_alerts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AlertsResponse>, ApiError> {
    let alerts = state.storage.list_alerts(id).await?;
    Ok(Json(AlertsResponse {
        report_id: id,
        alerts,
    }))
}

/// POST /alerts/:id/response - Record a volunteer's response to an alert.
///
/// Only `accepted`, `declined`, or `expired` are valid outcomes, and an alert
/// that already has one keeps it; a second response gets `409 Conflict`.
#[instrument(skip(state, request), fields(outcome = request.status.as_str()))]
pub async fn respond_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<AlertResponseRequest>,
) -> Result<Json<crate::model::Alert>, ApiError> {
    let alert = state
        .storage
        .respond_alert(id, request.status, request.notes.as_deref())
        .await?;

    info!(alert_id = id, outcome = alert.status.as_str(), "Alert response recorded");

    Ok(Json(alert))
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
