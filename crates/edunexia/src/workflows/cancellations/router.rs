use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{error, warn};

use super::domain::{
    CancellationRequestId, CancellationSubmission, RequestFilters, ReviewDecision, ReviewerId,
};
use super::repository::CancellationRepository;
use super::service::{CancellationService, CancellationServiceError, ErrorKind};
use crate::workflows::enrollments::{EnrollmentId, EnrollmentRepository};

/// Header carrying the authenticated user id, set by the auth proxy.
pub const REVIEWER_HEADER: &str = "x-user-id";

/// Router builder exposing cancellation requests, review, sweep, and reconciliation.
pub fn cancellation_router<E, C>(service: Arc<CancellationService<E, C>>) -> Router
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/enrollments/:enrollment_id/cancellation-requests",
            post(request_handler::<E, C>),
        )
        .route("/api/v1/cancellation-requests", get(list_handler::<E, C>))
        .route(
            "/api/v1/cancellation-requests/sweep",
            post(sweep_handler::<E, C>),
        )
        .route(
            "/api/v1/cancellation-requests/reconcile",
            post(reconcile_handler::<E, C>),
        )
        .route(
            "/api/v1/cancellation-requests/:request_id",
            get(detail_handler::<E, C>),
        )
        .route(
            "/api/v1/cancellation-requests/:request_id/review",
            post(review_handler::<E, C>),
        )
        .with_state(service)
}

pub(crate) async fn request_handler<E, C>(
    State(service): State<Arc<CancellationService<E, C>>>,
    Path(enrollment_id): Path<EnrollmentId>,
    Json(submission): Json<CancellationSubmission>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    match service.request(enrollment_id, submission).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(error) => cancellation_error_response(error),
    }
}

pub(crate) async fn list_handler<E, C>(
    State(service): State<Arc<CancellationService<E, C>>>,
    Query(filters): Query<RequestFilters>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    match service.list(&filters).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(error) => cancellation_error_response(error),
    }
}

pub(crate) async fn detail_handler<E, C>(
    State(service): State<Arc<CancellationService<E, C>>>,
    Path(request_id): Path<CancellationRequestId>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    match service.get(request_id).await {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(error) => cancellation_error_response(error),
    }
}

pub(crate) async fn review_handler<E, C>(
    State(service): State<Arc<CancellationService<E, C>>>,
    Path(request_id): Path<CancellationRequestId>,
    headers: HeaderMap,
    Json(decision): Json<ReviewDecision>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    let Some(reviewer) = reviewer_from_headers(&headers) else {
        let payload = json!({ "error": format!("missing {REVIEWER_HEADER} header") });
        return (StatusCode::UNAUTHORIZED, Json(payload)).into_response();
    };

    match service.review(request_id, decision, &reviewer).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(error) => cancellation_error_response(error),
    }
}

pub(crate) async fn sweep_handler<E, C>(
    State(service): State<Arc<CancellationService<E, C>>>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    match service.run_sweep().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => cancellation_error_response(error),
    }
}

pub(crate) async fn reconcile_handler<E, C>(
    State(service): State<Arc<CancellationService<E, C>>>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    match service.reconcile().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => cancellation_error_response(error),
    }
}

fn reviewer_from_headers(headers: &HeaderMap) -> Option<ReviewerId> {
    headers
        .get(REVIEWER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| ReviewerId(value.to_string()))
}

pub(crate) fn cancellation_error_response(error: CancellationServiceError) -> Response {
    let status = match error.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::Gateway => {
            warn!(error = %error, "cancellation workflow gateway failure");
            StatusCode::BAD_GATEWAY
        }
        ErrorKind::Misconfigured => {
            error!(error = %error, "cancellation workflow misconfigured");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}
