use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::domain::{EnrollmentId, EnrollmentStatus, NewEnrollment};
use super::repository::EnrollmentRepository;
use super::service::{EnrollmentService, EnrollmentServiceError};
use crate::workflows::repository::RepositoryError;

/// Router builder exposing the enrollment record store.
pub fn enrollment_router<E>(service: Arc<EnrollmentService<E>>) -> Router
where
    E: EnrollmentRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/enrollments",
            post(create_handler::<E>).get(list_handler::<E>),
        )
        .route("/api/v1/enrollments/:enrollment_id", get(get_handler::<E>))
        .route(
            "/api/v1/enrollments/:enrollment_id/status",
            patch(status_handler::<E>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/cancel",
            post(cancel_handler::<E>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EnrollmentListQuery {
    #[serde(default)]
    pub(crate) status: Option<EnrollmentStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChange {
    pub(crate) status: EnrollmentStatus,
    #[serde(default, rename = "observacoes")]
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CancelEnrollment {
    #[serde(default, rename = "observacoes")]
    pub(crate) notes: Option<String>,
}

pub(crate) async fn create_handler<E>(
    State(service): State<Arc<EnrollmentService<E>>>,
    Json(new): Json<NewEnrollment>,
) -> Response
where
    E: EnrollmentRepository + 'static,
{
    match service.create(new).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(error) => enrollment_error_response(error),
    }
}

pub(crate) async fn list_handler<E>(
    State(service): State<Arc<EnrollmentService<E>>>,
    Query(query): Query<EnrollmentListQuery>,
) -> Response
where
    E: EnrollmentRepository + 'static,
{
    match service.list(query.status).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(error) => enrollment_error_response(error),
    }
}

pub(crate) async fn get_handler<E>(
    State(service): State<Arc<EnrollmentService<E>>>,
    Path(enrollment_id): Path<EnrollmentId>,
) -> Response
where
    E: EnrollmentRepository + 'static,
{
    match service.get(enrollment_id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(error) => enrollment_error_response(error),
    }
}

pub(crate) async fn status_handler<E>(
    State(service): State<Arc<EnrollmentService<E>>>,
    Path(enrollment_id): Path<EnrollmentId>,
    Json(change): Json<StatusChange>,
) -> Response
where
    E: EnrollmentRepository + 'static,
{
    match service
        .change_status(enrollment_id, change.status, change.notes.as_deref())
        .await
    {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(error) => enrollment_error_response(error),
    }
}

pub(crate) async fn cancel_handler<E>(
    State(service): State<Arc<EnrollmentService<E>>>,
    Path(enrollment_id): Path<EnrollmentId>,
    body: Option<Json<CancelEnrollment>>,
) -> Response
where
    E: EnrollmentRepository + 'static,
{
    let notes = body.and_then(|Json(payload)| payload.notes);
    match service.cancel(enrollment_id, notes.as_deref()).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(error) => enrollment_error_response(error),
    }
}

pub(crate) fn enrollment_error_response(error: EnrollmentServiceError) -> Response {
    let status = match &error {
        EnrollmentServiceError::NotFound(_)
        | EnrollmentServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        EnrollmentServiceError::InvalidTransition { .. }
        | EnrollmentServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        EnrollmentServiceError::Repository(_) => {
            warn!(error = %error, "enrollment gateway failure");
            StatusCode::BAD_GATEWAY
        }
    };

    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}
