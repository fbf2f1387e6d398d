use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::clock::FixedClock;
use crate::config::SweepConfig;
use crate::store::InMemoryStore;
use crate::workflows::cancellations::domain::{
    CancellationReason, CancellationRequest, CancellationRequestDetails, CancellationRequestId,
    CancellationStatus, CancellationSubmission, RequestQuery,
};
use crate::workflows::cancellations::{CancellationRepository, CancellationService};
use crate::workflows::enrollments::{
    CourseId, Enrollment, EnrollmentId, EnrollmentRepository, EnrollmentStatus, PaymentPlanId,
    StudentId,
};
use crate::workflows::repository::RepositoryError;

pub(super) type MemoryService = CancellationService<InMemoryStore, InMemoryStore>;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 15, 12, 0, 0).unwrap()
}

pub(super) fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

pub(super) fn enrollment(status: EnrollmentStatus, updated_at: DateTime<Utc>) -> Enrollment {
    Enrollment {
        id: EnrollmentId::generate(),
        student_id: StudentId(Uuid::new_v4()),
        course_id: CourseId(Uuid::new_v4()),
        payment_plan_id: PaymentPlanId(Uuid::new_v4()),
        status,
        start_date: NaiveDate::from_ymd_opt(2025, 2, 3).expect("valid date"),
        end_date: None,
        notes: None,
        created_at: days_ago(200),
        updated_at,
    }
}

pub(super) fn submission() -> CancellationSubmission {
    CancellationSubmission {
        reason: CancellationReason::Financial,
        description: Some("Perdi o emprego".to_string()),
    }
}

pub(super) fn pending_request(
    enrollment: &Enrollment,
    requested_at: DateTime<Utc>,
) -> CancellationRequest {
    CancellationRequest {
        id: CancellationRequestId::generate(),
        enrollment_id: enrollment.id,
        student_id: enrollment.student_id,
        reason: CancellationReason::Relocation,
        description: Some("Mudança para Recife".to_string()),
        status: CancellationStatus::Pending,
        requested_at,
        reviewed_at: None,
        reviewed_by: None,
        review_notes: None,
        created_at: requested_at,
        updated_at: requested_at,
    }
}

pub(super) fn service_over<E, C>(
    enrollments: Arc<E>,
    requests: Arc<C>,
) -> CancellationService<E, C>
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    CancellationService::new(
        enrollments,
        requests,
        Arc::new(FixedClock(now())),
        SweepConfig::default(),
    )
}

pub(super) fn build_service() -> (MemoryService, InMemoryStore) {
    let store = InMemoryStore::new();
    let service = service_over(Arc::new(store.clone()), Arc::new(store.clone()));
    (service, store)
}

/// Store with a single enrollment in `status`, last touched `updated_at`.
pub(super) fn seeded(
    status: EnrollmentStatus,
    updated_at: DateTime<Utc>,
) -> (MemoryService, InMemoryStore, Enrollment) {
    let (service, store) = build_service();
    let record = enrollment(status, updated_at);
    store
        .seed_enrollments([record.clone()])
        .expect("seed enrollment");
    (service, store, record)
}

/// Reads go to the wrapped store; every enrollment update fails.
#[derive(Clone)]
pub(super) struct ReadOnlyEnrollments(pub(super) InMemoryStore);

#[async_trait]
impl EnrollmentRepository for ReadOnlyEnrollments {
    async fn insert(&self, _record: Enrollment) -> Result<Enrollment, RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    async fn update(&self, _record: Enrollment) -> Result<Enrollment, RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    async fn update_if_status(
        &self,
        _record: Enrollment,
        _expected: EnrollmentStatus,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    async fn fetch(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        EnrollmentRepository::fetch(&self.0, id).await
    }

    async fn list(
        &self,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        EnrollmentRepository::list(&self.0, status).await
    }

    async fn delinquent_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        self.0.delinquent_before(cutoff).await
    }
}

pub(super) struct UnavailableEnrollments;

#[async_trait]
impl EnrollmentRepository for UnavailableEnrollments {
    async fn insert(&self, _record: Enrollment) -> Result<Enrollment, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn update(&self, _record: Enrollment) -> Result<Enrollment, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn update_if_status(
        &self,
        _record: Enrollment,
        _expected: EnrollmentStatus,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn fetch(&self, _id: EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn list(
        &self,
        _status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn delinquent_before(
        &self,
        _cutoff: DateTime<Utc>,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Request store whose `has_pending` check yields before answering, so overlapping sweeps
/// interleave between the check and the insert. With `hide_pending` the check also
/// reports nothing, as if the pending request arrived right after it.
#[derive(Clone)]
pub(super) struct LaggingRequests {
    pub(super) store: InMemoryStore,
    pub(super) hide_pending: bool,
}

#[async_trait]
impl CancellationRepository for LaggingRequests {
    async fn insert(
        &self,
        record: CancellationRequest,
    ) -> Result<CancellationRequest, RepositoryError> {
        CancellationRepository::insert(&self.store, record).await
    }

    async fn update(
        &self,
        record: CancellationRequest,
    ) -> Result<CancellationRequest, RepositoryError> {
        CancellationRepository::update(&self.store, record).await
    }

    async fn fetch(
        &self,
        id: CancellationRequestId,
    ) -> Result<Option<CancellationRequest>, RepositoryError> {
        CancellationRepository::fetch(&self.store, id).await
    }

    async fn fetch_details(
        &self,
        id: CancellationRequestId,
    ) -> Result<Option<CancellationRequestDetails>, RepositoryError> {
        self.store.fetch_details(id).await
    }

    async fn list(
        &self,
        query: &RequestQuery,
    ) -> Result<(Vec<CancellationRequestDetails>, u64), RepositoryError> {
        CancellationRepository::list(&self.store, query).await
    }

    async fn delete(&self, id: CancellationRequestId) -> Result<(), RepositoryError> {
        self.store.delete(id).await
    }

    async fn has_pending(&self, enrollment_id: EnrollmentId) -> Result<bool, RepositoryError> {
        let pending = self.store.has_pending(enrollment_id).await?;
        tokio::task::yield_now().await;
        Ok(pending && !self.hide_pending)
    }

    async fn with_status(
        &self,
        status: CancellationStatus,
    ) -> Result<Vec<CancellationRequest>, RepositoryError> {
        self.store.with_status(status).await
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
