use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::domain::{
    CancellationRequest, CancellationRequestDetails, CancellationRequestId, CancellationStatus,
    CancellationSubmission, Page, PageMeta, RequestFilters, ReviewDecision, ReviewerId,
};
use super::repository::CancellationRepository;
use crate::clock::Clock;
use crate::config::{ConfigError, SweepConfig};
use crate::workflows::enrollments::{
    EnrollmentId, EnrollmentRepository, EnrollmentService, EnrollmentServiceError,
    EnrollmentStatus,
};
use crate::workflows::repository::RepositoryError;

/// Service composing the enrollment store and the cancellation request store.
pub struct CancellationService<E, C> {
    pub(super) enrollments: EnrollmentService<E>,
    pub(super) requests: Arc<C>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) sweep: SweepConfig,
}

impl<E, C> CancellationService<E, C>
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    pub fn new(
        enrollments: Arc<E>,
        requests: Arc<C>,
        clock: Arc<dyn Clock>,
        sweep: SweepConfig,
    ) -> Self {
        Self {
            enrollments: EnrollmentService::new(enrollments, clock.clone()),
            requests,
            clock,
            sweep,
        }
    }

    pub fn enrollments(&self) -> &EnrollmentService<E> {
        &self.enrollments
    }

    /// Open a pending cancellation request for an active or delinquent enrollment.
    pub async fn request(
        &self,
        enrollment_id: EnrollmentId,
        submission: CancellationSubmission,
    ) -> Result<CancellationRequest, CancellationServiceError> {
        let enrollment = match self.enrollments.get(enrollment_id).await {
            Ok(enrollment) => enrollment,
            Err(EnrollmentServiceError::NotFound(id)) => {
                return Err(CancellationServiceError::EnrollmentNotFound(id))
            }
            Err(other) => return Err(other.into()),
        };

        if !enrollment.status.accepts_cancellation_request() {
            return Err(CancellationServiceError::EnrollmentNotEligible {
                enrollment_id,
                status: enrollment.status,
            });
        }

        let now = self.clock.now();
        let record = CancellationRequest {
            id: CancellationRequestId::generate(),
            enrollment_id,
            student_id: enrollment.student_id,
            reason: submission.reason,
            description: submission
                .description
                .filter(|text| !text.trim().is_empty()),
            status: CancellationStatus::Pending,
            requested_at: now,
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
            created_at: now,
            updated_at: now,
        };

        let stored = match self.requests.insert(record).await {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => {
                return Err(CancellationServiceError::PendingRequestExists(enrollment_id))
            }
            Err(other) => return Err(other.into()),
        };

        info!(
            request_id = %stored.id,
            enrollment_id = %enrollment_id,
            reason = %stored.reason,
            "cancellation requested"
        );
        Ok(stored)
    }

    /// Filtered, paginated listing ordered by request time, newest first.
    pub async fn list(
        &self,
        filters: &RequestFilters,
    ) -> Result<Page<CancellationRequestDetails>, CancellationServiceError> {
        let query = filters.to_query();
        debug!(?query, "listing cancellation requests");

        let (data, total) = self.requests.list(&query).await.map_err(|err| {
            warn!(error = %err, "cancellation request listing failed");
            err
        })?;

        Ok(Page {
            data,
            meta: PageMeta::new(total, query.page, query.limit),
        })
    }

    pub async fn get(
        &self,
        id: CancellationRequestId,
    ) -> Result<CancellationRequestDetails, CancellationServiceError> {
        self.requests
            .fetch_details(id)
            .await
            .map_err(|err| {
                warn!(request_id = %id, error = %err, "cancellation request lookup failed");
                err
            })?
            .ok_or(CancellationServiceError::NotFound(id))
    }

    /// Apply a reviewer's decision. Approval cancels the linked enrollment; when that
    /// fails the request is put back to `pendente` so it can be reviewed again.
    pub async fn review(
        &self,
        id: CancellationRequestId,
        decision: ReviewDecision,
        reviewer: &ReviewerId,
    ) -> Result<CancellationRequest, CancellationServiceError> {
        if !decision.status.is_decision() {
            return Err(CancellationServiceError::InvalidDecision(decision.status));
        }

        let original = self
            .requests
            .fetch(id)
            .await?
            .ok_or(CancellationServiceError::NotFound(id))?;

        if !original.is_pending() {
            return Err(CancellationServiceError::AlreadyReviewed {
                id,
                status: original.status,
            });
        }

        let now = self.clock.now();
        let mut reviewed = original.clone();
        reviewed.status = decision.status;
        reviewed.review_notes = decision.notes.filter(|text| !text.trim().is_empty());
        reviewed.reviewed_at = Some(now);
        reviewed.reviewed_by = Some(reviewer.clone());
        reviewed.updated_at = now;

        let stored = self.requests.update(reviewed).await?;
        info!(
            request_id = %id,
            status = %stored.status,
            reviewer = %reviewer,
            "cancellation request reviewed"
        );

        if stored.status != CancellationStatus::Approved {
            return Ok(stored);
        }

        let note = stored.approval_note();
        if let Err(source) = self
            .enrollments
            .cancel(stored.enrollment_id, Some(&note))
            .await
        {
            let compensated = self.restore_pending(original).await;
            return Err(CancellationServiceError::CascadeFailed {
                id,
                compensated,
                source,
            });
        }

        Ok(stored)
    }

    async fn restore_pending(&self, mut original: CancellationRequest) -> bool {
        let id = original.id;
        original.updated_at = self.clock.now();
        match self.requests.update(original).await {
            Ok(_) => {
                warn!(request_id = %id, "enrollment cancellation failed, request reopened");
                true
            }
            Err(err) => {
                error!(
                    request_id = %id,
                    error = %err,
                    "request approved but enrollment not cancelled; left for reconciliation"
                );
                false
            }
        }
    }
}

/// Error raised by the cancellation workflows.
#[derive(Debug, thiserror::Error)]
pub enum CancellationServiceError {
    #[error("cancellation request {0} not found")]
    NotFound(CancellationRequestId),
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(EnrollmentId),
    #[error("enrollment {enrollment_id} is {status}; only active or delinquent enrollments can be cancelled on request")]
    EnrollmentNotEligible {
        enrollment_id: EnrollmentId,
        status: EnrollmentStatus,
    },
    #[error("enrollment {0} already has a pending cancellation request")]
    PendingRequestExists(EnrollmentId),
    #[error("cancellation request {id} was already {status}")]
    AlreadyReviewed {
        id: CancellationRequestId,
        status: CancellationStatus,
    },
    #[error("'{0}' is not a review decision; use aprovada or negada")]
    InvalidDecision(CancellationStatus),
    #[error("request {id} approved but the enrollment could not be cancelled")]
    CascadeFailed {
        id: CancellationRequestId,
        compensated: bool,
        #[source]
        source: EnrollmentServiceError,
    },
    #[error("sweep is misconfigured: {0}")]
    Misconfigured(#[from] ConfigError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentServiceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Coarse classification surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Gateway,
    Misconfigured,
}

impl CancellationServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CancellationServiceError::NotFound(_)
            | CancellationServiceError::EnrollmentNotFound(_)
            | CancellationServiceError::Enrollment(EnrollmentServiceError::NotFound(_)) => {
                ErrorKind::NotFound
            }
            CancellationServiceError::EnrollmentNotEligible { .. }
            | CancellationServiceError::PendingRequestExists(_)
            | CancellationServiceError::AlreadyReviewed { .. }
            | CancellationServiceError::InvalidDecision(_)
            | CancellationServiceError::Enrollment(EnrollmentServiceError::InvalidTransition {
                ..
            }) => ErrorKind::InvalidState,
            CancellationServiceError::Repository(RepositoryError::NotFound) => ErrorKind::NotFound,
            CancellationServiceError::Repository(RepositoryError::Conflict) => {
                ErrorKind::InvalidState
            }
            CancellationServiceError::CascadeFailed { .. }
            | CancellationServiceError::Enrollment(EnrollmentServiceError::Repository(_))
            | CancellationServiceError::Repository(_) => ErrorKind::Gateway,
            CancellationServiceError::Misconfigured(_) => ErrorKind::Misconfigured,
        }
    }
}
