use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    CancellationReason, CancellationRequest, CancellationRequestId, CancellationStatus,
    ReviewerId, SweepFailure, SweepReport,
};
use super::repository::CancellationRepository;
use super::service::{CancellationService, CancellationServiceError};
use crate::workflows::enrollments::{
    Enrollment, EnrollmentId, EnrollmentRepository, EnrollmentStatus,
};
use crate::workflows::repository::RepositoryError;

enum SweepStep {
    Cancelled,
    Skipped,
}

/// Outcome of a reconciliation pass over approved requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub examined: usize,
    pub repaired: Vec<EnrollmentId>,
    pub failures: Vec<SweepFailure>,
}

impl<E, C> CancellationService<E, C>
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    /// Auto-cancel enrollments that have been delinquent since before the configured
    /// threshold. Enrollments with a pending request are left to the human review.
    pub async fn run_sweep(&self) -> Result<SweepReport, CancellationServiceError> {
        let now = self.clock.now();
        let cutoff = self.sweep.cutoff(now)?;
        let mut report = SweepReport::new(cutoff, self.sweep.threshold_days);

        let candidates: Vec<Enrollment> = self
            .enrollments
            .repository()
            .delinquent_before(cutoff)
            .await?
            .into_iter()
            .filter(|enrollment| enrollment.is_stale_delinquent(cutoff))
            .collect();
        report.candidates = candidates.len();
        debug!(%cutoff, candidates = report.candidates, "delinquency sweep started");

        for enrollment in &candidates {
            match self.sweep_enrollment(enrollment, now).await {
                Ok(SweepStep::Cancelled) => report.cancelled += 1,
                Ok(SweepStep::Skipped) => report.skipped.push(enrollment.id),
                Err(err) => {
                    warn!(
                        enrollment_id = %enrollment.id,
                        error = %err,
                        "sweep could not cancel enrollment"
                    );
                    report.failures.push(SweepFailure {
                        enrollment_id: enrollment.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            cancelled = report.cancelled,
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "delinquency sweep finished"
        );
        Ok(report)
    }

    async fn sweep_enrollment(
        &self,
        enrollment: &Enrollment,
        now: DateTime<Utc>,
    ) -> Result<SweepStep, CancellationServiceError> {
        if self.requests.has_pending(enrollment.id).await? {
            debug!(enrollment_id = %enrollment.id, "pending request exists, skipping");
            return Ok(SweepStep::Skipped);
        }

        let days = self.sweep.threshold_days;
        let claim = CancellationRequest {
            id: CancellationRequestId::generate(),
            enrollment_id: enrollment.id,
            student_id: enrollment.student_id,
            reason: CancellationReason::Financial,
            description: Some(format!(
                "Cancelamento automático: matrícula inadimplente há mais de {days} dias"
            )),
            status: CancellationStatus::Pending,
            requested_at: now,
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
            created_at: now,
            updated_at: now,
        };

        // Filed as `pendente` so the one-pending-request constraint arbitrates overlapping
        // runs and requests opened after the `has_pending` check.
        let claim = match self.requests.insert(claim).await {
            Ok(claim) => claim,
            Err(RepositoryError::Conflict) => return Ok(SweepStep::Skipped),
            Err(other) => return Err(other.into()),
        };
        let approved = self
            .requests
            .update(CancellationRequest {
                status: CancellationStatus::Approved,
                reviewed_at: Some(now),
                reviewed_by: Some(ReviewerId::system()),
                review_notes: Some("Aprovado automaticamente pelo sistema".to_string()),
                ..claim
            })
            .await?;

        let note = format!(
            "Matrícula cancelada automaticamente por inadimplência superior a {days} dias"
        );
        let cancelled = self
            .enrollments
            .cancel_if(enrollment.id, EnrollmentStatus::Delinquent, Some(&note))
            .await?;
        if cancelled.is_none() {
            debug!(
                enrollment_id = %enrollment.id,
                request_id = %approved.id,
                "enrollment no longer delinquent, withdrawing automatic request"
            );
            self.requests.delete(approved.id).await?;
            return Ok(SweepStep::Skipped);
        }
        Ok(SweepStep::Cancelled)
    }

    /// Cancel enrollments whose approved request never made it onto the enrollment row.
    pub async fn reconcile(&self) -> Result<ReconciliationReport, CancellationServiceError> {
        let approved = self.requests.with_status(CancellationStatus::Approved).await?;
        let mut seen = BTreeSet::new();
        let mut report = ReconciliationReport {
            examined: 0,
            repaired: Vec::new(),
            failures: Vec::new(),
        };

        for request in approved {
            if !seen.insert(request.enrollment_id) {
                continue;
            }
            report.examined += 1;

            let fetched = self
                .enrollments
                .repository()
                .fetch(request.enrollment_id)
                .await;
            let enrollment = match fetched {
                Ok(Some(enrollment)) => enrollment,
                Ok(None) => continue,
                Err(err) => {
                    report.failures.push(SweepFailure {
                        enrollment_id: request.enrollment_id,
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            if enrollment.status.is_terminal() {
                continue;
            }

            let note = format!(
                "Cancelamento concluído na reconciliação da solicitação {}",
                request.id
            );
            match self.enrollments.cancel(enrollment.id, Some(&note)).await {
                Ok(_) => {
                    info!(
                        enrollment_id = %enrollment.id,
                        request_id = %request.id,
                        "enrollment reconciled"
                    );
                    report.repaired.push(enrollment.id);
                }
                Err(err) => {
                    warn!(enrollment_id = %enrollment.id, error = %err, "reconciliation failed");
                    report.failures.push(SweepFailure {
                        enrollment_id: enrollment.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}
