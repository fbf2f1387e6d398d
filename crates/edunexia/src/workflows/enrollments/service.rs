use std::sync::Arc;

use tracing::{debug, info};

use super::domain::{Enrollment, EnrollmentId, EnrollmentStatus, NewEnrollment};
use super::repository::EnrollmentRepository;
use crate::clock::Clock;
use crate::workflows::repository::RepositoryError;

/// CRUD accessors over the enrollment record store.
pub struct EnrollmentService<E> {
    repository: Arc<E>,
    clock: Arc<dyn Clock>,
}

impl<E> Clone for EnrollmentService<E> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<E> EnrollmentService<E>
where
    E: EnrollmentRepository + 'static,
{
    pub fn new(repository: Arc<E>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub fn repository(&self) -> &Arc<E> {
        &self.repository
    }

    /// Persist a submitted enrollment. New enrollments start as `pendente` unless told otherwise.
    pub async fn create(&self, new: NewEnrollment) -> Result<Enrollment, EnrollmentServiceError> {
        let now = self.clock.now();
        let record = Enrollment {
            id: EnrollmentId::generate(),
            student_id: new.student_id,
            course_id: new.course_id,
            payment_plan_id: new.payment_plan_id,
            status: new.status.unwrap_or(EnrollmentStatus::Pending),
            start_date: new.start_date,
            end_date: new.end_date,
            notes: new.notes.filter(|text| !text.trim().is_empty()),
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert(record).await?;
        info!(enrollment_id = %stored.id, status = %stored.status, "enrollment created");
        Ok(stored)
    }

    pub async fn get(&self, id: EnrollmentId) -> Result<Enrollment, EnrollmentServiceError> {
        self.repository
            .fetch(id)
            .await?
            .ok_or(EnrollmentServiceError::NotFound(id))
    }

    pub async fn list(
        &self,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, EnrollmentServiceError> {
        debug!(status = ?status, "listing enrollments");
        Ok(self.repository.list(status).await?)
    }

    /// Manual status edit. Terminal statuses cannot be left; cancelling goes through
    /// [`EnrollmentService::cancel`].
    pub async fn change_status(
        &self,
        id: EnrollmentId,
        status: EnrollmentStatus,
        notes: Option<&str>,
    ) -> Result<Enrollment, EnrollmentServiceError> {
        let mut record = self.get(id).await?;
        if record.status.is_terminal() && record.status != status {
            return Err(EnrollmentServiceError::InvalidTransition {
                id,
                from: record.status,
                to: status,
            });
        }

        if status == EnrollmentStatus::Cancelled {
            return self.cancel(id, notes).await;
        }

        let previous = record.status;
        record.status = status;
        if let Some(note) = notes {
            record.append_note(note);
        }
        record.updated_at = self.clock.now();

        let stored = self.repository.update(record).await?;
        info!(enrollment_id = %id, from = %previous, to = %status, "enrollment status changed");
        Ok(stored)
    }

    /// Set the enrollment to `cancelada` and append `notes`. Does not look at the current
    /// status, so cancelling twice only appends the note again.
    pub async fn cancel(
        &self,
        id: EnrollmentId,
        notes: Option<&str>,
    ) -> Result<Enrollment, EnrollmentServiceError> {
        let mut record = self.get(id).await?;
        record.status = EnrollmentStatus::Cancelled;
        if let Some(note) = notes {
            record.append_note(note);
        }
        record.updated_at = self.clock.now();

        let stored = self.repository.update(record).await?;
        info!(enrollment_id = %id, "enrollment cancelled");
        Ok(stored)
    }

    /// Like [`EnrollmentService::cancel`], but only while the enrollment is still in
    /// `expected`. Returns `None` when it has already moved to another status.
    pub async fn cancel_if(
        &self,
        id: EnrollmentId,
        expected: EnrollmentStatus,
        notes: Option<&str>,
    ) -> Result<Option<Enrollment>, EnrollmentServiceError> {
        let mut record = self.get(id).await?;
        if record.status != expected {
            return Ok(None);
        }
        record.status = EnrollmentStatus::Cancelled;
        if let Some(note) = notes {
            record.append_note(note);
        }
        record.updated_at = self.clock.now();

        let stored = self.repository.update_if_status(record, expected).await?;
        match &stored {
            Some(_) => info!(enrollment_id = %id, from = %expected, "enrollment cancelled"),
            None => debug!(
                enrollment_id = %id,
                from = %expected,
                "enrollment moved on, not cancelled"
            ),
        }
        Ok(stored)
    }
}

/// Error raised by the enrollment service.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentServiceError {
    #[error("enrollment {0} not found")]
    NotFound(EnrollmentId),
    #[error("enrollment {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: EnrollmentId,
        from: EnrollmentStatus,
        to: EnrollmentStatus,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
