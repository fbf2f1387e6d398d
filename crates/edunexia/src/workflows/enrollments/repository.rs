use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{Enrollment, EnrollmentId, EnrollmentStatus};
use crate::workflows::repository::RepositoryError;

/// Storage abstraction over the `matriculas` relation.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    async fn insert(&self, record: Enrollment) -> Result<Enrollment, RepositoryError>;
    async fn update(&self, record: Enrollment) -> Result<Enrollment, RepositoryError>;
    /// Writes `record` only while the stored row is still in `expected`; `None` otherwise.
    async fn update_if_status(
        &self,
        record: Enrollment,
        expected: EnrollmentStatus,
    ) -> Result<Option<Enrollment>, RepositoryError>;
    async fn fetch(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RepositoryError>;
    async fn list(
        &self,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, RepositoryError>;
    /// Enrollments in `inadimplente` whose last update is strictly before `cutoff`.
    async fn delinquent_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Enrollment>, RepositoryError>;
}
