use async_trait::async_trait;

use super::domain::{
    CancellationRequest, CancellationRequestDetails, CancellationRequestId, CancellationStatus,
    RequestQuery,
};
use crate::workflows::enrollments::EnrollmentId;
use crate::workflows::repository::RepositoryError;

/// Storage abstraction over the `solicitacoes_cancelamento` relation.
///
/// Implementations must reject a second `pendente` request for the same enrollment
/// with [`RepositoryError::Conflict`]. The sweep files its request as `pendente` first so
/// the same constraint covers it.
#[async_trait]
pub trait CancellationRepository: Send + Sync {
    async fn insert(
        &self,
        record: CancellationRequest,
    ) -> Result<CancellationRequest, RepositoryError>;
    async fn update(
        &self,
        record: CancellationRequest,
    ) -> Result<CancellationRequest, RepositoryError>;
    async fn fetch(
        &self,
        id: CancellationRequestId,
    ) -> Result<Option<CancellationRequest>, RepositoryError>;
    async fn fetch_details(
        &self,
        id: CancellationRequestId,
    ) -> Result<Option<CancellationRequestDetails>, RepositoryError>;
    /// Returns the requested window together with the total number of matching rows.
    async fn list(
        &self,
        query: &RequestQuery,
    ) -> Result<(Vec<CancellationRequestDetails>, u64), RepositoryError>;
    async fn delete(&self, id: CancellationRequestId) -> Result<(), RepositoryError>;
    async fn has_pending(&self, enrollment_id: EnrollmentId) -> Result<bool, RepositoryError>;
    async fn with_status(
        &self,
        status: CancellationStatus,
    ) -> Result<Vec<CancellationRequest>, RepositoryError>;
}
