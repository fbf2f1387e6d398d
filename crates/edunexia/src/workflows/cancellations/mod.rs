//! Cancellation lifecycle: student requests, the reviewer's decision cascading onto the
//! enrollment, and the automatic delinquency sweep.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use domain::{
    CancellationReason, CancellationRequest, CancellationRequestDetails, CancellationRequestId,
    CancellationStatus, CancellationSubmission, Page, PageMeta, RequestFilters, RequestQuery,
    ReviewDecision, ReviewerId, SweepFailure, SweepReport, UnknownCancellationStatus,
    SYSTEM_REVIEWER,
};
pub use repository::CancellationRepository;
pub use router::{cancellation_router, REVIEWER_HEADER};
pub use service::{CancellationService, CancellationServiceError, ErrorKind};
pub use sweep::ReconciliationReport;
