//! Enrollment record store: the `matriculas` entity, its CRUD accessors, and the
//! cancellation operation every other workflow cascades into.

pub mod domain;
pub mod import;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    CourseId, Enrollment, EnrollmentId, EnrollmentSnapshot, EnrollmentStatus, NewEnrollment,
    PaymentPlanId, StudentId, UnknownEnrollmentStatus,
};
pub use import::{EnrollmentCsvImporter, EnrollmentImportError};
pub use repository::EnrollmentRepository;
pub use router::enrollment_router;
pub use service::{EnrollmentService, EnrollmentServiceError};
