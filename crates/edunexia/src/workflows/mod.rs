pub mod cancellations;
pub mod enrollments;
pub mod repository;

pub use repository::RepositoryError;
