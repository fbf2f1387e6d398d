//! Enrollment cancellation workflows for the Edunexia education platform.
//!
//! The crate covers the enrollment record store, cancellation requests and their review,
//! the automatic delinquency sweep, and the HTTP routers exposing them. Persistence lives
//! behind the repository traits so the workflows run against the hosted gateway
//! ([`gateway::RestGateway`]) or the process-local [`store::InMemoryStore`].

pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod store;
pub mod telemetry;
pub mod workflows;

pub use clock::{Clock, SystemClock};
pub use config::AppConfig;
pub use error::AppError;
pub use store::InMemoryStore;
