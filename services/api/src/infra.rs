use chrono::Utc;
use edunexia::config::AppConfig;
use edunexia::error::AppError;
use edunexia::gateway::RestGateway;
use edunexia::workflows::cancellations::{CancellationRepository, CancellationService};
use edunexia::workflows::enrollments::{
    EnrollmentCsvImporter, EnrollmentRepository, EnrollmentServiceError,
};
use edunexia::{InMemoryStore, SystemClock};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Where enrollments and cancellation requests live for this process.
pub(crate) enum Backend {
    Gateway(Arc<RestGateway>),
    Memory(Arc<InMemoryStore>),
}

impl Backend {
    /// The hosted gateway when `GATEWAY_URL` is set, otherwise an in-memory store,
    /// optionally loaded from a `matriculas` CSV export.
    pub(crate) fn from_config(config: &AppConfig, seed: Option<&Path>) -> Result<Self, AppError> {
        if config.gateway.url.is_some() {
            if let Some(path) = seed {
                warn!(path = %path.display(), "seed file ignored when a gateway is configured");
            }
            let gateway = RestGateway::new(&config.gateway)?;
            info!("using hosted gateway for enrollment data");
            return Ok(Self::Gateway(Arc::new(gateway)));
        }

        let store = match seed {
            Some(path) => seeded_store(path)?,
            None => InMemoryStore::new(),
        };
        info!("using in-memory enrollment store");
        Ok(Self::Memory(Arc::new(store)))
    }
}

pub(crate) fn seeded_store(path: &Path) -> Result<InMemoryStore, AppError> {
    let enrollments = EnrollmentCsvImporter::from_path(path, Utc::now())?;
    let store = InMemoryStore::new();
    let loaded = store
        .seed_enrollments(enrollments)
        .map_err(EnrollmentServiceError::from)?;
    info!(loaded, path = %path.display(), "enrollments seeded from export");
    Ok(store)
}

pub(crate) fn cancellation_service<E, C>(
    enrollments: Arc<E>,
    requests: Arc<C>,
    config: &AppConfig,
) -> CancellationService<E, C>
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    CancellationService::new(enrollments, requests, Arc::new(SystemClock), config.sweep)
}
