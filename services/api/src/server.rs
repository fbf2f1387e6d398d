use crate::cli::ServeArgs;
use crate::infra::{cancellation_service, AppState, Backend};
use crate::routes::with_cancellation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use edunexia::config::AppConfig;
use edunexia::error::AppError;
use edunexia::telemetry;
use edunexia::workflows::cancellations::CancellationRepository;
use edunexia::workflows::enrollments::EnrollmentRepository;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    match Backend::from_config(&config, args.store.seed.as_deref())? {
        Backend::Gateway(gateway) => serve(&config, gateway.clone(), gateway).await,
        Backend::Memory(store) => serve(&config, store.clone(), store).await,
    }
}

async fn serve<E, C>(
    config: &AppConfig,
    enrollments: Arc<E>,
    requests: Arc<C>,
) -> Result<(), AppError>
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(cancellation_service(enrollments, requests, config));
    let app = with_cancellation_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        sweep_threshold_days = config.sweep.threshold_days,
        "enrollment cancellation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
