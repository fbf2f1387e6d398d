use crate::cli::StoreArgs;
use crate::infra::{cancellation_service, Backend};
use clap::Args;
use edunexia::config::{AppConfig, SweepConfig};
use edunexia::error::AppError;
use edunexia::telemetry;
use edunexia::workflows::cancellations::{
    CancellationRepository, ReconciliationReport, SweepReport,
};
use edunexia::workflows::enrollments::EnrollmentRepository;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct SweepArgs {
    /// Days an enrollment must stay `inadimplente` before it is cancelled
    #[arg(
        long,
        value_parser = clap::value_parser!(i64).range(1..=SweepConfig::MAX_THRESHOLD_DAYS)
    )]
    pub(crate) threshold_days: Option<i64>,
    #[command(flatten)]
    pub(crate) store: StoreArgs,
}

pub(crate) async fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(days) = args.threshold_days {
        config.sweep.threshold_days = days;
    }
    telemetry::init(&config.telemetry)?;

    let report = match Backend::from_config(&config, args.store.seed.as_deref())? {
        Backend::Gateway(gateway) => sweep_with(&config, gateway.clone(), gateway).await?,
        Backend::Memory(store) => sweep_with(&config, store.clone(), store).await?,
    };
    render_sweep_report(&report);
    Ok(())
}

pub(crate) async fn run_reconcile(args: StoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let report = match Backend::from_config(&config, args.seed.as_deref())? {
        Backend::Gateway(gateway) => reconcile_with(&config, gateway.clone(), gateway).await?,
        Backend::Memory(store) => reconcile_with(&config, store.clone(), store).await?,
    };
    render_reconciliation_report(&report);
    Ok(())
}

async fn sweep_with<E, C>(
    config: &AppConfig,
    enrollments: Arc<E>,
    requests: Arc<C>,
) -> Result<SweepReport, AppError>
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    let service = cancellation_service(enrollments, requests, config);
    Ok(service.run_sweep().await?)
}

async fn reconcile_with<E, C>(
    config: &AppConfig,
    enrollments: Arc<E>,
    requests: Arc<C>,
) -> Result<ReconciliationReport, AppError>
where
    E: EnrollmentRepository + 'static,
    C: CancellationRepository + 'static,
{
    let service = cancellation_service(enrollments, requests, config);
    Ok(service.reconcile().await?)
}

pub(crate) fn render_sweep_report(report: &SweepReport) {
    println!(
        "Delinquency sweep (threshold {} days, cutoff {})",
        report.threshold_days,
        report.cutoff.format("%Y-%m-%d %H:%M UTC")
    );
    println!(
        "- {} candidates | {} cancelled | {} skipped (pending request) | {} failed",
        report.candidates,
        report.cancelled,
        report.skipped.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  - {}: {}", failure.enrollment_id, failure.error);
    }
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(err) => println!("Report payload unavailable: {}", err),
    }
}

fn render_reconciliation_report(report: &ReconciliationReport) {
    println!("Reconciliation of approved cancellation requests");
    println!(
        "- {} enrollments examined | {} repaired | {} failed",
        report.examined,
        report.repaired.len(),
        report.failures.len()
    );
    for enrollment_id in &report.repaired {
        println!("  - cancelled {}", enrollment_id);
    }
    for failure in &report.failures {
        println!("  - {}: {}", failure.enrollment_id, failure.error);
    }
}
