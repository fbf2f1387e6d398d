use crate::demo::{run_demo, DemoArgs};
use crate::jobs::{run_reconcile, run_sweep, SweepArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use edunexia::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Edunexia Enrollment Service",
    about = "Serve and operate the Edunexia enrollment cancellation workflows",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Cancel enrollments delinquent for longer than the configured threshold
    Sweep(SweepArgs),
    /// Finish approved requests whose enrollment was never cancelled
    Reconcile(StoreArgs),
    /// Walk through request, review, and sweep against an in-memory store
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct StoreArgs {
    /// Seed the in-memory store from a `matriculas` CSV export (ignored with GATEWAY_URL)
    #[arg(long)]
    pub(crate) seed: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[command(flatten)]
    pub(crate) store: StoreArgs,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Sweep(args) => run_sweep(args).await,
        Command::Reconcile(args) => run_reconcile(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
