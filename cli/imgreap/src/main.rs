//! imgreap - prune old images from the local image store.

use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use imgreap::error::{exit, print_error};
use imgreap::output::print_report;
use imgreap::{logging, Cli, CliError, RunConfig};
use imgreap_store::DockerStore;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_format, &cli.log_level) {
        eprintln!("{} failed to initialize logging: {e}", "Error:".red().bold());
        return ExitCode::from(exit::CONFIG_INVALID);
    }

    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            print_error(&e);
            e.exit_code()
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode, CliError> {
    let config = RunConfig::from_cli(cli)?;
    info!(
        repositories = ?config.repositories,
        num_recent = config.policy.num_recent(),
        min_age_days = config.policy.min_age_days(),
        dry_run = config.dry_run,
        "Starting imgreap"
    );

    let store = DockerStore::connect(&config.docker_socket)
        .await
        .map_err(CliError::StoreUnavailable)?;

    let report = imgreap::run(&store, &config, Utc::now()).await?;

    if let Err(e) = print_report(&report, config.format) {
        eprintln!("{} failed to render report: {e}", "Error:".red().bold());
    }
    Ok(report.exit_code())
}
