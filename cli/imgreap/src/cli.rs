//! Command-line arguments.

use clap::Parser;

use crate::logging::LogFormat;
use crate::output::OutputFormat;

/// Cleans up old images from local storage with retention controls.
///
/// REPOSITORIES are the repository names to clean (e.g. `my/app`, `ubuntu`).
/// An image is kept when it is among the newest `--num-recent` images of a
/// repository, is at most `--min-age-days` old, or is used by any container.
#[derive(Debug, Parser)]
#[command(name = "imgreap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Repositories to clean.
    #[arg(required = true, value_name = "REPOSITORY")]
    pub repositories: Vec<String>,

    /// Number of most recent images to keep per repository.
    #[arg(
        long,
        env = "IMGREAP_NUM_RECENT",
        default_value_t = 5,
        allow_negative_numbers = true
    )]
    pub num_recent: i64,

    /// Minimum age in days under which images are always kept.
    #[arg(
        long,
        env = "IMGREAP_MIN_AGE_DAYS",
        default_value_t = 30,
        allow_negative_numbers = true
    )]
    pub min_age_days: i64,

    /// Simulate removal without changing the image store.
    #[arg(long, env = "IMGREAP_DRY_RUN")]
    pub dry_run: bool,

    /// Docker daemon address (only `unix://` sockets are supported).
    #[arg(long, env = "DOCKER_HOST", default_value = "unix:///var/run/docker.sock")]
    pub docker_host: String,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Log line format (logs go to stderr).
    #[arg(long, value_enum, env = "IMGREAP_LOG_FORMAT", default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, env = "IMGREAP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
