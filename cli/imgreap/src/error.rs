//! Error handling and display for the CLI.

use std::process::ExitCode;

use colored::Colorize;
use imgreap_retention::PolicyError;
use imgreap_store::StoreError;
use thiserror::Error;

/// Process exit statuses.
pub mod exit {
    /// Completed, including "nothing to do" and runs with skips or some failures.
    pub const SUCCESS: u8 = 0;
    /// The image store could not be read.
    pub const STORE_UNAVAILABLE: u8 = 1;
    /// Invalid flags or environment.
    pub const CONFIG_INVALID: u8 = 2;
    /// Every attempted removal failed.
    pub const ALL_FAILED: u8 = 3;
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum CliError {
    /// Rejected before any store access.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The inventory or usage could not be read.
    #[error("{0}")]
    StoreUnavailable(#[source] StoreError),
}

impl CliError {
    /// Numeric exit status for this error.
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::ConfigInvalid(_) => exit::CONFIG_INVALID,
            Self::StoreUnavailable(_) => exit::STORE_UNAVAILABLE,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}

impl From<PolicyError> for CliError {
    fn from(err: PolicyError) -> Self {
        Self::ConfigInvalid(err.to_string())
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &CliError) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    match err {
        CliError::ConfigInvalid(_) => {
            eprintln!(
                "\n{}",
                "Hint: Run `imgreap --help` for accepted flags and values.".yellow()
            );
        }
        CliError::StoreUnavailable(StoreError::Unavailable(_)) => {
            eprintln!(
                "\n{}",
                "Hint: Check that the Docker daemon is running and --docker-host points at its socket."
                    .yellow()
            );
        }
        CliError::StoreUnavailable(StoreError::Api { status: 403, .. }) => {
            eprintln!(
                "\n{}",
                "Hint: You may not have permission to use the Docker socket.".yellow()
            );
        }
        CliError::StoreUnavailable(_) => {}
    }
}
