//! imgreap - prune old images from the local image store.
//!
//! One invocation reads the inventory of the requested repositories and the
//! container usage, plans removals with the retention engine, applies them
//! one at a time and reports the outcome.
//!
//! ## Modules
//!
//! - `cli`: command-line arguments
//! - `config`: validated, immutable run configuration
//! - `executor`: applies a plan to the image store
//! - `report`: run outcome counters
//! - `output`: text and JSON rendering of a report
//! - `logging`: tracing subscriber setup

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod output;
pub mod report;
pub mod run;

pub use cli::Cli;
pub use config::RunConfig;
pub use error::CliError;
pub use executor::Executor;
pub use report::{Failure, FailureKind, RunReport};
pub use run::run;
