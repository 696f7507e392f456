//! Run configuration.
//!
//! Flags and environment fallbacks are resolved once at startup into a
//! [`RunConfig`]; nothing downstream reads the environment again.

use std::path::PathBuf;

use imgreap_retention::{validate_repository, RetentionPolicy};
use tracing::warn;

use crate::cli::Cli;
use crate::error::CliError;
use crate::output::OutputFormat;

const UNIX_SCHEME: &str = "unix://";

/// Immutable configuration for one cleanup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Repositories to clean, deduplicated, in the order given.
    pub repositories: Vec<String>,
    pub policy: RetentionPolicy,
    pub dry_run: bool,
    /// Path of the Docker daemon socket.
    pub docker_socket: PathBuf,
    pub format: OutputFormat,
}

impl RunConfig {
    /// Validates command-line input. Runs before any store access.
    pub fn from_cli(cli: Cli) -> Result<Self, CliError> {
        let policy = RetentionPolicy::new(cli.num_recent, cli.min_age_days)?;

        let mut repositories: Vec<String> = Vec::with_capacity(cli.repositories.len());
        for repository in cli.repositories {
            validate_repository(&repository)?;
            if repositories.contains(&repository) {
                warn!(repository = %repository, "Ignoring duplicate repository");
                continue;
            }
            repositories.push(repository);
        }

        Ok(Self {
            repositories,
            policy,
            dry_run: cli.dry_run,
            docker_socket: parse_docker_host(&cli.docker_host)?,
            format: cli.format,
        })
    }
}

/// Extracts the socket path from a `unix://` docker host.
pub fn parse_docker_host(host: &str) -> Result<PathBuf, CliError> {
    match host.strip_prefix(UNIX_SCHEME) {
        Some(path) if path.starts_with('/') => Ok(PathBuf::from(path)),
        Some(_) => Err(CliError::ConfigInvalid(format!(
            "docker host {host:?} must name an absolute socket path"
        ))),
        None => Err(CliError::ConfigInvalid(format!(
            "unsupported docker host {host:?}: only unix:// sockets are supported"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Result<RunConfig, CliError> {
        let mut argv = vec!["imgreap"];
        argv.extend_from_slice(args);
        RunConfig::from_cli(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_valid_config() {
        let config = parse(&["web", "org/api", "--num-recent", "3", "--dry-run"]).unwrap();
        assert_eq!(config.repositories, vec!["web", "org/api"]);
        assert_eq!(config.policy.num_recent(), 3);
        assert_eq!(config.policy.min_age_days(), 30);
        assert!(config.dry_run);
        assert_eq!(config.docker_socket, PathBuf::from("/var/run/docker.sock"));
    }

    #[test]
    fn test_duplicate_repositories_are_collapsed() {
        let config = parse(&["web", "api", "web"]).unwrap();
        assert_eq!(config.repositories, vec!["web", "api"]);
    }

    #[test]
    fn test_negative_policy_is_invalid() {
        let err = parse(&["web", "--num-recent", "-2"]).unwrap_err();
        assert!(matches!(err, CliError::ConfigInvalid(_)));
        let err = parse(&["web", "--min-age-days", "-1"]).unwrap_err();
        assert!(matches!(err, CliError::ConfigInvalid(_)));
    }

    #[test]
    fn test_tagged_repository_is_invalid() {
        let err = parse(&["web:latest"]).unwrap_err();
        assert!(err.to_string().contains("without a tag"));
    }

    #[test]
    fn test_docker_host_parsing() {
        assert_eq!(
            parse_docker_host("unix:///run/user/1000/docker.sock").unwrap(),
            PathBuf::from("/run/user/1000/docker.sock")
        );
        assert!(parse_docker_host("tcp://127.0.0.1:2375").is_err());
        assert!(parse_docker_host("unix://docker.sock").is_err());
    }
}
