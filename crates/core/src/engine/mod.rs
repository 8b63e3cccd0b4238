//! Execution of commands on a batch of hosts.
//!
//! The dispatcher hands one batch at a time to an [`ExecutionEngine`] and
//! waits for its [`BatchReport`]. How the engine fans out over the hosts of a
//! batch is its own business.

use std::fmt::{Display, Formatter};

use crate::error::Result;
use crate::inventory::Inventory;
use crate::vault::Secret;

mod host;
pub mod modules;
pub mod template;
pub mod transport;

pub use host::HostEngine;

/// What to run on each host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// A literal shell command line.
    Shell(String),
    /// A named module with the rest of the line, kept verbatim.
    Module { name: String, args: String },
}

impl Display for CommandSpec {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandSpec::Shell(command) => write!(formatter, "!{command}"),
            CommandSpec::Module { name, args } if args.is_empty() => formatter.write_str(name),
            CommandSpec::Module { name, args } => write!(formatter, "{name} {args}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Success,
    Failure,
}

/// Outcome of a command on one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResult {
    pub host: String,
    pub status: HostStatus,
    pub output: String,
    pub error: Option<String>,
}

impl HostResult {
    #[must_use]
    pub fn success(host: &str, output: String) -> Self {
        Self {
            host: host.to_string(),
            status: HostStatus::Success,
            output,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(host: &str, output: String, error: String) -> Self {
        Self {
            host: host.to_string(),
            status: HostStatus::Failure,
            output,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == HostStatus::Success
    }
}

/// Results for one batch, in the batch's host order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub results: Vec<HostResult>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &HostResult> {
        self.results.iter().filter(|result| !result.is_success())
    }
}

/// Runs commands on hosts.
pub trait ExecutionEngine {
    /// Runs `spec` on every host of `hosts` and reports per-host outcomes.
    ///
    /// Per-host problems are reported as failed [`HostResult`]s. Implementations
    /// must check everything that needs the vault password before running
    /// anything, so that a call can be repeated with a credential.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::SecretRequired`] when encrypted content is
    /// met and `credential` is `None`, and any other error when the engine
    /// itself cannot proceed.
    fn run_on_hosts(
        &self,
        inventory: &Inventory,
        hosts: &[String],
        spec: &CommandSpec,
        credential: Option<&Secret>,
    ) -> Result<BatchReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_display() {
        assert_eq!(CommandSpec::Shell("uptime".to_string()).to_string(), "!uptime");
        assert_eq!(
            CommandSpec::Module {
                name: "setup".to_string(),
                args: String::new()
            }
            .to_string(),
            "setup"
        );
        assert_eq!(
            CommandSpec::Module {
                name: "debug".to_string(),
                args: "msg=hi".to_string()
            }
            .to_string(),
            "debug msg=hi"
        );
    }

    #[test]
    fn test_batch_report_failures() {
        let report = BatchReport {
            results: vec![
                HostResult::success("a", "ok".to_string()),
                HostResult::failure("b", String::new(), "rc=1".to_string()),
            ],
        };

        let failed: Vec<&str> = report.failures().map(|result| result.host.as_str()).collect();
        assert_eq!(failed, vec!["b"]);
    }
}
