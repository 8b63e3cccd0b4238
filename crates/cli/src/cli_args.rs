//! Command-line argument parsing.
//!
//! This module defines the command-line interface of the `fsh` binary using
//! the `clap` crate.

use std::path::PathBuf;

use clap::Parser;
use fleet_shell_core::config::{expand_path, DEFAULT_FORKS};

/// Command-line arguments for the fleet-shell CLI tool.
///
/// # Examples
///
/// ```rust
/// use clap::Parser;
/// use fleet_shell_cli::cli_args::Args;
///
/// let args = Args::parse_from(["fsh", "-i", "hosts.yml", "-f", "10"]);
/// assert_eq!(args.forks, 10);
/// ```
#[derive(Parser, Debug)] // requires `derive` feature
#[command(term_width = 0)] // Just to make testing across clap features easier
pub struct Args {
    /// Path to the inventory file, YAML (`.yml`/`.yaml`) or INI.
    #[arg(long, short = 'i')]
    pub inventory: String,

    /// File holding the vault password.
    ///
    /// If not provided, the password is prompted for the first time an
    /// encrypted value is needed.
    #[arg(long)]
    pub vault_password_file: Option<String>,

    /// Maximum number of hosts a batch runs on at the same time.
    #[arg(long, short = 'f', default_value_t = DEFAULT_FORKS)]
    pub forks: usize,

    /// Initial batch size, 0 runs every host in one batch.
    #[arg(long, short = 's', default_value_t = 0)]
    pub serial: usize,

    /// Disable colored output.
    #[arg(long, action)]
    pub no_color: bool,
}

impl Args {
    #[must_use]
    pub fn inventory_path(&self) -> PathBuf {
        expand_path(&self.inventory)
    }

    #[must_use]
    pub fn vault_password_path(&self) -> Option<PathBuf> {
        self.vault_password_file.as_deref().map(expand_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_values() {
        let args = Args::parse_from(["fsh", "-i", "hosts"]);

        assert_eq!(args.inventory, "hosts");
        assert!(args.vault_password_file.is_none());
        assert_eq!(args.forks, 5);
        assert_eq!(args.serial, 0);
        assert!(!args.no_color);
    }

    #[test]
    fn test_args_short_flags() {
        let args = Args::parse_from(["fsh", "-i", "/etc/ansible/hosts", "-f", "20", "-s", "3"]);

        assert_eq!(args.inventory, "/etc/ansible/hosts");
        assert_eq!(args.forks, 20);
        assert_eq!(args.serial, 3);
    }

    #[test]
    fn test_args_long_flags() {
        let args = Args::parse_from([
            "fsh",
            "--inventory",
            "site.yml",
            "--vault-password-file",
            "/tmp/vault-pass",
            "--forks",
            "2",
            "--serial",
            "1",
            "--no-color",
        ]);

        assert_eq!(args.inventory, "site.yml");
        assert_eq!(args.vault_password_path(), Some(PathBuf::from("/tmp/vault-pass")));
        assert_eq!(args.forks, 2);
        assert_eq!(args.serial, 1);
        assert!(args.no_color);
    }

    #[test]
    fn test_inventory_is_required() {
        assert!(Args::try_parse_from(["fsh"]).is_err());
    }

    #[test]
    fn test_negative_serial_is_rejected() {
        assert!(Args::try_parse_from(["fsh", "-i", "hosts", "-s", "-1"]).is_err());
    }
}
