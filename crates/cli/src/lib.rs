//! Fleet Shell CLI Library
//!
//! This crate provides the interactive front end of fleet-shell. It parses the
//! command line, runs the read-execute loop and renders per-host results.
//!
//! # Architecture
//!
//! - [`cli_args`]: Command-line argument parsing
//! - [`session`]: The prompt loop and its colored output
//!
//! # Examples
//!
//! ```bash
//! # Start a session over an INI inventory
//! fsh -i ./hosts
//!
//! # Decrypt vaulted variables with a password file, 10 hosts at a time
//! fsh -i site.yml --vault-password-file ~/.vault_pass -f 10
//! ```
//!
//! Inside the session:
//!
//! ```text
//! fsh [all]> cd web:!web3
//! fsh [web:!web3]> serial 2
//! fsh [web:!web3 (serial 2)]> !uptime
//! ```

pub mod cli_args;
pub mod session;
