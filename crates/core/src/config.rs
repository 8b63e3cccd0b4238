//! Configuration path utilities for fleet-shell.
//!
//! This module provides the session defaults and helpers for resolving the
//! inventory path, its variable directories and the shell used for local runs.

use std::path::{Path, PathBuf};

/// Default shell to use for local command execution
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Default number of hosts a batch fans out to at the same time
pub const DEFAULT_FORKS: usize = 5;

/// Name of the group every host belongs to
pub const ROOT_GROUP: &str = "all";

const GROUP_VARS_DIRECTORY: &str = "group_vars";
const HOST_VARS_DIRECTORY: &str = "host_vars";

/// Resolves a user supplied path, expanding shell variables like `~`.
///
/// # Examples
///
/// ```
/// use fleet_shell_core::config::expand_path;
///
/// let expanded = expand_path("~/inventory.yml");
/// assert!(!expanded.starts_with("~"));
/// ```
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Resolves the shell used for local execution from `$SHELL`, falling back to
/// [`DEFAULT_SHELL`].
pub fn get_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| DEFAULT_SHELL.to_string())
}

/// The `group_vars` directory that sits next to an inventory file.
pub fn group_vars_directory(inventory_path: &Path) -> PathBuf {
    sibling_directory(inventory_path, GROUP_VARS_DIRECTORY)
}

/// The `host_vars` directory that sits next to an inventory file.
pub fn host_vars_directory(inventory_path: &Path) -> PathBuf {
    sibling_directory(inventory_path, HOST_VARS_DIRECTORY)
}

fn sibling_directory(inventory_path: &Path, name: &str) -> PathBuf {
    match inventory_path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}
