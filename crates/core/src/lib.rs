//! Fleet Shell Core Library
//!
//! This crate provides the core functionality for fleet-shell, an interactive
//! shell for running ad-hoc commands across the hosts of an Ansible-style
//! inventory, with vault-encrypted variables decrypted on demand.
//!
//! # Key Features
//!
//! - **Inventory**: YAML and INI inventories with `group_vars`/`host_vars`
//! - **Scope Navigation**: `cd` into groups, hosts and patterns like `web:&prod:!web3`
//! - **Batching**: split a run into sequential batches with `serial`
//! - **Vault**: a lazy, cached vault password and Ansible Vault 1.1 envelopes
//! - **Execution**: built-in modules and shell commands run over `ssh` or locally
//!
//! # Examples
//!
//! Resolving a scope and planning batches:
//!
//! ```
//! use fleet_shell_core::batch::plan;
//! use fleet_shell_core::inventory::Inventory;
//! use fleet_shell_core::scope::{ScopeNavigator, ScopeState};
//!
//! let inventory = Inventory::from_ini_str("[web]\nweb1\nweb2\nweb3\n");
//! let navigator = ScopeNavigator::new(&inventory);
//! let mut scope = ScopeState::default();
//!
//! navigator.navigate(&mut scope, "web")?;
//! navigator.set_serial(&mut scope, 2);
//!
//! let hosts = navigator.resolve_current_hosts(&scope)?;
//! assert_eq!(plan(&hosts, scope.serial()).len(), 2);
//! # Ok::<(), fleet_shell_core::error::Error>(())
//! ```

pub mod batch;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod scope;
pub mod vault;
