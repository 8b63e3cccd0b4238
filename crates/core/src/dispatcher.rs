//! Turns one line of session input into navigation or a batched run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::batch;
use crate::engine::{BatchReport, CommandSpec, ExecutionEngine};
use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::scope::{ScopeNavigator, ScopeState};
use crate::vault::VaultPasswordBroker;

pub const HELP_TEXT: &str = "\
cd <pattern>     change scope to a group, host or pattern (no pattern: all)
serial <n>       run at most n hosts per batch, 0 for a single batch
!<command>       run a shell command on every host in scope
<module> [args]  run a module: setup, ping, shell, command, debug
list, ls         show the hosts in scope
reload           re-read the inventory from disk
help, ?          show this help
exit             leave the shell";

/// A parsed line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Navigate(String),
    SetSerial(usize),
    Run(CommandSpec),
    List,
    Reload,
    Help,
    Exit,
    Empty,
}

/// Where a batch sits in the sequence for the current command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub index: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub hosts: usize,
    pub failed: Vec<String>,
}

/// What a line did, for the session to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Navigated(String),
    SerialSet(usize),
    Listed {
        hosts: Vec<String>,
        groups: Vec<String>,
    },
    Reloaded {
        scope_reset: bool,
    },
    Help,
    NoHostsMatched,
    Ran(RunSummary),
    Exit,
    Empty,
}

/// Parses a line of input.
///
/// # Errors
///
/// Returns [`Error::Parse`] for malformed `serial`, `cd` or `!` lines.
pub fn parse_line(line: &str) -> Result<Intent> {
    let line = line.trim();

    if line.is_empty() {
        return Ok(Intent::Empty);
    }

    if let Some(command_line) = line.strip_prefix('!') {
        let command_line = command_line.trim();
        if command_line.is_empty() {
            return Err(Error::parse("`!` needs a shell command"));
        }
        return Ok(Intent::Run(CommandSpec::Shell(command_line.to_string())));
    }

    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));
    let args: Vec<&str> = rest.split_whitespace().collect();

    match verb {
        "cd" => match args.as_slice() {
            [] => Ok(Intent::Navigate(crate::config::ROOT_GROUP.to_string())),
            [target] => Ok(Intent::Navigate((*target).to_string())),
            _ => Err(Error::parse("`cd` takes a single pattern")),
        },
        "serial" => match args.as_slice() {
            [size] => size
                .parse::<usize>()
                .map(Intent::SetSerial)
                .map_err(|_| Error::parse(format!("`{size}` is not a valid batch size"))),
            _ => Err(Error::parse("`serial` takes a single non-negative number")),
        },
        "exit" | "quit" if args.is_empty() => Ok(Intent::Exit),
        "list" | "ls" if args.is_empty() => Ok(Intent::List),
        "reload" if args.is_empty() => Ok(Intent::Reload),
        "help" | "?" => Ok(Intent::Help),
        _ => Ok(Intent::Run(CommandSpec::Module {
            name: verb.to_string(),
            args: rest.to_string(),
        })),
    }
}

/// Executes session input against an inventory with an engine.
pub struct CommandDispatcher<E> {
    inventory: Inventory,
    engine: E,
    broker: VaultPasswordBroker,
    cancelled: Arc<AtomicBool>,
}

impl<E: ExecutionEngine> CommandDispatcher<E> {
    pub fn new(inventory: Inventory, engine: E, broker: VaultPasswordBroker) -> Self {
        Self {
            inventory,
            engine,
            broker,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A flag that, once set, stops the running command before its next batch.
    #[must_use]
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    #[must_use]
    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Executes one line of input, streaming batch reports to `on_batch`.
    ///
    /// # Errors
    ///
    /// Parse and navigation errors leave `scope` untouched. During a run,
    /// an unavailable vault password, an engine-fatal error or an interrupt
    /// stops the remaining batches; reports already streamed stand.
    pub fn execute<F>(&mut self, scope: &mut ScopeState, line: &str, on_batch: F) -> Result<CommandResult>
    where
        F: FnMut(BatchProgress, &BatchReport),
    {
        match parse_line(line)? {
            Intent::Empty => Ok(CommandResult::Empty),
            Intent::Exit => Ok(CommandResult::Exit),
            Intent::Help => Ok(CommandResult::Help),
            Intent::Navigate(target) => {
                ScopeNavigator::new(&self.inventory).navigate(scope, &target)?;
                Ok(CommandResult::Navigated(target))
            }
            Intent::SetSerial(serial) => {
                ScopeNavigator::new(&self.inventory).set_serial(scope, serial);
                Ok(CommandResult::SerialSet(serial))
            }
            Intent::List => self.list(scope),
            Intent::Reload => self.reload(scope),
            Intent::Run(spec) => self.run(scope, &spec, on_batch),
        }
    }

    fn list(&self, scope: &ScopeState) -> Result<CommandResult> {
        let hosts = ScopeNavigator::new(&self.inventory).resolve_current_hosts(scope)?;
        let groups = if scope.scope() == crate::config::ROOT_GROUP {
            self.inventory.group_names().cloned().collect()
        } else {
            Vec::new()
        };

        Ok(CommandResult::Listed { hosts, groups })
    }

    fn reload(&mut self, scope: &mut ScopeState) -> Result<CommandResult> {
        self.inventory = self.inventory.reload()?;

        let scope_reset = ScopeNavigator::new(&self.inventory).revalidate(scope);
        if scope_reset {
            warn!("Scope no longer matches after reload, back to `{}`", scope.scope());
        }
        info!("Inventory reloaded");

        Ok(CommandResult::Reloaded { scope_reset })
    }

    fn run<F>(&mut self, scope: &ScopeState, spec: &CommandSpec, mut on_batch: F) -> Result<CommandResult>
    where
        F: FnMut(BatchProgress, &BatchReport),
    {
        let hosts = ScopeNavigator::new(&self.inventory).resolve_current_hosts(scope)?;
        if hosts.is_empty() {
            return Ok(CommandResult::NoHostsMatched);
        }

        let batches = batch::plan(&hosts, scope.serial());
        let total = batches.len();
        debug!("Running `{}` on `{}` in {} batch(es)", spec, scope.scope(), total);

        self.cancelled.store(false, Ordering::SeqCst);
        let mut summary = RunSummary {
            batches: 0,
            hosts: hosts.len(),
            failed: Vec::new(),
        };

        for (index, hosts) in batches.iter().enumerate() {
            if self.cancelled.swap(false, Ordering::SeqCst) {
                warn!("Interrupted after {} of {} batch(es)", index, total);
                return Err(Error::Interrupted);
            }

            let report = self.run_batch(hosts, spec)?;
            on_batch(BatchProgress { index, total }, &report);

            summary
                .failed
                .extend(report.failures().map(|result| result.host.clone()));
            summary.batches += 1;
        }

        Ok(CommandResult::Ran(summary))
    }

    fn run_batch(&self, hosts: &[String], spec: &CommandSpec) -> Result<BatchReport> {
        let credential = self.broker.peek();

        match self
            .engine
            .run_on_hosts(&self.inventory, hosts, spec, credential.as_ref())
        {
            Err(Error::SecretRequired) if credential.is_none() => {
                debug!("Batch needs the vault password");
                let secret = self.broker.acquire()?;
                self.engine
                    .run_on_hosts(&self.inventory, hosts, spec, Some(&secret))
            }
            other => other,
        }
    }
}
