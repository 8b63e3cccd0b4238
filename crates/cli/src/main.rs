use std::io::{self, stdin, stdout, IsTerminal};
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::Parser;
use fleet_shell_cli::cli_args::Args;
use fleet_shell_cli::session::Session;
use fleet_shell_core::config;
use fleet_shell_core::dispatcher::CommandDispatcher;
use fleet_shell_core::engine::HostEngine;
use fleet_shell_core::error::{Error, Result};
use fleet_shell_core::inventory::Inventory;
use fleet_shell_core::scope::ScopeState;
use fleet_shell_core::vault::VaultPasswordBroker;
use log::{debug, info};

fn use_color(args: &Args) -> bool {
    !args.no_color && std::env::var_os("NO_COLOR").is_none() && stdout().is_terminal()
}

fn execute() -> Result<()> {
    let args = Args::parse();

    let inventory_path = args.inventory_path();
    debug!("Inventory path: `{}`", inventory_path.display());
    let inventory = Inventory::load(&inventory_path)?;

    let broker = VaultPasswordBroker::from_password_file(args.vault_password_path());
    let engine = HostEngine::new(args.forks, config::get_shell())?;
    let mut dispatcher = CommandDispatcher::new(inventory, engine, broker);

    // Ctrl-C cancels the running command, not the session.
    let cancelled = dispatcher.cancel_token();
    ctrlc::set_handler(move || cancelled.store(true, Ordering::SeqCst))
        .map_err(|e| Error::Stdio(io::Error::other(e)))?;

    info!(
        "Session started with {} host(s), {} fork(s)",
        dispatcher.inventory().host_names().count(),
        args.forks
    );

    let color = use_color(&args);
    let mut session = Session::new(dispatcher, ScopeState::with_serial(args.serial), color);
    session.run(stdin().lock(), &mut stdout())
}

fn main() -> ExitCode {
    env_logger::init();

    match execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
