//! Built-in modules and what each one runs on a host.

use std::process::Output;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::engine::template::{self, RenderError};
use crate::engine::{CommandSpec, HostResult};
use crate::error::{Error, Result};
use crate::inventory::Variables;
use crate::vault::Secret;

/// Prints one `key=value` line per fact using only POSIX tools.
const FACTS_SCRIPT: &str = r#"printf 'ansible_hostname=%s\n' "$(uname -n | cut -d. -f1)"
printf 'ansible_nodename=%s\n' "$(uname -n)"
printf 'ansible_system=%s\n' "$(uname -s)"
printf 'ansible_kernel=%s\n' "$(uname -r)"
printf 'ansible_architecture=%s\n' "$(uname -m)"
printf 'ansible_user_id=%s\n' "$(id -un)"
printf 'ansible_user_dir=%s\n' "$HOME""#;

const PING_SCRIPT: &str = "echo pong";

#[derive(Serialize)]
struct PingReport<'a> {
    ping: &'a str,
}

#[derive(Serialize)]
struct SetupReport {
    ansible_facts: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    /// A literal command line, from `!` or the `shell`/`command` modules.
    Shell,
    Setup,
    Ping,
    Debug,
}

/// How the raw output of a host is turned into a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Raw,
    Facts,
    Ping,
}

/// What to do for one host once templates have been rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Run {
        command_line: String,
        format: OutputFormat,
    },
    /// Report a message without contacting the host.
    Report(String),
}

impl Module {
    /// Picks the module for a command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineFatal`] for a module that does not exist or is
    /// missing required arguments.
    pub fn for_spec(spec: &CommandSpec) -> Result<Self> {
        match spec {
            CommandSpec::Shell(_) => Ok(Module::Shell),
            CommandSpec::Module { name, args } => match name.as_str() {
                "shell" | "command" | "raw" if args.trim().is_empty() => Err(Error::EngineFatal(format!(
                    "module `{name}` needs a command to run"
                ))),
                "shell" | "command" | "raw" => Ok(Module::Shell),
                "setup" => Ok(Module::Setup),
                "ping" => Ok(Module::Ping),
                "debug" => Ok(Module::Debug),
                _ => Err(Error::EngineFatal(format!("unknown module `{name}`"))),
            },
        }
    }

    /// Renders the module's arguments for one host.
    ///
    /// # Errors
    ///
    /// See [`template::render`].
    pub fn prepare(
        self,
        spec: &CommandSpec,
        variables: &Variables,
        secret: Option<&Secret>,
    ) -> std::result::Result<Action, RenderError> {
        let arguments = match spec {
            CommandSpec::Shell(command_line) => command_line.clone(),
            CommandSpec::Module { args, .. } => args.clone(),
        };

        match self {
            Module::Shell => Ok(Action::Run {
                command_line: template::render(&arguments, variables, secret)?,
                format: OutputFormat::Raw,
            }),
            Module::Setup => Ok(Action::Run {
                command_line: FACTS_SCRIPT.to_string(),
                format: OutputFormat::Facts,
            }),
            Module::Ping => Ok(Action::Run {
                command_line: PING_SCRIPT.to_string(),
                format: OutputFormat::Ping,
            }),
            Module::Debug => debug_message(&arguments, variables, secret).map(Action::Report),
        }
    }
}

fn debug_message(
    arguments: &str,
    variables: &Variables,
    secret: Option<&Secret>,
) -> std::result::Result<String, RenderError> {
    if let Some(name) = arguments.strip_prefix("var=") {
        let name = name.trim();
        return match template::lookup(name, variables, secret)? {
            Some(value) => Ok(format!("{name}: {value}")),
            None => Err(RenderError::Host(format!("undefined variable `{name}`"))),
        };
    }

    let message = arguments.strip_prefix("msg=").unwrap_or(arguments);
    let message = if message.is_empty() {
        "Hello world!"
    } else {
        message
    };
    template::render(message, variables, secret)
}

/// Turns a finished process into a host result.
#[must_use]
pub fn interpret(host: &str, format: OutputFormat, output: &Output) -> HostResult {
    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();

    if !output.status.success() {
        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |code| code.to_string());
        let error = if stderr.is_empty() {
            format!("rc={code}")
        } else {
            format!("rc={code}: {stderr}")
        };
        return HostResult::failure(host, stdout, error);
    }

    match format {
        OutputFormat::Raw => HostResult::success(host, stdout),
        OutputFormat::Ping => pretty(host, &PingReport { ping: &stdout }),
        OutputFormat::Facts => pretty(host, &facts_report(&stdout)),
    }
}

fn facts_report(stdout: &str) -> SetupReport {
    let ansible_facts = stdout
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), Value::String(value.trim().to_string())))
        .collect();

    SetupReport { ansible_facts }
}

fn pretty(host: &str, report: &impl Serialize) -> HostResult {
    match serde_json::to_string_pretty(report) {
        Ok(text) => HostResult::success(host, text),
        Err(e) => HostResult::failure(host, String::new(), format!("could not render result: {e}")),
    }
}
