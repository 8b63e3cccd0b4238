//! How a command reaches a host: a local shell or `ssh`.

use std::process::{Command, Output, Stdio};

use crate::engine::template;
use crate::error::Result;
use crate::inventory::Variables;
use crate::vault::Secret;

const CONNECTION_VARIABLE: &str = "ansible_connection";
const HOST_VARIABLE: &str = "ansible_host";
const PORT_VARIABLE: &str = "ansible_port";
const USER_VARIABLE: &str = "ansible_user";

const SSH_PROGRAM: &str = "ssh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    Local,
    Ssh {
        address: String,
        port: Option<String>,
        user: Option<String>,
    },
}

impl Connection {
    /// Works out the connection for `host` from its variables.
    ///
    /// Returns `Ok(Err(..))` when the host asks for a transport that is not
    /// supported.
    ///
    /// # Errors
    ///
    /// Returns an error if a connection variable is vaulted and cannot be
    /// revealed.
    pub fn for_host(
        host: &str,
        variables: &Variables,
        secret: Option<&Secret>,
    ) -> Result<std::result::Result<Self, String>> {
        let connection = defined(CONNECTION_VARIABLE, variables, secret)?;

        match connection.as_deref() {
            Some("local") => Ok(Ok(Connection::Local)),
            None | Some("ssh" | "smart" | "paramiko") => Ok(Ok(Connection::Ssh {
                address: defined(HOST_VARIABLE, variables, secret)?
                    .unwrap_or_else(|| host.to_string()),
                port: defined(PORT_VARIABLE, variables, secret)?,
                user: defined(USER_VARIABLE, variables, secret)?,
            })),
            Some(other) => Ok(Err(format!("unsupported connection type `{other}`"))),
        }
    }

    /// Builds the process that runs `command_line` over this connection.
    #[must_use]
    pub fn command(&self, shell: &str, command_line: &str) -> Command {
        let mut command = match self {
            Connection::Local => {
                let mut command = Command::new(shell);
                command.arg("-c").arg(command_line);
                command
            }
            Connection::Ssh {
                address,
                port,
                user,
            } => {
                let mut command = Command::new(SSH_PROGRAM);
                command.args(["-o", "BatchMode=yes"]);
                if let Some(port) = port {
                    command.arg("-p").arg(port);
                }
                match user {
                    Some(user) => command.arg(format!("{user}@{address}")),
                    None => command.arg(address),
                };
                command.arg("--").arg(command_line);
                command
            }
        };

        command.stdin(Stdio::null());
        command
    }

    /// Runs `command_line` and captures its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    pub fn run(&self, shell: &str, command_line: &str) -> std::io::Result<Output> {
        self.command(shell, command_line).output()
    }
}

fn defined(name: &str, variables: &Variables, secret: Option<&Secret>) -> Result<Option<String>> {
    Ok(template::lookup(name, variables, secret)?.filter(|value| !value.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Variable;
    use serde_yaml::Value;

    fn variables(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(key, value)| {
                (
                    (*key).to_string(),
                    Variable::Plain(Value::String((*value).to_string())),
                )
            })
            .collect()
    }

    #[test]
    fn test_local_connection() {
        let connection =
            Connection::for_host("localhost", &variables(&[("ansible_connection", "local")]), None)
                .unwrap()
                .unwrap();
        assert_eq!(connection, Connection::Local);
    }

    #[test]
    fn test_ssh_is_default() {
        let connection = Connection::for_host("web1", &Variables::new(), None)
            .unwrap()
            .unwrap();
        assert_eq!(
            connection,
            Connection::Ssh {
                address: "web1".to_string(),
                port: None,
                user: None
            }
        );
    }

    #[test]
    fn test_ssh_settings() {
        let connection = Connection::for_host(
            "web1",
            &variables(&[
                ("ansible_host", "10.0.0.5"),
                ("ansible_port", "2222"),
                ("ansible_user", "deploy"),
            ]),
            None,
        )
        .unwrap()
        .unwrap();

        let command = connection.command("/bin/sh", "uptime");
        let arguments: Vec<String> = command
            .get_args()
            .map(|argument| argument.to_string_lossy().to_string())
            .collect();

        assert_eq!(command.get_program(), "ssh");
        assert_eq!(
            arguments,
            vec!["-o", "BatchMode=yes", "-p", "2222", "deploy@10.0.0.5", "--", "uptime"]
        );
    }

    #[test]
    fn test_unsupported_connection() {
        let result =
            Connection::for_host("win1", &variables(&[("ansible_connection", "winrm")]), None)
                .unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_local_run_captures_output() {
        let output = Connection::Local.run("/bin/sh", "echo hello").unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
    }
}
