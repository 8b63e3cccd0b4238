use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::engine::modules::{self, Action, Module, OutputFormat};
use crate::engine::template::RenderError;
use crate::engine::transport::Connection;
use crate::engine::{BatchReport, CommandSpec, ExecutionEngine, HostResult};
use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::vault::Secret;

/// Runs commands on real hosts, at most `forks` at a time.
pub struct HostEngine {
    pool: ThreadPool,
    shell: String,
}

/// A host whose work is fully decided before anything runs.
enum Prepared {
    Done(HostResult),
    Run {
        host: String,
        connection: Connection,
        command_line: String,
        format: OutputFormat,
    },
}

impl HostEngine {
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be created.
    pub fn new(forks: usize, shell: String) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(forks.max(1))
            .thread_name(|index| format!("fsh-fork-{index}"))
            .build()
            .map_err(|e| Error::EngineFatal(format!("could not start {forks} forks: {e}")))?;

        Ok(Self { pool, shell })
    }

    fn prepare(
        inventory: &Inventory,
        host: &str,
        module: Module,
        spec: &CommandSpec,
        credential: Option<&Secret>,
    ) -> Result<Prepared> {
        let variables = inventory.host_variables(host, credential)?;

        let connection = match Connection::for_host(host, &variables, credential)? {
            Ok(connection) => connection,
            Err(message) => {
                return Ok(Prepared::Done(HostResult::failure(host, String::new(), message)))
            }
        };

        match module.prepare(spec, &variables, credential) {
            Ok(Action::Run {
                command_line,
                format,
            }) => Ok(Prepared::Run {
                host: host.to_string(),
                connection,
                command_line,
                format,
            }),
            Ok(Action::Report(message)) => Ok(Prepared::Done(HostResult::success(host, message))),
            Err(RenderError::Host(message)) => {
                Ok(Prepared::Done(HostResult::failure(host, String::new(), message)))
            }
            Err(RenderError::Engine(error)) => Err(error),
        }
    }

    fn execute(&self, prepared: Prepared) -> HostResult {
        match prepared {
            Prepared::Done(result) => result,
            Prepared::Run {
                host,
                connection,
                command_line,
                format,
            } => match connection.run(&self.shell, &command_line) {
                Ok(output) => modules::interpret(&host, format, &output),
                Err(e) => {
                    warn!("Could not start command for `{}`: {}", host, e);
                    HostResult::failure(&host, String::new(), format!("could not start: {e}"))
                }
            },
        }
    }
}

impl ExecutionEngine for HostEngine {
    fn run_on_hosts(
        &self,
        inventory: &Inventory,
        hosts: &[String],
        spec: &CommandSpec,
        credential: Option<&Secret>,
    ) -> Result<BatchReport> {
        let module = Module::for_spec(spec)?;

        // Everything that may need the vault password happens here, so a
        // `SecretRequired` leaves every host untouched.
        let prepared = hosts
            .iter()
            .map(|host| Self::prepare(inventory, host, module, spec, credential))
            .collect::<Result<Vec<_>>>()?;

        info!("Running `{}` on {} host(s)", spec, hosts.len());
        let results: Vec<HostResult> = self.pool.install(|| {
            prepared
                .into_par_iter()
                .map(|prepared| self.execute(prepared))
                .collect()
        });
        debug!(
            "`{}` finished with {} failure(s)",
            spec,
            results.iter().filter(|result| !result.is_success()).count()
        );

        Ok(BatchReport { results })
    }
}
