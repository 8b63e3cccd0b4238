//! The interactive read-execute loop.

use std::io::{BufRead, Write};

use fleet_shell_core::dispatcher::{CommandDispatcher, CommandResult};
use fleet_shell_core::engine::ExecutionEngine;
use fleet_shell_core::error::{Error, Result};
use fleet_shell_core::scope::ScopeState;
use log::{debug, warn};

pub mod output;

use output::Palette;

/// One operator session: a dispatcher plus the scope it navigates.
pub struct Session<E> {
    dispatcher: CommandDispatcher<E>,
    scope: ScopeState,
    palette: Palette,
}

impl<E: ExecutionEngine> Session<E> {
    pub fn new(dispatcher: CommandDispatcher<E>, scope: ScopeState, color: bool) -> Self {
        Self {
            dispatcher,
            scope,
            palette: Palette::new(color),
        }
    }

    #[must_use]
    pub fn scope(&self) -> &ScopeState {
        &self.scope
    }

    /// Reads lines from `input` until `exit` or end of input.
    ///
    /// Errors from a single line are reported to `out` and the loop carries
    /// on. That includes a line that is not valid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading input or writing output fails.
    pub fn run(&mut self, mut input: impl BufRead, out: &mut impl Write) -> Result<()> {
        let mut buffer = Vec::new();

        loop {
            write!(out, "fsh [{}]> ", self.scope)?;
            out.flush()?;

            buffer.clear();
            if input.read_until(b'\n', &mut buffer)? == 0 {
                writeln!(out)?;
                debug!("End of input, leaving session");
                return Ok(());
            }

            match std::str::from_utf8(&buffer) {
                Ok(line) => {
                    if !self.handle_line(line, out)? {
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!("Skipping input line: {e}");
                    let error = Error::parse("input is not valid UTF-8");
                    output::write_error(out, self.palette, &error)?;
                }
            }
        }
    }

    /// Executes one line, returning `false` when the session should end.
    fn handle_line(&mut self, line: &str, out: &mut impl Write) -> Result<bool> {
        let palette = self.palette;
        let mut write_failure: Option<std::io::Error> = None;

        let outcome = self.dispatcher.execute(&mut self.scope, line, |progress, report| {
            if write_failure.is_none() {
                write_failure = output::write_batch(&mut *out, palette, progress, report).err();
            }
        });

        if let Some(error) = write_failure {
            return Err(Error::Stdio(error));
        }

        match outcome {
            Ok(CommandResult::Exit) => Ok(false),
            Ok(outcome) => {
                output::write_outcome(out, palette, &outcome)?;
                Ok(true)
            }
            Err(error) => {
                warn!("`{}` failed: {}", line.trim(), error);
                output::write_error(out, palette, &error)?;
                Ok(true)
            }
        }
    }
}
