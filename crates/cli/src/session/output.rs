//! Rendering of command outcomes to the terminal.

use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use fleet_shell_core::dispatcher::{BatchProgress, CommandResult, RunSummary, HELP_TEXT};
use fleet_shell_core::engine::{BatchReport, HostResult};
use fleet_shell_core::error::Error;
use itertools::Itertools;

/// Writes text in color, or plain when colors are off.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn line(self, out: &mut impl Write, text: &str, color: Color) -> io::Result<()> {
        if self.enabled {
            queue!(
                out,
                SetForegroundColor(color),
                Print(text),
                ResetColor,
                Print("\n")
            )
        } else {
            writeln!(out, "{text}")
        }
    }
}

/// Writes the per-host results of one batch, then the hosts that failed in it.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_batch(
    out: &mut impl Write,
    palette: Palette,
    progress: BatchProgress,
    report: &BatchReport,
) -> io::Result<()> {
    if progress.total > 1 {
        palette.line(
            out,
            &format!(
                "--- batch {}/{} ({} host(s)) ---",
                progress.index + 1,
                progress.total,
                report.results.len()
            ),
            Color::Cyan,
        )?;
    }

    for result in &report.results {
        write_host_result(out, palette, result)?;
    }

    if report.failures().next().is_some() {
        let failed = report.failures().map(|result| result.host.as_str()).join(", ");
        palette.line(out, &format!("failed in this batch: {failed}"), Color::Yellow)?;
    }

    out.flush()
}

fn write_host_result(out: &mut impl Write, palette: Palette, result: &HostResult) -> io::Result<()> {
    match &result.error {
        None => palette.line(out, &format!("{} | SUCCESS >>", result.host), Color::Green)?,
        Some(error) => palette.line(
            out,
            &format!("{} | FAILED | {} >>", result.host, error),
            Color::Red,
        )?,
    }

    if !result.output.is_empty() {
        writeln!(out, "{}", result.output)?;
    }

    Ok(())
}

/// Writes what a finished line did.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_outcome(out: &mut impl Write, palette: Palette, outcome: &CommandResult) -> io::Result<()> {
    match outcome {
        CommandResult::Navigated(_) | CommandResult::Exit | CommandResult::Empty => {}
        CommandResult::SerialSet(0) => writeln!(out, "serial off, every host runs in one batch")?,
        CommandResult::SerialSet(serial) => writeln!(out, "serial set to {serial}")?,
        CommandResult::Listed { hosts, groups } => {
            for host in hosts {
                writeln!(out, "  {host}")?;
            }
            writeln!(out, "{} host(s)", hosts.len())?;
            if !groups.is_empty() {
                writeln!(out, "groups: {}", groups.iter().join(", "))?;
            }
        }
        CommandResult::Reloaded { scope_reset } => {
            writeln!(out, "inventory reloaded")?;
            if *scope_reset {
                palette.line(
                    out,
                    "current scope no longer matches, back to `all`",
                    Color::Yellow,
                )?;
            }
        }
        CommandResult::Help => writeln!(out, "{HELP_TEXT}")?,
        CommandResult::NoHostsMatched => palette.line(out, "no hosts matched", Color::Yellow)?,
        CommandResult::Ran(summary) => write_summary(out, palette, summary)?,
    }

    out.flush()
}

fn write_summary(out: &mut impl Write, palette: Palette, summary: &RunSummary) -> io::Result<()> {
    if summary.failed.is_empty() {
        palette.line(
            out,
            &format!("{} host(s) ok", summary.hosts),
            Color::Green,
        )
    } else {
        palette.line(
            out,
            &format!(
                "{} of {} host(s) failed: {}",
                summary.failed.len(),
                summary.hosts,
                summary.failed.join(", ")
            ),
            Color::Red,
        )
    }
}

/// Writes an error that ended a line without ending the session.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_error(out: &mut impl Write, palette: Palette, error: &Error) -> io::Result<()> {
    palette.line(out, &format!("ERROR: {error}"), Color::Red)?;
    out.flush()
}
