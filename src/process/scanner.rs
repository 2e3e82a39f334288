//! Table scanner: reads the OS process table through `ps`.
//!
//! Rows that fail to parse are dropped silently. A failing or timed out `ps`
//! invocation, or output without a single usable row, returns an error so the
//! inventory builder can fall back.

use std::time::Duration;
use tracing::{debug, warn};

use crate::runner::{CommandRunner, RunnerError};

/// Default hard timeout for one process-table query.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);

const PS_PROGRAM: &str = "ps";
const PS_ARGS: [&str; 3] = ["-A", "-o", "pid,%cpu,%mem,comm"];

/// One parsed row of the process table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub pid: u32,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub command: String,
}

/// Why a table scan produced no usable rows.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("process table query failed: {0}")]
    Runner(#[from] RunnerError),

    #[error("process table query exited with status {0:?}")]
    NonZeroExit(Option<i32>),

    #[error("process table query returned no parseable rows")]
    NoRows,
}

/// Parses one data row: `<pid> <cpu> <mem> <command...>`.
pub fn parse_row(line: &str) -> Option<TableRow> {
    let mut fields = line.split_whitespace();
    let pid = fields.next()?.parse::<u32>().ok()?;
    let cpu_percent = fields.next()?.parse::<f64>().ok()?;
    let memory_percent = fields.next()?.parse::<f64>().ok()?;
    let command = fields.collect::<Vec<_>>().join(" ");
    if command.is_empty() {
        return None;
    }
    Some(TableRow {
        pid,
        cpu_percent,
        memory_percent,
        command,
    })
}

/// Parses full `ps` output, skipping the header row and blank lines.
pub fn parse_table(output: &str) -> Vec<TableRow> {
    let mut rows = Vec::new();
    for (index, line) in output.lines().enumerate() {
        if index == 0 || line.trim().is_empty() {
            continue;
        }
        match parse_row(line) {
            Some(row) => rows.push(row),
            None => debug!("Dropping unparseable process table row: {:?}", line),
        }
    }
    rows
}

/// Queries the process table through a [`CommandRunner`].
pub struct TableScanner<'a> {
    runner: &'a dyn CommandRunner,
    timeout: Duration,
}

impl<'a> TableScanner<'a> {
    pub fn new(runner: &'a dyn CommandRunner, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Runs `ps` and parses its rows.
    pub fn scan(&self) -> Result<Vec<TableRow>, ScanError> {
        let output = self.runner.run(PS_PROGRAM, &PS_ARGS, self.timeout)?;
        if !output.success() {
            warn!(exit_code = ?output.exit_code, "ps exited with failure");
            return Err(ScanError::NonZeroExit(output.exit_code));
        }
        let rows = parse_table(&output.stdout);
        if rows.is_empty() {
            warn!("ps produced no parseable rows");
            return Err(ScanError::NoRows);
        }
        debug!("Parsed {} process table rows", rows.len());
        Ok(rows)
    }
}
