//! Bounded execution of external tools.
//!
//! Every subprocess-based lookup (`ps`, `lsof`, `launchctl`, `lsappinfo`,
//! `kill`, `plutil`, `sysctl`, `vm_stat`) goes through the [`CommandRunner`]
//! capability so timeout and termination handling lives in one place.
//!
//! Children run with `LC_ALL=C` so numeric columns always use `.` decimals.
//!
//! A command that outlives its timeout is killed and reaped; whatever it had
//! written to stdout is discarded and [`RunnerError::Timeout`] is returned.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Interval between `try_wait` polls while a child is running.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors that can occur while running an external tool.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub duration: Duration,
}

impl CommandOutput {
    /// Builds a successful output, mostly useful for test doubles.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            duration: Duration::ZERO,
        }
    }

    /// Builds an output with the given exit code and no stdout.
    pub fn failed(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            stdout: String::new(),
            duration: Duration::ZERO,
        }
    }

    /// True when the command exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Capability to run an external program with a hard timeout.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, RunnerError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, RunnerError> {
        let start = Instant::now();
        trace!(program, ?args, ?timeout, "spawning tool");

        let mut child = Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RunnerError::Spawn {
                program: program.to_string(),
                reason: e.to_string(),
            })?;

        // Drain stdout on a separate thread so a chatty child never blocks on a
        // full pipe while we are polling for its exit.
        let reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stdout.read_to_end(&mut buf);
                buf
            })
        });

        let deadline = start + timeout;
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    warn!(program, ?timeout, "tool timed out, killing it");
                    let _ = child.kill();
                    let _ = child.wait();
                    // Partial output is dropped. The reader is detached rather than
                    // joined since a grandchild may still hold the pipe open.
                    drop(reader);
                    return Err(RunnerError::Timeout {
                        program: program.to_string(),
                        timeout,
                    });
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        let stdout = reader
            .and_then(|handle| handle.join().ok())
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default();

        let duration = start.elapsed();
        debug!(
            program,
            exit_code = ?status.code(),
            duration_ms = duration.as_millis() as u64,
            "tool finished"
        );

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            duration,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_echo() {
        let out = SystemRunner
            .run("echo", &["hello"], Duration::from_secs(5))
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_nonzero_exit_is_reported_not_raised() {
        let out = SystemRunner
            .run("sh", &["-c", "exit 3"], Duration::from_secs(5))
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, Some(3));
    }

    #[test]
    fn test_children_run_in_c_locale() {
        let out = SystemRunner
            .run("sh", &["-c", "printf %s \"$LC_ALL\""], Duration::from_secs(5))
            .unwrap();
        assert_eq!(out.stdout, "C");
    }

    #[test]
    fn test_spawn_failure() {
        let err = SystemRunner
            .run("definitely-not-a-real-tool-xyz", &[], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }

    #[test]
    fn test_timeout_kills_child() {
        let start = Instant::now();
        let err = SystemRunner
            .run("sleep", &["5"], Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(3));
    }
}
