//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use herakles_proc_monitor::process::ActivationPolicy;
use herakles_proc_monitor::{
    CommandOutput, CommandRunner, Introspect, RunnerError, RunningApp, ServiceInfo,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

type Handler = Box<dyn Fn(&[&str], Duration) -> Result<CommandOutput, RunnerError> + Send + Sync>;

/// Scripted `CommandRunner`: per-program handlers plus a call log.
/// Programs without a handler fail to spawn.
#[derive(Default)]
pub struct FakeRunner {
    handlers: HashMap<String, Handler>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, program: &str, handler: F) -> Self
    where
        F: Fn(&[&str], Duration) -> Result<CommandOutput, RunnerError> + Send + Sync + 'static,
    {
        self.handlers.insert(program.to_string(), Box::new(handler));
        self
    }

    /// Always answers `program` with `stdout` and exit status zero.
    pub fn answering(self, program: &str, stdout: &str) -> Self {
        let stdout = stdout.to_string();
        self.on(program, move |_, _| Ok(CommandOutput::ok(stdout.clone())))
    }

    pub fn calls(&self, program: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == program)
            .count()
    }

    pub fn call_args(&self, program: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == program)
            .map(|(_, args)| args.clone())
            .collect()
    }
}

impl CommandRunner for FakeRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, RunnerError> {
        self.calls.lock().unwrap().push((
            program.to_string(),
            args.iter().map(|a| a.to_string()).collect(),
        ));
        match self.handlers.get(program) {
            Some(handler) => handler(args, timeout),
            None => Err(RunnerError::Spawn {
                program: program.to_string(),
                reason: "not installed".to_string(),
            }),
        }
    }
}

/// Fixed introspection answers keyed by pid.
#[derive(Default)]
pub struct StubIntrospect {
    pub paths: HashMap<u32, String>,
    pub apps: HashMap<u32, RunningApp>,
    pub services: HashMap<u32, ServiceInfo>,
}

impl StubIntrospect {
    pub fn with_path(mut self, pid: u32, path: &str) -> Self {
        self.paths.insert(pid, path.to_string());
        self
    }

    pub fn with_service(mut self, pid: u32, info: ServiceInfo) -> Self {
        self.services.insert(pid, info);
        self
    }

    pub fn with_app(mut self, app: RunningApp) -> Self {
        self.apps.insert(app.pid, app);
        self
    }
}

impl Introspect for StubIntrospect {
    fn executable_path(&self, pid: u32) -> Option<String> {
        self.paths.get(&pid).cloned()
    }

    fn running_application(&self, pid: u32) -> Option<RunningApp> {
        self.apps.get(&pid).cloned()
    }

    fn service_info(&self, pid: u32) -> Option<ServiceInfo> {
        self.services.get(&pid).cloned()
    }
}

pub fn app(pid: u32, name: &str, path: &str) -> RunningApp {
    RunningApp {
        pid,
        name: name.to_string(),
        bundle_identifier: None,
        executable_path: Some(path.to_string()),
        activation_policy: ActivationPolicy::Regular,
    }
}

pub const PS_HEADER: &str = "  PID  %CPU %MEM COMM\n";

/// `ps` output with the usual header line.
pub fn ps_output(rows: &[&str]) -> String {
    let mut out = PS_HEADER.to_string();
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out
}
