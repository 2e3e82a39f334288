//! Process classification into the `ProcessType` taxonomy.
//!
//! Classification is an ordered list of independent rules evaluated first
//! match wins. OS-provided signals (kernel identity, application registry,
//! bundle layout) come before service descriptors and path guessing, and the
//! name heuristic runs last so it never overrides a ground-truth signal.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::trace;

use crate::introspection::Introspect;
use crate::process::apps::ActivationPolicy;
use crate::process::bundle::{self, is_under_any};
use crate::process::types::{Classification, ProcessType};
use crate::runner::CommandRunner;

/// Path roots and name tokens the rules match against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Exact command names of the kernel pseudo-process.
    #[serde(default = "default_kernel_names")]
    pub kernel_names: Vec<String>,

    /// Bundle names of the login session manager, always a system application.
    #[serde(default = "default_session_manager_names")]
    pub session_manager_names: Vec<String>,

    /// Bundles under these roots are system applications.
    #[serde(default = "default_system_app_roots")]
    pub system_app_roots: Vec<String>,

    /// Executables under these roots are system daemons.
    #[serde(default = "default_system_daemon_roots")]
    pub system_daemon_roots: Vec<String>,

    /// Executables under these roots are user daemons. `~` expands to $HOME.
    #[serde(default = "default_user_agent_roots")]
    pub user_agent_roots: Vec<String>,

    /// Service definition paths containing one of these are system daemons.
    #[serde(default = "default_daemon_markers")]
    pub daemon_descriptor_markers: Vec<String>,

    /// Service definition paths containing one of these are user daemons.
    #[serde(default = "default_agent_markers")]
    pub agent_descriptor_markers: Vec<String>,

    /// Lowercase command substrings marking a background task.
    #[serde(default = "default_background_tokens")]
    pub background_name_tokens: Vec<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn default_kernel_names() -> Vec<String> {
    strings(&["kernel_task"])
}
fn default_session_manager_names() -> Vec<String> {
    strings(&["loginwindow"])
}
fn default_system_app_roots() -> Vec<String> {
    strings(&[
        "/System/Applications",
        "/System/Library/CoreServices",
        "/System/Applications/Utilities",
    ])
}
fn default_system_daemon_roots() -> Vec<String> {
    strings(&["/System/Library", "/usr/libexec", "/usr/sbin", "/sbin"])
}
fn default_user_agent_roots() -> Vec<String> {
    strings(&["~/Library/LaunchAgents"])
}
fn default_daemon_markers() -> Vec<String> {
    strings(&["/LaunchDaemons/"])
}
fn default_agent_markers() -> Vec<String> {
    strings(&["/LaunchAgents/"])
}
fn default_background_tokens() -> Vec<String> {
    strings(&["helper", "service", "agent"])
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            kernel_names: default_kernel_names(),
            session_manager_names: default_session_manager_names(),
            system_app_roots: default_system_app_roots(),
            system_daemon_roots: default_system_daemon_roots(),
            user_agent_roots: default_user_agent_roots(),
            daemon_descriptor_markers: default_daemon_markers(),
            agent_descriptor_markers: default_agent_markers(),
            background_name_tokens: default_background_tokens(),
        }
    }
}

/// Inputs of a single classification.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub pid: u32,
    pub command: &'a str,
    /// Resolved executable path, never empty.
    pub path: &'a str,
}

type Rule = fn(&Classifier, &Candidate<'_>, &dyn Introspect) -> Option<ProcessType>;

/// Rules in evaluation order. The order is part of the contract.
const RULES: &[(&str, Rule)] = &[
    ("kernel", kernel_rule),
    ("registry", registry_rule),
    ("bundle", bundle_rule),
    ("service_descriptor", service_rule),
    ("path_prefix", path_prefix_rule),
    ("name_heuristic", name_rule),
];

/// Assigns `ProcessType`s. Stateless apart from its configuration.
#[derive(Debug, Clone)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl Classifier {
    pub fn new(mut config: ClassifierConfig) -> Self {
        let home = std::env::var("HOME").unwrap_or_default();
        config.user_agent_roots = config
            .user_agent_roots
            .into_iter()
            .filter_map(|root| match root.strip_prefix('~') {
                Some(rest) if home.is_empty() => {
                    trace!("Dropping user agent root {}: HOME unset", rest);
                    None
                }
                Some(rest) => Some(format!("{home}{rest}")),
                None => Some(root),
            })
            .collect();
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classifies one process.
    ///
    /// An empty `full_path` is resolved through the introspection helper and
    /// falls back to `command` when resolution fails.
    pub fn classify(
        &self,
        command: &str,
        full_path: &str,
        pid: u32,
        introspect: &dyn Introspect,
    ) -> ProcessType {
        let resolved;
        let path = if full_path.is_empty() {
            resolved = introspect
                .executable_path(pid)
                .unwrap_or_else(|| command.to_string());
            resolved.as_str()
        } else {
            full_path
        };

        let candidate = Candidate { pid, command, path };
        for (name, rule) in RULES {
            if let Some(process_type) = rule(self, &candidate, introspect) {
                trace!(pid, command, rule = name, ?process_type, "classified");
                return process_type;
            }
        }
        ProcessType::Unknown
    }

    /// Classifies and derives every metadata field of a record.
    ///
    /// The bundle identifier comes from the registry entry when there is one,
    /// else from the bundle's Info.plist.
    pub fn derive(
        &self,
        command: &str,
        full_path: &str,
        pid: u32,
        introspect: &dyn Introspect,
        runner: &dyn CommandRunner,
    ) -> Classification {
        let process_type = self.classify(command, full_path, pid, introspect);
        let is_application = bundle::is_bundle_path(full_path);
        let bundle_identifier = if is_application {
            introspect
                .running_application(pid)
                .and_then(|app| app.bundle_identifier)
                .or_else(|| bundle::bundle_identifier(full_path, runner))
        } else {
            None
        };
        Classification {
            process_type,
            category: process_type.category(),
            is_application,
            bundle_identifier,
        }
    }

    fn is_system_app_path(&self, path: &str) -> bool {
        is_under_any(path, &self.config.system_app_roots)
    }

    fn is_session_manager(&self, bundle_root: &str) -> bool {
        Path::new(bundle_root)
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| self.config.session_manager_names.iter().any(|n| n == stem))
    }
}

fn kernel_rule(c: &Classifier, p: &Candidate<'_>, _: &dyn Introspect) -> Option<ProcessType> {
    let is_kernel = p.pid == 0
        || c.config.kernel_names.iter().any(|n| n == p.command)
        || p.command.to_ascii_lowercase().contains("kernel");
    is_kernel.then_some(ProcessType::Kernel)
}

fn registry_rule(c: &Classifier, p: &Candidate<'_>, i: &dyn Introspect) -> Option<ProcessType> {
    let app = i.running_application(p.pid)?;
    match app.activation_policy {
        ActivationPolicy::Regular => {
            let path = app.executable_path.as_deref().unwrap_or(p.path);
            if c.is_system_app_path(path) {
                Some(ProcessType::SystemApplication)
            } else {
                Some(ProcessType::UserApplication)
            }
        }
        ActivationPolicy::Accessory => Some(ProcessType::BackgroundTask),
        ActivationPolicy::Prohibited => None,
    }
}

fn bundle_rule(c: &Classifier, p: &Candidate<'_>, _: &dyn Introspect) -> Option<ProcessType> {
    if !bundle::is_bundle_path(p.path) {
        return None;
    }
    let root = bundle::bundle_root(p.path)?;
    if c.is_session_manager(root) || c.is_system_app_path(root) {
        Some(ProcessType::SystemApplication)
    } else {
        Some(ProcessType::UserApplication)
    }
}

fn service_rule(c: &Classifier, p: &Candidate<'_>, i: &dyn Introspect) -> Option<ProcessType> {
    let info = i.service_info(p.pid)?;
    if let Some(path) = info.path.as_deref() {
        if c.config.daemon_descriptor_markers.iter().any(|m| path.contains(m.as_str())) {
            return Some(ProcessType::SystemDaemon);
        }
        if c.config.agent_descriptor_markers.iter().any(|m| path.contains(m.as_str())) {
            return Some(ProcessType::UserDaemon);
        }
    }
    info.is_user_scope().then_some(ProcessType::UserDaemon)
}

fn path_prefix_rule(c: &Classifier, p: &Candidate<'_>, _: &dyn Introspect) -> Option<ProcessType> {
    if is_under_any(p.path, &c.config.system_daemon_roots) {
        Some(ProcessType::SystemDaemon)
    } else if is_under_any(p.path, &c.config.user_agent_roots) {
        Some(ProcessType::UserDaemon)
    } else {
        None
    }
}

fn name_rule(c: &Classifier, p: &Candidate<'_>, _: &dyn Introspect) -> Option<ProcessType> {
    let lower = p.command.to_ascii_lowercase();
    c.config
        .background_name_tokens
        .iter()
        .any(|token| lower.contains(token.as_str()))
        .then_some(ProcessType::BackgroundTask)
}
