//! Foreground-application enumerator.
//!
//! The running-application registry is authoritative for "this process is a
//! user-facing application" but knows nothing about daemons and helpers.
//!
//! On macOS the list comes straight from `NSWorkspace`; `lsappinfo` is only
//! consulted when the workspace has nothing to report.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::runner::CommandRunner;

const LSAPPINFO_TIMEOUT: Duration = Duration::from_secs(2);

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*\d+\)\s+"(.*)"\s+ASN:"#).expect("lsappinfo header pattern is valid")
});
static KEY_VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(bundleID|executable path|type)="([^"]*)""#)
        .expect("lsappinfo field pattern is valid")
});
static PID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bpid\s*=\s*(\d+)").expect("lsappinfo pid pattern is valid"));

/// How a running application presents itself to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationPolicy {
    /// Ordinary windowed application with a Dock icon.
    Regular,
    /// Menu-bar-only or UI-agent application.
    Accessory,
    /// No UI presence at all.
    Prohibited,
}

impl ActivationPolicy {
    /// Maps the `type=` field reported by `lsappinfo`.
    pub fn from_lsappinfo_type(value: &str) -> Self {
        match value {
            "Foreground" => ActivationPolicy::Regular,
            "UIElement" => ActivationPolicy::Accessory,
            _ => ActivationPolicy::Prohibited,
        }
    }
}

/// Registry entry for one running application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningApp {
    pub pid: u32,
    /// Display name, or the bundle identifier when the app has none.
    pub name: String,
    pub bundle_identifier: Option<String>,
    pub executable_path: Option<String>,
    pub activation_policy: ActivationPolicy,
}

/// Source of running user applications.
pub trait AppRegistry: Send + Sync {
    /// Every currently running application.
    fn list(&self) -> Vec<RunningApp>;

    /// Registry entry for `pid`, if the process is a registered application.
    fn find(&self, pid: u32) -> Option<RunningApp> {
        self.list().into_iter().find(|app| app.pid == pid)
    }
}

/// Registry with no applications, used where no application registry exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyRegistry;

impl AppRegistry for EmptyRegistry {
    fn list(&self) -> Vec<RunningApp> {
        Vec::new()
    }
}

/// Fixed list of applications.
#[derive(Debug, Default, Clone)]
pub struct StaticRegistry {
    apps: Vec<RunningApp>,
}

impl StaticRegistry {
    pub fn new(apps: Vec<RunningApp>) -> Self {
        Self { apps }
    }
}

impl AppRegistry for StaticRegistry {
    fn list(&self) -> Vec<RunningApp> {
        self.apps.clone()
    }
}

/// Parses `lsappinfo list` output into registry entries.
///
/// Entries without a pid are skipped.
pub fn parse_lsappinfo(output: &str) -> Vec<RunningApp> {
    struct Pending {
        name: String,
        bundle_identifier: Option<String>,
        executable_path: Option<String>,
        app_type: Option<String>,
        pid: Option<u32>,
    }

    fn finish(pending: Option<Pending>, out: &mut Vec<RunningApp>) {
        let Some(p) = pending else { return };
        let Some(pid) = p.pid else { return };
        let name = if p.name.is_empty() {
            p.bundle_identifier.clone().unwrap_or_default()
        } else {
            p.name
        };
        out.push(RunningApp {
            pid,
            name,
            bundle_identifier: p.bundle_identifier,
            executable_path: p.executable_path,
            activation_policy: p
                .app_type
                .as_deref()
                .map(ActivationPolicy::from_lsappinfo_type)
                .unwrap_or(ActivationPolicy::Prohibited),
        });
    }

    let mut apps = Vec::new();
    let mut current: Option<Pending> = None;

    for line in output.lines() {
        if let Some(caps) = HEADER_RE.captures(line) {
            finish(current.take(), &mut apps);
            current = Some(Pending {
                name: caps[1].to_string(),
                bundle_identifier: None,
                executable_path: None,
                app_type: None,
                pid: None,
            });
            continue;
        }
        let Some(entry) = current.as_mut() else {
            continue;
        };
        for caps in KEY_VALUE_RE.captures_iter(line) {
            let value = caps[2].to_string();
            match &caps[1] {
                "bundleID" if value != "[ NULL ]" => entry.bundle_identifier = Some(value),
                "executable path" => entry.executable_path = Some(value),
                "type" => entry.app_type = Some(value),
                _ => {}
            }
        }
        if let Some(caps) = PID_RE.captures(line) {
            entry.pid = caps[1].parse().ok();
        }
    }
    finish(current, &mut apps);
    apps
}

/// Registry backed by the `lsappinfo` launch-services tool, the fallback
/// source when the workspace list is unavailable.
///
/// `list` refreshes the held listing; `find` answers from it so a full
/// inventory scan costs one tool invocation, not one per pid.
pub struct LsappinfoRegistry {
    runner: Arc<dyn CommandRunner>,
    latest: RwLock<Option<Vec<RunningApp>>>,
}

impl LsappinfoRegistry {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            latest: RwLock::new(None),
        }
    }

    fn query(&self) -> Vec<RunningApp> {
        match self.runner.run("lsappinfo", &["list"], LSAPPINFO_TIMEOUT) {
            Ok(out) if out.success() => parse_lsappinfo(&out.stdout),
            Ok(out) => {
                warn!(exit_code = ?out.exit_code, "lsappinfo exited with failure");
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to query running applications: {}", e);
                Vec::new()
            }
        }
    }
}

impl AppRegistry for LsappinfoRegistry {
    fn list(&self) -> Vec<RunningApp> {
        let apps = self.query();
        debug!("Registry lists {} running applications", apps.len());
        if let Ok(mut latest) = self.latest.write() {
            *latest = Some(apps.clone());
        }
        apps
    }

    fn find(&self, pid: u32) -> Option<RunningApp> {
        let cached = self
            .latest
            .read()
            .ok()
            .and_then(|latest| latest.as_ref().map(|apps| apps.iter().find(|a| a.pid == pid).cloned()));
        match cached {
            Some(found) => found,
            None => self.list().into_iter().find(|a| a.pid == pid),
        }
    }
}

/// Registry backed by `NSWorkspace.runningApplications`, read in process.
///
/// The workspace list is the primary source. When it comes back empty (no
/// window-server session, e.g. over ssh) the fallback registry answers.
#[cfg(target_os = "macos")]
pub struct WorkspaceRegistry {
    fallback: Box<dyn AppRegistry>,
}

#[cfg(target_os = "macos")]
impl WorkspaceRegistry {
    pub fn new(fallback: Box<dyn AppRegistry>) -> Self {
        Self { fallback }
    }

    fn running_applications() -> Vec<RunningApp> {
        use objc2_app_kit::{NSApplicationActivationPolicy, NSWorkspace};

        objc2::rc::autoreleasepool(|_| {
            // SAFETY: read-only AppKit queries; every returned object is retained
            // by its binding and dropped inside this pool.
            unsafe {
                let running = NSWorkspace::sharedWorkspace().runningApplications();
                let mut apps = Vec::with_capacity(running.count());
                for index in 0..running.count() {
                    let app = running.objectAtIndex(index);
                    let pid = app.processIdentifier();
                    if pid < 0 {
                        continue;
                    }
                    let bundle_identifier = app.bundleIdentifier().map(|id| id.to_string());
                    let name = app
                        .localizedName()
                        .map(|n| n.to_string())
                        .or_else(|| bundle_identifier.clone())
                        .unwrap_or_default();
                    let executable_path = app
                        .executableURL()
                        .and_then(|url| url.path())
                        .map(|p| p.to_string());
                    let policy = app.activationPolicy();
                    let activation_policy = if policy == NSApplicationActivationPolicy::Regular {
                        ActivationPolicy::Regular
                    } else if policy == NSApplicationActivationPolicy::Accessory {
                        ActivationPolicy::Accessory
                    } else {
                        ActivationPolicy::Prohibited
                    };
                    apps.push(RunningApp {
                        pid: pid as u32,
                        name,
                        bundle_identifier,
                        executable_path,
                        activation_policy,
                    });
                }
                apps
            }
        })
    }
}

#[cfg(target_os = "macos")]
impl AppRegistry for WorkspaceRegistry {
    fn list(&self) -> Vec<RunningApp> {
        let apps = Self::running_applications();
        if apps.is_empty() {
            debug!("Workspace reported no applications, using fallback registry");
            return self.fallback.list();
        }
        debug!("Workspace lists {} running applications", apps.len());
        apps
    }
}

/// Picks the registry implementation for the running platform.
#[cfg(target_os = "macos")]
pub fn platform_registry(runner: Arc<dyn CommandRunner>) -> Arc<dyn AppRegistry> {
    Arc::new(WorkspaceRegistry::new(Box::new(LsappinfoRegistry::new(runner))))
}

/// Picks the registry implementation for the running platform.
#[cfg(not(target_os = "macos"))]
pub fn platform_registry(_runner: Arc<dyn CommandRunner>) -> Arc<dyn AppRegistry> {
    Arc::new(EmptyRegistry)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
 1) "loginwindow" ASN:0x0-0x1001:
    bundleID="com.apple.loginwindow"
    bundle path="/System/Library/CoreServices/loginwindow.app"
    executable path="/System/Library/CoreServices/loginwindow.app/Contents/MacOS/loginwindow"
    pid = 150 type="Foreground" flavor=3 Version="9.0" fileType="FNDR" creator="lgnw" Arch=ARM64
 2) "Xcode" ASN:0x0-0x2002:
    bundleID="com.apple.dt.Xcode"
    executable path="/Applications/Xcode.app/Contents/MacOS/Xcode"
    pid = 4203 type="Foreground" flavor=3 Arch=ARM64
 3) "" ASN:0x0-0x3003:
    bundleID="com.example.menubar"
    executable path="/Applications/Menu.app/Contents/MacOS/Menu"
    pid = 812 type="UIElement" flavor=3
 4) "Spotlight" ASN:0x0-0x4004:
    bundleID="com.apple.Spotlight"
    pid = 399 type="BackgroundOnly" flavor=3
 5) "Ghost" ASN:0x0-0x5005:
    bundleID=[ NULL ]
"#;

    #[test]
    fn test_parse_lsappinfo() {
        let apps = parse_lsappinfo(SAMPLE);
        assert_eq!(apps.len(), 4);

        assert_eq!(apps[0].pid, 150);
        assert_eq!(apps[0].name, "loginwindow");
        assert_eq!(apps[0].activation_policy, ActivationPolicy::Regular);

        assert_eq!(apps[1].pid, 4203);
        assert_eq!(
            apps[1].executable_path.as_deref(),
            Some("/Applications/Xcode.app/Contents/MacOS/Xcode")
        );

        // Falls back to the bundle identifier when there is no display name.
        assert_eq!(apps[2].name, "com.example.menubar");
        assert_eq!(apps[2].activation_policy, ActivationPolicy::Accessory);

        assert_eq!(apps[3].activation_policy, ActivationPolicy::Prohibited);
        assert_eq!(apps[3].executable_path, None);
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_workspace_falls_back_when_empty_or_answers_itself() {
        let fallback = StaticRegistry::new(parse_lsappinfo(SAMPLE));
        let registry = WorkspaceRegistry::new(Box::new(fallback));
        let apps = registry.list();
        assert!(!apps.is_empty());
        let mut pids: Vec<u32> = apps.iter().map(|a| a.pid).collect();
        pids.sort_unstable();
        pids.dedup();
        assert_eq!(pids.len(), apps.len());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_platform_registry_is_empty_off_macos() {
        let runner: Arc<dyn CommandRunner> = Arc::new(crate::runner::SystemRunner::new());
        assert!(platform_registry(runner).list().is_empty());
    }

    #[test]
    fn test_static_registry_find() {
        let registry = StaticRegistry::new(parse_lsappinfo(SAMPLE));
        assert_eq!(registry.find(4203).map(|a| a.name), Some("Xcode".to_string()));
        assert!(registry.find(1).is_none());
    }
}
