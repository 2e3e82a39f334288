//! Per-process introspection with per-field memoization.
//!
//! Every lookup result, negative ones included, is cached for the lifetime of
//! the helper: a pid's executable, registry entry and service descriptor are
//! treated as fixed while the pid lives.

use ahash::AHashMap as HashMap;
use chrono::Utc;
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, trace};

use crate::process::apps::{AppRegistry, RunningApp};
use crate::process::types::ProcessDetails;
use crate::runner::CommandRunner;

/// Default bound for one service-supervisor query.
pub const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_secs(1);
/// Default bound for the open-files fallback of path resolution.
pub const DEFAULT_PATH_TIMEOUT: Duration = Duration::from_secs(1);

const DETAILS_TIMEOUT: Duration = Duration::from_secs(1);

/// Service descriptor registered with the OS service supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceInfo {
    pub service_type: Option<String>,
    /// Path of the file defining the service.
    pub path: Option<String>,
    pub uid: Option<u32>,
}

impl ServiceInfo {
    /// True when the descriptor is scoped to a user session rather than the system.
    pub fn is_user_scope(&self) -> bool {
        self.service_type.as_deref().is_some_and(|t| {
            let t = t.to_ascii_lowercase();
            t.contains("user") || t.contains("agent")
        })
    }
}

/// Parses `type =`, `path =` and `uid =` lines of `launchctl procinfo` output.
///
/// Returns `None` when none of the fields is present.
pub fn parse_service_info(output: &str) -> Option<ServiceInfo> {
    let mut info = ServiceInfo::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(" = ") else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "type" if info.service_type.is_none() => info.service_type = Some(value.to_string()),
            "path" if info.path.is_none() => info.path = Some(value.to_string()),
            "uid" if info.uid.is_none() => info.uid = value.parse().ok(),
            _ => {}
        }
    }
    if info == ServiceInfo::default() {
        None
    } else {
        Some(info)
    }
}

/// Extracts the first absolute `n` record of `lsof -F n` output.
pub fn parse_lsof_path(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| line.strip_prefix('n'))
        .find(|path| path.starts_with('/'))
        .map(|path| path.to_string())
}

/// Parses a `ps` elapsed-time value, `[[dd-]hh:]mm:ss`.
pub fn parse_elapsed(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (days, clock) = match value.split_once('-') {
        Some((d, rest)) => (d.parse::<u64>().ok()?, rest),
        None => (0, value),
    };
    let parts: Vec<u64> = clock
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    let (h, m, s) = match parts.as_slice() {
        [m, s] => (0, *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => return None,
    };
    Some(Duration::from_secs(((days * 24 + h) * 60 + m) * 60 + s))
}

/// Parent pid, owning user and start time, read fresh on every call.
pub fn process_details(runner: &dyn CommandRunner, pid: u32) -> ProcessDetails {
    let pid_arg = pid.to_string();
    let out = match runner.run(
        "ps",
        &["-o", "ppid=,uid=,etime=", "-p", &pid_arg],
        DETAILS_TIMEOUT,
    ) {
        Ok(out) if out.success() => out,
        Ok(_) => return ProcessDetails::default(),
        Err(e) => {
            debug!(pid, error = %e, "process details unavailable");
            return ProcessDetails::default();
        }
    };

    let mut fields = out.stdout.split_whitespace();
    let parent_pid = fields.next().and_then(|v| v.parse::<u32>().ok());
    let owning_user = fields
        .next()
        .and_then(|v| v.parse::<u32>().ok())
        .map(user_name_for_uid);
    let start_time = fields
        .next()
        .and_then(parse_elapsed)
        .and_then(|elapsed| chrono::Duration::from_std(elapsed).ok())
        .map(|elapsed| Utc::now() - elapsed);

    ProcessDetails {
        start_time,
        parent_pid,
        owning_user,
    }
}

/// Lookups the classifier depends on.
pub trait Introspect: Send + Sync {
    fn executable_path(&self, pid: u32) -> Option<String>;
    fn running_application(&self, pid: u32) -> Option<RunningApp>;
    fn service_info(&self, pid: u32) -> Option<ServiceInfo>;

    /// Records a registry entry seen in a fresh listing, replacing whatever
    /// was memoized for its pid.
    fn record_application(&self, _app: &RunningApp) {}
}

/// Memoizing introspection helper shared by every scan.
pub struct IntrospectionHelper {
    runner: Arc<dyn CommandRunner>,
    registry: Arc<dyn AppRegistry>,
    service_timeout: Duration,
    path_timeout: Duration,
    paths: RwLock<HashMap<u32, Option<String>>>,
    apps: RwLock<HashMap<u32, Option<RunningApp>>>,
    services: RwLock<HashMap<u32, Option<ServiceInfo>>>,
}

impl IntrospectionHelper {
    pub fn new(runner: Arc<dyn CommandRunner>, registry: Arc<dyn AppRegistry>) -> Self {
        Self {
            runner,
            registry,
            service_timeout: DEFAULT_SERVICE_TIMEOUT,
            path_timeout: DEFAULT_PATH_TIMEOUT,
            paths: RwLock::new(HashMap::new()),
            apps: RwLock::new(HashMap::new()),
            services: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_timeouts(mut self, service_timeout: Duration, path_timeout: Duration) -> Self {
        self.service_timeout = service_timeout;
        self.path_timeout = path_timeout;
        self
    }

    /// Service descriptor lookup with an explicit timeout.
    pub fn service_info_with_timeout(&self, pid: u32, timeout: Duration) -> Option<ServiceInfo> {
        memoized(&self.services, pid, || self.query_service_info(pid, timeout))
    }

    /// Number of memoized entries per map: (paths, apps, services).
    pub fn cached_counts(&self) -> (usize, usize, usize) {
        (
            self.paths.read().map(|m| m.len()).unwrap_or(0),
            self.apps.read().map(|m| m.len()).unwrap_or(0),
            self.services.read().map(|m| m.len()).unwrap_or(0),
        )
    }

    fn query_service_info(&self, pid: u32, timeout: Duration) -> Option<ServiceInfo> {
        let pid_arg = pid.to_string();
        match self.runner.run("launchctl", &["procinfo", &pid_arg], timeout) {
            Ok(out) if out.success() => parse_service_info(&out.stdout),
            Ok(out) => {
                trace!(pid, exit_code = ?out.exit_code, "no service descriptor");
                None
            }
            Err(e) => {
                debug!(pid, error = %e, "service descriptor query failed");
                None
            }
        }
    }

    fn resolve_path(&self, pid: u32) -> Option<String> {
        if let Some(path) = pid_path(pid) {
            return Some(path);
        }
        let pid_arg = pid.to_string();
        match self
            .runner
            .run("lsof", &["-a", "-p", &pid_arg, "-d", "txt", "-F", "n"], self.path_timeout)
        {
            Ok(out) if out.success() => parse_lsof_path(&out.stdout),
            Ok(_) => None,
            Err(e) => {
                debug!(pid, error = %e, "open-files fallback failed");
                None
            }
        }
    }
}

impl Introspect for IntrospectionHelper {
    fn executable_path(&self, pid: u32) -> Option<String> {
        memoized(&self.paths, pid, || self.resolve_path(pid))
    }

    fn running_application(&self, pid: u32) -> Option<RunningApp> {
        memoized(&self.apps, pid, || self.registry.find(pid))
    }

    fn service_info(&self, pid: u32) -> Option<ServiceInfo> {
        self.service_info_with_timeout(pid, self.service_timeout)
    }

    fn record_application(&self, app: &RunningApp) {
        if let Ok(mut apps) = self.apps.write() {
            apps.insert(app.pid, Some(app.clone()));
        }
    }
}

/// Read-through cache: readers share the lock, the lookup runs unlocked and
/// the first writer for a key wins.
fn memoized<K, V, F>(map: &RwLock<HashMap<K, Option<V>>>, key: K, lookup: F) -> Option<V>
where
    K: Eq + Hash + Copy,
    V: Clone,
    F: FnOnce() -> Option<V>,
{
    if let Ok(cache) = map.read() {
        if let Some(hit) = cache.get(&key) {
            return hit.clone();
        }
    }
    let value = lookup();
    match map.write() {
        Ok(mut cache) => cache.entry(key).or_insert(value).clone(),
        Err(_) => value,
    }
}

#[cfg(target_os = "macos")]
fn pid_path(pid: u32) -> Option<String> {
    let mut buf = vec![0u8; libc::PROC_PIDPATHINFO_MAXSIZE as usize];
    // SAFETY: buf is valid for writes of its full length, which is passed as the size.
    let len = unsafe {
        libc::proc_pidpath(
            pid as libc::c_int,
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len() as u32,
        )
    };
    if len <= 0 {
        return None;
    }
    buf.truncate(len as usize);
    String::from_utf8(buf).ok()
}

#[cfg(target_os = "linux")]
fn pid_path(pid: u32) -> Option<String> {
    std::fs::read_link(format!("/proc/{pid}/exe"))
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn pid_path(_pid: u32) -> Option<String> {
    None
}

fn user_name_for_uid(uid: u32) -> String {
    match nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_info() {
        let out = "\
program path = /usr/libexec/logd
	path = /System/Library/LaunchDaemons/com.apple.logd.plist
	type = LaunchDaemon
	uid = 0
	path = /ignored/second.plist
";
        let info = parse_service_info(out).unwrap();
        assert_eq!(
            info.path.as_deref(),
            Some("/System/Library/LaunchDaemons/com.apple.logd.plist")
        );
        assert_eq!(info.service_type.as_deref(), Some("LaunchDaemon"));
        assert_eq!(info.uid, Some(0));
        assert!(!info.is_user_scope());
    }

    #[test]
    fn test_parse_service_info_empty() {
        assert_eq!(parse_service_info("no descriptor here"), None);
        assert_eq!(parse_service_info(""), None);
    }

    #[test]
    fn test_user_scope() {
        let info = ServiceInfo {
            service_type: Some("LaunchAgent".into()),
            ..Default::default()
        };
        assert!(info.is_user_scope());
    }

    #[test]
    fn test_parse_lsof_path() {
        let out = "p4203\nftxt\nn/Applications/Xcode.app/Contents/MacOS/Xcode\nftxt\nn/usr/lib/dyld\n";
        assert_eq!(
            parse_lsof_path(out),
            Some("/Applications/Xcode.app/Contents/MacOS/Xcode".to_string())
        );
        assert_eq!(parse_lsof_path("p1\n"), None);
    }

    #[test]
    fn test_parse_elapsed() {
        assert_eq!(parse_elapsed("05:03"), Some(Duration::from_secs(303)));
        assert_eq!(parse_elapsed("01:00:00"), Some(Duration::from_secs(3600)));
        assert_eq!(
            parse_elapsed("2-00:00:01"),
            Some(Duration::from_secs(2 * 86400 + 1))
        );
        assert_eq!(parse_elapsed("garbage"), None);
    }

    #[test]
    fn test_memoized_caches_negative_results() {
        let map: RwLock<HashMap<u32, Option<String>>> = RwLock::new(HashMap::new());
        let mut calls = 0;
        assert_eq!(memoized(&map, 7, || { calls += 1; None }), None);
        assert_eq!(memoized(&map, 7, || { calls += 1; Some("late".into()) }), None);
        assert_eq!(calls, 1);
    }
}
