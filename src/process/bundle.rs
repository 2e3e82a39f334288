//! Application bundle helpers.
//!
//! A bundle is a directory ending in `.app` holding `Contents/Info.plist` and
//! the executable under `Contents/MacOS`. Everything here is best effort:
//! failures yield `None`, never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::runner::CommandRunner;

const BUNDLE_SUFFIX: &str = ".app";
const PLUTIL_TIMEOUT: Duration = Duration::from_secs(1);

static BUNDLE_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<key>\s*CFBundleIdentifier\s*</key>\s*<string>\s*([^<\s]+)\s*</string>")
        .expect("bundle identifier pattern is valid")
});

/// Returns the bundle root (`/Applications/Xcode.app`) of a path inside a bundle.
///
/// The outermost `.app` segment wins, so helpers nested in
/// `Foo.app/Contents/Frameworks/Bar.app` resolve to `Foo.app`.
pub fn bundle_root(path: &str) -> Option<&str> {
    let mut offset = 0;
    for segment in path.split('/') {
        let end = offset + segment.len();
        if segment.len() > BUNDLE_SUFFIX.len() && segment.ends_with(BUNDLE_SUFFIX) {
            return Some(&path[..end]);
        }
        offset = end + 1;
    }
    None
}

/// True when `path` lies inside an application bundle.
///
/// Accepts either a `.app/Contents/...` path or a `.app` directory whose
/// `Contents/Info.plist` exists on disk.
pub fn is_bundle_path(path: &str) -> bool {
    let Some(root) = bundle_root(path) else {
        return false;
    };
    let rest = &path[root.len()..];
    if rest.starts_with("/Contents/") || rest == "/Contents" {
        return true;
    }
    Path::new(root).join("Contents").join("Info.plist").is_file()
}

/// True when `path` starts under any of `roots`.
///
/// Roots are compared as directory prefixes, `/Applications` does not match
/// `/ApplicationsOld/...`.
pub fn is_under_any(path: &str, roots: &[String]) -> bool {
    roots.iter().any(|root| is_under(path, root))
}

fn is_under(path: &str, root: &str) -> bool {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return false;
    }
    match path.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Extracts `CFBundleIdentifier` from an XML plist body.
pub fn parse_bundle_identifier(plist: &str) -> Option<String> {
    BUNDLE_ID_RE
        .captures(plist)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Reads the bundle identifier of the bundle containing `path`.
///
/// XML plists are parsed directly; binary plists are handed to `plutil`.
pub fn bundle_identifier(path: &str, runner: &dyn CommandRunner) -> Option<String> {
    let root = bundle_root(path)?;
    let plist = Path::new(root).join("Contents").join("Info.plist");
    let bytes = fs::read(&plist).ok()?;

    if let Ok(text) = std::str::from_utf8(&bytes) {
        if let Some(id) = parse_bundle_identifier(text) {
            return Some(id);
        }
    }

    let plist_str = plist.to_string_lossy();
    match runner.run(
        "plutil",
        &["-extract", "CFBundleIdentifier", "raw", "-o", "-", &plist_str],
        PLUTIL_TIMEOUT,
    ) {
        Ok(out) if out.success() => {
            let id = out.stdout.trim();
            (!id.is_empty()).then(|| id.to_string())
        }
        Ok(out) => {
            debug!(plist = %plist_str, exit_code = ?out.exit_code, "plutil found no identifier");
            None
        }
        Err(e) => {
            debug!(plist = %plist_str, error = %e, "plutil unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, RunnerError};

    struct NoTools;

    impl CommandRunner for NoTools {
        fn run(&self, program: &str, _: &[&str], _: Duration) -> Result<CommandOutput, RunnerError> {
            Err(RunnerError::Spawn {
                program: program.to_string(),
                reason: "not available".into(),
            })
        }
    }

    #[test]
    fn test_bundle_root() {
        assert_eq!(
            bundle_root("/Applications/Xcode.app/Contents/MacOS/Xcode"),
            Some("/Applications/Xcode.app")
        );
        assert_eq!(
            bundle_root("/Applications/Foo.app/Contents/Frameworks/Bar.app/Contents/MacOS/Bar"),
            Some("/Applications/Foo.app")
        );
        assert_eq!(bundle_root("/usr/sbin/syslogd"), None);
        assert_eq!(bundle_root("/opt/.app/bin"), None);
    }

    #[test]
    fn test_is_bundle_path_by_contents_segment() {
        assert!(is_bundle_path("/Applications/Xcode.app/Contents/MacOS/Xcode"));
        assert!(!is_bundle_path("/usr/libexec/Xcode.application"));
        assert!(!is_bundle_path("/nonexistent/Thing.app"));
    }

    #[test]
    fn test_is_bundle_path_by_info_plist() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("Tool.app");
        fs::create_dir_all(bundle.join("Contents")).unwrap();
        fs::write(bundle.join("Contents/Info.plist"), "<plist/>").unwrap();

        let path = format!("{}/tool", bundle.display());
        assert!(is_bundle_path(&path));
    }

    #[test]
    fn test_is_under_any_matches_whole_segments() {
        let roots = vec!["/System/Applications/".to_string()];
        assert!(is_under_any("/System/Applications/Mail.app/Contents/MacOS/Mail", &roots));
        assert!(!is_under_any("/System/ApplicationsOld/Mail.app", &roots));
        assert!(!is_under_any("/Applications/Mail.app", &roots));
    }

    #[test]
    fn test_parse_bundle_identifier() {
        let plist = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>CFBundleExecutable</key>
    <string>Xcode</string>
    <key>CFBundleIdentifier</key>
    <string>com.apple.dt.Xcode</string>
</dict>
</plist>"#;
        assert_eq!(
            parse_bundle_identifier(plist),
            Some("com.apple.dt.Xcode".to_string())
        );
        assert_eq!(parse_bundle_identifier("<plist></plist>"), None);
    }

    #[test]
    fn test_bundle_identifier_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("Demo.app");
        fs::create_dir_all(bundle.join("Contents/MacOS")).unwrap();
        fs::write(
            bundle.join("Contents/Info.plist"),
            "<dict><key>CFBundleIdentifier</key><string>org.example.demo</string></dict>",
        )
        .unwrap();

        let exe = format!("{}/Contents/MacOS/Demo", bundle.display());
        assert_eq!(
            bundle_identifier(&exe, &NoTools),
            Some("org.example.demo".to_string())
        );
    }

    #[test]
    fn test_bundle_identifier_missing_plist_is_none() {
        assert_eq!(
            bundle_identifier("/nonexistent/Ghost.app/Contents/MacOS/Ghost", &NoTools),
            None
        );
    }
}
