//! Check command implementation.
//!
//! Validates configuration and the availability of the external tools the
//! inventory depends on.

use herakles_proc_monitor::process::TableScanner;
use herakles_proc_monitor::{
    CommandRunner, ProcessCategory, ProcessManager, RunnerError, SystemRunner,
};
use nix::unistd::geteuid;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{validate_effective_config, Config};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Tools probed on every platform, then the macOS-only ones.
const COMMON_TOOLS: &[(&str, &[&str], &str)] = &[
    ("kill", &["-0", "1"], "termination"),
    ("lsof", &["-v"], "executable path fallback"),
];
const MACOS_TOOLS: &[(&str, &[&str], &str)] = &[
    ("launchctl", &["version"], "service descriptors"),
    ("lsappinfo", &["front"], "running-application registry"),
    ("plutil", &["-help"], "binary Info.plist reading"),
    ("vm_stat", &[], "system memory"),
];

/// Validates system requirements and configuration.
pub async fn command_check(scan: bool, config: &Config) -> anyhow::Result<()> {
    println!("🔍 Herakles Process Monitor - System Check");
    println!("==========================================");

    let mut all_ok = true;
    let runner = SystemRunner::new();

    println!("\n👤 Checking privileges...");
    if geteuid().is_root() {
        println!("   ✅ Running as root");
    } else {
        println!("   ⚠️  Not running as root - paths and signals of other users' processes may be unavailable");
    }

    println!("\n📋 Checking process table...");
    let scan_timeout = config.manager_config().scan_timeout;
    let start = Instant::now();
    match TableScanner::new(&runner, scan_timeout).scan() {
        Ok(rows) => println!(
            "   ✅ ps returned {} rows in {:.0}ms",
            rows.len(),
            start.elapsed().as_secs_f64() * 1000.0
        ),
        Err(e) => {
            println!("   ❌ Process table scan failed: {}", e);
            all_ok = false;
        }
    }

    println!("\n🔧 Checking external tools...");
    let tools = COMMON_TOOLS
        .iter()
        .chain(MACOS_TOOLS.iter().filter(|_| cfg!(target_os = "macos")));
    for (program, args, purpose) in tools {
        match runner.run(program, args, PROBE_TIMEOUT) {
            Ok(_) => println!("   ✅ {} available ({})", program, purpose),
            Err(RunnerError::Spawn { reason, .. }) => {
                println!("   ❌ {} missing ({}): {}", program, purpose, reason);
                all_ok = false;
            }
            Err(e) => {
                println!("   ⚠️  {} did not respond: {}", program, e);
            }
        }
    }

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    if scan {
        println!("\n📊 Running full inventory scan...");
        let manager = Arc::new(ProcessManager::new(config.manager_config()));
        let records = manager.get_all(true).await;
        println!(
            "   ✅ {} processes classified in {:.0}ms ({:?})",
            records.len(),
            manager.last_scan_duration().as_secs_f64() * 1000.0,
            manager.state().await
        );
        for category in ProcessCategory::ALL {
            let count = records.iter().filter(|r| r.category() == category).count();
            println!("      {:<22} {}", category.display_name(), count);
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
