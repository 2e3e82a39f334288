//! System-wide memory accounting.
//!
//! Sourced from the OS memory counters, independent of the per-process scan:
//! `/proc/meminfo` on Linux, `sysctl hw.memsize` plus `vm_stat` on macOS.

use serde::Serialize;
use std::time::Duration;

use crate::runner::CommandRunner;

const TOOL_TIMEOUT: Duration = Duration::from_secs(2);

/// Aggregate memory totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemMemory {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub used_percent: f64,
}

impl SystemMemory {
    fn from_total_and_used(total_bytes: u64, used_bytes: u64) -> Self {
        let used_bytes = used_bytes.min(total_bytes);
        let used_percent = if total_bytes > 0 {
            used_bytes as f64 / total_bytes as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_bytes,
            used_bytes,
            free_bytes: total_bytes - used_bytes,
            used_percent,
        }
    }
}

/// Parses `/proc/meminfo`; used memory is `MemTotal - MemAvailable`.
pub fn parse_meminfo(content: &str) -> Result<SystemMemory, String> {
    let mut total_bytes: Option<u64> = None;
    let mut available_bytes: Option<u64> = None;

    for line in content.lines() {
        let target = if line.starts_with("MemTotal:") {
            &mut total_bytes
        } else if line.starts_with("MemAvailable:") {
            &mut available_bytes
        } else {
            continue;
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 2 {
            if let Ok(kb) = parts[1].parse::<u64>() {
                *target = Some(kb * 1024);
            }
        }
        if total_bytes.is_some() && available_bytes.is_some() {
            break;
        }
    }

    match (total_bytes, available_bytes) {
        (Some(total), Some(available)) => Ok(SystemMemory::from_total_and_used(
            total,
            total.saturating_sub(available),
        )),
        _ => Err("Failed to parse required fields from /proc/meminfo".to_string()),
    }
}

/// Parses `vm_stat` output; used memory is active + wired + compressed pages.
pub fn parse_vm_stat(content: &str, total_bytes: u64) -> Result<SystemMemory, String> {
    let mut page_size: u64 = 4096;
    let mut used_pages: u64 = 0;
    let mut matched = 0;

    for line in content.lines() {
        if let Some(rest) = line.split("page size of ").nth(1) {
            if let Some(size) = rest.split_whitespace().next().and_then(|v| v.parse().ok()) {
                page_size = size;
            }
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if matches!(
            key.trim(),
            "Pages active" | "Pages wired down" | "Pages occupied by compressor"
        ) {
            let pages: u64 = value
                .trim()
                .trim_end_matches('.')
                .parse()
                .map_err(|e| format!("Invalid vm_stat value for {}: {}", key.trim(), e))?;
            used_pages += pages;
            matched += 1;
        }
    }

    if matched == 0 {
        return Err("vm_stat output contained no page counters".to_string());
    }
    Ok(SystemMemory::from_total_and_used(
        total_bytes,
        used_pages * page_size,
    ))
}

/// Reads aggregate memory totals for the running platform.
pub fn read_system_memory(runner: &dyn CommandRunner) -> Result<SystemMemory, String> {
    if cfg!(target_os = "macos") {
        let memsize = runner
            .run("sysctl", &["-n", "hw.memsize"], TOOL_TIMEOUT)
            .map_err(|e| format!("Failed to run sysctl: {}", e))?;
        let total: u64 = memsize
            .stdout
            .trim()
            .parse()
            .map_err(|e| format!("Invalid hw.memsize value: {}", e))?;
        let vm_stat = runner
            .run("vm_stat", &[], TOOL_TIMEOUT)
            .map_err(|e| format!("Failed to run vm_stat: {}", e))?;
        parse_vm_stat(&vm_stat.stdout, total)
    } else {
        let content = std::fs::read_to_string("/proc/meminfo")
            .map_err(|e| format!("Failed to read /proc/meminfo: {}", e))?;
        parse_meminfo(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meminfo() {
        let content = "MemTotal:       16384000 kB\nMemFree:         1000000 kB\nMemAvailable:    4096000 kB\n";
        let mem = parse_meminfo(content).unwrap();
        assert_eq!(mem.total_bytes, 16384000 * 1024);
        assert_eq!(mem.free_bytes, 4096000 * 1024);
        assert!((mem.used_percent - 75.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_meminfo_missing_fields() {
        assert!(parse_meminfo("MemTotal: 100 kB\n").is_err());
    }

    #[test]
    fn test_parse_vm_stat() {
        let content = "\
Mach Virtual Memory Statistics: (page size of 16384 bytes)
Pages free:                               10000.
Pages active:                            100000.
Pages inactive:                           50000.
Pages wired down:                         50000.
Pages occupied by compressor:             50000.
\"Translation faults\":                 123456789.
";
        let total = 16 * 1024 * 1024 * 1024u64;
        let mem = parse_vm_stat(content, total).unwrap();
        assert_eq!(mem.used_bytes, 200000 * 16384);
        assert_eq!(mem.total_bytes, total);
        assert_eq!(mem.free_bytes, total - 200000 * 16384);
    }

    #[test]
    fn test_parse_vm_stat_garbage() {
        assert!(parse_vm_stat("nothing useful", 1024).is_err());
    }

    #[test]
    fn test_zero_total_does_not_divide_by_zero() {
        let mem = SystemMemory::from_total_and_used(0, 10);
        assert_eq!(mem.used_percent, 0.0);
        assert_eq!(mem.used_bytes, 0);
    }
}
