//! Inspect and system command implementations.

use herakles_proc_monitor::ProcessManager;
use std::sync::Arc;

use crate::cli::OutputFormat;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Prints one process with parent pid, owning user and start time.
pub async fn command_inspect(
    manager: &Arc<ProcessManager>,
    pid: u32,
    format: OutputFormat,
) -> anyhow::Result<()> {
    manager.get_all(false).await;
    let Some(record) = manager.inspect(pid).await else {
        anyhow::bail!("No process with pid {} in the current inventory", pid);
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let none = || "-".to_string();
    println!("PID:          {}", record.pid());
    println!("Command:      {}", record.command);
    println!("Path:         {}", record.executable_path);
    println!("Type:         {}", record.process_type());
    println!("Category:     {}", record.category());
    println!("Application:  {}", if record.is_application() { "yes" } else { "no" });
    println!(
        "Bundle ID:    {}",
        record.bundle_identifier().map(str::to_string).unwrap_or_else(none)
    );
    println!("CPU:          {:.1}%", record.cpu_percent);
    println!("Memory:       {:.1}%", record.memory_percent);
    println!(
        "Parent PID:   {}",
        record.parent_pid.map(|p| p.to_string()).unwrap_or_else(none)
    );
    println!("User:         {}", record.owning_user.clone().unwrap_or_else(none));
    println!(
        "Started:      {}",
        record
            .start_time
            .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(none)
    );
    Ok(())
}

/// Prints aggregate memory totals.
pub async fn command_system(manager: &Arc<ProcessManager>, format: OutputFormat) -> anyhow::Result<()> {
    let memory = manager
        .system_info()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&memory)?),
        OutputFormat::Table => {
            println!("Total:  {:>8.2} GiB", memory.total_bytes as f64 / GIB);
            println!("Used:   {:>8.2} GiB", memory.used_bytes as f64 / GIB);
            println!("Free:   {:>8.2} GiB", memory.free_bytes as f64 / GIB);
            println!("Usage:  {:>8.1} %", memory.used_percent);
        }
    }
    Ok(())
}
