//! Kill command implementation.

use herakles_proc_monitor::ProcessManager;
use std::sync::Arc;

/// Sends SIGTERM (or SIGKILL with `force`) and reports the outcome.
pub async fn command_kill(manager: &Arc<ProcessManager>, pid: u32, force: bool) -> anyhow::Result<()> {
    let target = manager
        .get_all(false)
        .await
        .into_iter()
        .find(|r| r.pid() == pid);
    let label = match &target {
        Some(record) => format!("{} ({})", pid, record.command),
        None => pid.to_string(),
    };

    let delivered = if force {
        manager.force_kill_process(pid).await
    } else {
        manager.kill_process(pid).await
    };

    if delivered {
        println!(
            "✅ Sent {} to {}",
            if force { "SIGKILL" } else { "SIGTERM" },
            label
        );
        Ok(())
    } else if force {
        anyhow::bail!("Failed to kill {}", label)
    } else {
        anyhow::bail!("Failed to terminate {}; retry with --force", label)
    }
}
