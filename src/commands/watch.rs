//! Watch command implementation.
//!
//! Drives the manager's periodic refresh and redraws the busiest processes
//! after every scan until Ctrl+C or the iteration limit.

use herakles_proc_monitor::{ProcessManager, ProcessRecord};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;

use crate::commands::output::render_table;

pub async fn command_watch(
    manager: &Arc<ProcessManager>,
    interval: Duration,
    count: usize,
    iterations: usize,
) -> anyhow::Result<()> {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(Notify::new());

    let handle = {
        let refreshes = Arc::clone(&refreshes);
        let done = Arc::clone(&done);
        manager.start_auto_refresh(interval, move |records: &[ProcessRecord]| {
            let mut busiest = records.to_vec();
            busiest.sort_by(|a, b| {
                b.cpu_percent
                    .partial_cmp(&a.cpu_percent)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            busiest.truncate(count);

            let n = refreshes.fetch_add(1, Ordering::Relaxed) + 1;
            // Clear screen and home the cursor.
            print!("\x1b[2J\x1b[H");
            println!(
                "herakles-proc-monitor  refresh #{}  {} processes  (every {:?}, Ctrl+C to quit)\n",
                n,
                records.len(),
                interval
            );
            print!("{}", render_table(&busiest));

            if iterations > 0 && n >= iterations {
                done.notify_one();
            }
        })
    };

    tokio::select! {
        _ = done.notified() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping watch");
        }
    }

    handle.stop();
    Ok(())
}
