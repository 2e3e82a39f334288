//! List and top command implementations.

use herakles_proc_monitor::{InventoryState, ProcessManager};
use std::sync::Arc;
use tracing::warn;

use crate::cli::{OutputFormat, SortKey};
use crate::commands::output::{parse_category, parse_type, print_records};

/// Prints the classified inventory, optionally narrowed to one category and/or type.
pub async fn command_list(
    manager: &Arc<ProcessManager>,
    category: Option<String>,
    process_type: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let category = category.as_deref().map(parse_category).transpose()?;
    let process_type = process_type.as_deref().map(parse_type).transpose()?;

    let all = manager.get_all(false).await;
    warn_if_degraded(manager).await;

    let mut records = match category {
        Some(category) => manager.by_category(category).await,
        None => all,
    };
    if let Some(process_type) = process_type {
        records.retain(|r| r.process_type() == process_type);
    }

    print_records(&records, format)?;
    if format == OutputFormat::Table {
        println!("\n{} processes", records.len());
    }
    Ok(())
}

/// Prints the `count` busiest processes by CPU or memory.
pub async fn command_top(
    manager: &Arc<ProcessManager>,
    count: usize,
    by: SortKey,
    format: OutputFormat,
) -> anyhow::Result<()> {
    manager.get_all(false).await;
    warn_if_degraded(manager).await;

    let records = match by {
        SortKey::Cpu => manager.top_by_cpu(count).await,
        SortKey::Memory => manager.top_by_memory(count).await,
    };
    print_records(&records, format)
}

async fn warn_if_degraded(manager: &ProcessManager) {
    if manager.state().await == InventoryState::Degraded {
        warn!("Process table unavailable; showing registered applications only");
    }
}
