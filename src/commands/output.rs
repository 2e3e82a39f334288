//! Terminal rendering shared by the process subcommands.

use herakles_proc_monitor::{ProcessCategory, ProcessRecord, ProcessType};

use crate::cli::OutputFormat;

const COMMAND_WIDTH: usize = 28;

/// Prints records as an aligned table or as a JSON array.
pub fn print_records(records: &[ProcessRecord], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Table => print!("{}", render_table(records)),
    }
    Ok(())
}

pub fn render_table(records: &[ProcessRecord]) -> String {
    let mut out = format!(
        "{:>7} {:>6} {:>6}  {:<width$} {:<20} {}\n",
        "PID",
        "CPU%",
        "MEM%",
        "COMMAND",
        "TYPE",
        "PATH",
        width = COMMAND_WIDTH
    );
    for record in records {
        out.push_str(&format!(
            "{:>7} {:>6.1} {:>6.1}  {:<width$} {:<20} {}\n",
            record.pid(),
            record.cpu_percent,
            record.memory_percent,
            truncate(&record.command, COMMAND_WIDTH),
            record.process_type().display_name(),
            record.executable_path,
            width = COMMAND_WIDTH
        ));
    }
    out
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let mut short: String = value.chars().take(width - 1).collect();
        short.push('…');
        short
    }
}

/// Parses a `--category` value, listing the accepted names on failure.
pub fn parse_category(name: &str) -> anyhow::Result<ProcessCategory> {
    ProcessCategory::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = ProcessCategory::ALL.iter().map(|c| c.as_str()).collect();
        anyhow::anyhow!("Unknown category '{}', expected one of: {}", name, known.join(", "))
    })
}

/// Parses a `--type` value, listing the accepted names on failure.
pub fn parse_type(name: &str) -> anyhow::Result<ProcessType> {
    ProcessType::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = ProcessType::ALL.iter().map(|t| t.as_str()).collect();
        anyhow::anyhow!("Unknown process type '{}', expected one of: {}", name, known.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 5), "abcd…");
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(parse_category("daemons").unwrap(), ProcessCategory::Daemons);
        assert_eq!(parse_type("kernel").unwrap(), ProcessType::Kernel);
        let err = parse_type("zombie").unwrap_err().to_string();
        assert!(err.contains("user_application"));
    }
}
