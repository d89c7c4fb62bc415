//! Parse command implementation

use std::path::Path;

use anyhow::{Context, Result};

use oa_status::StatusReport;

use crate::output::{format_sessions, print_warning};

/// Parse a status report file and print the sessions it lists
///
/// Works without a registry, so it can be pointed at any captured report.
pub fn parse_command(file: &Path, json: bool) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
    let text = String::from_utf8_lossy(&bytes);
    let report = StatusReport::parse(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&report.sessions)?);
    } else {
        println!("{}", format_sessions(&report.sessions));
    }

    for anomaly in &report.anomalies {
        print_warning(&anomaly.to_string());
    }
    Ok(())
}
