//! Output formatting utilities for the CLI
//!
//! Tables for clients, sessions and revocation steps, plus coloured
//! status lines.

use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use oa_core::outcome::{RevocationOutcome, StepStatus};
use oa_core::types::{ClientRecord, TrafficStats};
use oa_daemon::revoke::RevocationStep;
use oa_status::ClientSession;

/// Format registered clients as an ASCII table
///
/// The long form adds id, creation time and last connection time.
pub fn format_clients(clients: &[ClientRecord], long: bool) -> String {
    if clients.is_empty() {
        return "No clients registered".to_string();
    }

    #[derive(Tabled)]
    struct ClientRow {
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "RECEIVED")]
        received: String,
        #[tabled(rename = "SENT")]
        sent: String,
    }

    #[derive(Tabled)]
    struct ClientRowDetailed {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "RECEIVED")]
        received: String,
        #[tabled(rename = "SENT")]
        sent: String,
        #[tabled(rename = "CREATED")]
        created: String,
        #[tabled(rename = "LAST CONNECTED")]
        last_connected: String,
    }

    if long {
        let rows: Vec<ClientRowDetailed> = clients
            .iter()
            .map(|c| ClientRowDetailed {
                id: c.id,
                name: c.name.clone(),
                status: c.status.to_string(),
                received: format_bytes(c.bytes_received),
                sent: format_bytes(c.bytes_sent),
                created: c.created_at.format("%Y-%m-%d %H:%M").to_string(),
                last_connected: c.last_connected.clone().unwrap_or_else(|| "-".to_string()),
            })
            .collect();

        Table::new(rows)
            .with(Style::rounded())
            .with(Width::wrap(120))
            .to_string()
    } else {
        let rows: Vec<ClientRow> = clients
            .iter()
            .map(|c| ClientRow {
                name: c.name.clone(),
                status: c.status.to_string(),
                received: format_bytes(c.bytes_received),
                sent: format_bytes(c.bytes_sent),
            })
            .collect();

        Table::new(rows).with(Style::rounded()).to_string()
    }
}

/// Format parsed status report sessions as an ASCII table
pub fn format_sessions(sessions: &[ClientSession]) -> String {
    if sessions.is_empty() {
        return "No connected clients in report".to_string();
    }

    #[derive(Tabled)]
    struct SessionRow {
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "RECEIVED")]
        received: u64,
        #[tabled(rename = "SENT")]
        sent: u64,
        #[tabled(rename = "CONNECTED SINCE")]
        since: String,
    }

    let rows: Vec<SessionRow> = sessions
        .iter()
        .map(|s| SessionRow {
            name: s.name.clone(),
            received: s.bytes_received,
            sent: s.bytes_sent,
            since: s.connected_since.to_string(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format aggregate traffic figures
pub fn format_stats(stats: &TrafficStats) -> String {
    let mut output = String::new();
    output.push_str(&format!("Clients: {}\n", stats.clients));
    output.push_str(&format!("Connected: {}\n", stats.connected));
    output.push_str(&format!(
        "Bytes Received: {} ({})\n",
        stats.bytes_received,
        format_bytes(stats.bytes_received)
    ));
    output.push_str(&format!(
        "Bytes Sent: {} ({})\n",
        stats.bytes_sent,
        format_bytes(stats.bytes_sent)
    ));
    output
}

/// Format the planned revocation steps
pub fn format_plan(steps: &[RevocationStep]) -> String {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "#")]
        step: usize,
        #[tabled(rename = "STEP")]
        description: String,
        #[tabled(rename = "COMMAND")]
        command: String,
    }

    let rows: Vec<PlanRow> = steps
        .iter()
        .enumerate()
        .map(|(i, s)| PlanRow {
            step: i + 1,
            description: s.description.to_string(),
            command: s.command.to_string(),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(120))
        .to_string()
}

/// Format the per-step results of a revocation
pub fn format_revocation(outcome: &RevocationOutcome) -> String {
    #[derive(Tabled)]
    struct StepRow {
        #[tabled(rename = "#")]
        step: usize,
        #[tabled(rename = "STEP")]
        description: String,
        #[tabled(rename = "RESULT")]
        status: String,
        #[tabled(rename = "DETAIL")]
        detail: String,
    }

    let rows: Vec<StepRow> = outcome
        .steps
        .iter()
        .map(|s| StepRow {
            step: s.step,
            description: s.description.clone(),
            status: step_label(s.status).to_string(),
            detail: s.error.clone().unwrap_or_default(),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(120))
        .to_string()
}

fn step_label(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Succeeded => "ok",
        StepStatus::Failed => "FAILED",
        StepStatus::Warning => "warning",
    }
}

/// Format a byte count in binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow
///
/// Outputs to stderr.
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
