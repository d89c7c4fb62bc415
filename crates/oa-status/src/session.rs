//! Client session type

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Formats the daemon uses for the "Connected Since" column
const REPORT_TIME_FORMATS: &[&str] = &["%a %b %e %H:%M:%S %Y", "%Y-%m-%d %H:%M:%S"];

/// One connected client as listed in a single status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSession {
    /// Certificate common name of the client
    pub name: String,
    /// Bytes received from the client
    pub bytes_received: u64,
    /// Bytes sent to the client
    pub bytes_sent: u64,
    /// When the client connected
    pub connected_since: ConnectedSince,
}

/// Connection start time of a session
///
/// The report's own text is kept verbatim. When the report has no such
/// column, the time the report was parsed is used instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConnectedSince {
    /// Verbatim text from the report
    Reported(String),
    /// Wall-clock time substituted at parse time
    Observed(DateTime<Utc>),
}

impl ConnectedSince {
    /// Best-effort conversion to a timestamp
    ///
    /// Report times carry no zone and are read as UTC.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            ConnectedSince::Observed(at) => Some(*at),
            ConnectedSince::Reported(raw) => {
                let raw = raw.trim();
                if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
                    return Some(at.with_timezone(&Utc));
                }
                REPORT_TIME_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                    .map(|naive| naive.and_utc())
            }
        }
    }

    /// Value persisted as a client's last connection time
    ///
    /// RFC 3339 when the time can be understood, otherwise the raw text.
    pub fn to_record_value(&self) -> String {
        match self.timestamp() {
            Some(at) => at.to_rfc3339(),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for ConnectedSince {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectedSince::Reported(raw) => write!(f, "{}", raw),
            ConnectedSince::Observed(at) => write!(f, "{}", at.to_rfc3339()),
        }
    }
}
