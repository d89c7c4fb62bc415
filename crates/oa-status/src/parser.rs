//! Status report parsing
//!
//! The report is split into sections by marker lines. Only lines between a
//! `CLIENT LIST` marker and the next `ROUTING TABLE` marker carry session
//! data, one comma-separated line per client:
//!
//! ```text
//! OpenVPN CLIENT LIST
//! Updated,Thu Jun 18 08:12:15 2015
//! Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since
//! alice,10.0.0.2:51234,1024,2048,Thu Jun 18 04:23:03 2015
//! ROUTING TABLE
//! ...
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::anomaly::ParseAnomaly;
use crate::session::{ClientSession, ConnectedSince};

/// Marker opening the client list section
pub const CLIENT_LIST_MARKER: &str = "CLIENT LIST";

/// Marker closing the client list section
pub const ROUTING_TABLE_MARKER: &str = "ROUTING TABLE";

/// Column header line inside the client list
const HEADER_NAME: &str = "Common Name";

/// Name used by the daemon for connections that have not authenticated
const UNDEF_SENTINEL: &str = "UNDEF";

/// Timestamp row the daemon writes right after the client list marker
const UPDATED_ROW: &str = "Updated";

const NAME_FIELD: usize = 0;
const BYTES_RECEIVED_FIELD: usize = 2;
const BYTES_SENT_FIELD: usize = 3;
const CONNECTED_SINCE_FIELD: usize = 4;

/// Result of parsing one status report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// One session per distinct client name, in first-seen order
    pub sessions: Vec<ClientSession>,
    /// Lines that were skipped or patched up
    pub anomalies: Vec<ParseAnomaly>,
}

impl StatusReport {
    /// Parse a report, substituting the current time for missing connection times
    pub fn parse(report: &str) -> Self {
        Self::parse_at(report, Utc::now())
    }

    /// Parse a report, substituting `now` for missing connection times
    pub fn parse_at(report: &str, now: DateTime<Utc>) -> Self {
        let mut parser = ReportParser::new(now);
        for (index, line) in report.lines().enumerate() {
            parser.feed(index + 1, line);
        }
        parser.finish()
    }

    /// Look up a session by client name
    pub fn session(&self, name: &str) -> Option<&ClientSession> {
        self.sessions.iter().find(|s| s.name == name)
    }

    /// Number of sessions in the report
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if the report lists no clients
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Parse a report into sessions using the current time for missing columns
pub fn parse(report: &str) -> Vec<ClientSession> {
    parse_at(report, Utc::now())
}

/// Parse a report into sessions using `now` for missing columns
pub fn parse_at(report: &str, now: DateTime<Utc>) -> Vec<ClientSession> {
    let parsed = StatusReport::parse_at(report, now);
    for anomaly in &parsed.anomalies {
        tracing::debug!("Status report anomaly: {}", anomaly);
    }
    parsed.sessions
}

/// Line-at-a-time state machine over the report sections
struct ReportParser {
    now: DateTime<Utc>,
    in_client_list: bool,
    saw_client_list: bool,
    sessions: Vec<ClientSession>,
    index_by_name: HashMap<String, usize>,
    anomalies: Vec<ParseAnomaly>,
}

impl ReportParser {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            in_client_list: false,
            saw_client_list: false,
            sessions: Vec::new(),
            index_by_name: HashMap::new(),
            anomalies: Vec::new(),
        }
    }

    fn feed(&mut self, line_no: usize, raw: &str) {
        let line = raw.trim_end_matches('\r');

        if line.contains(CLIENT_LIST_MARKER) {
            self.in_client_list = true;
            self.saw_client_list = true;
            return;
        }
        if line.contains(ROUTING_TABLE_MARKER) {
            self.in_client_list = false;
            return;
        }
        if !self.in_client_list || line.trim().is_empty() {
            return;
        }

        let raw_fields: Vec<&str> = line.split(',').collect();
        let fields: Vec<&str> = raw_fields.iter().map(|f| f.trim()).collect();
        let name = fields[NAME_FIELD];

        if name == HEADER_NAME {
            return;
        }
        if name == UPDATED_ROW && fields.len() == 2 {
            return;
        }
        if name.contains(UNDEF_SENTINEL) {
            self.anomalies.push(ParseAnomaly::Unauthenticated {
                line: line_no,
                name: name.to_string(),
            });
            return;
        }
        if name.is_empty() {
            self.anomalies.push(ParseAnomaly::EmptyName { line: line_no });
            return;
        }

        let bytes_received = self.counter(&fields, BYTES_RECEIVED_FIELD, "bytes received", line_no);
        let bytes_sent = self.counter(&fields, BYTES_SENT_FIELD, "bytes sent", line_no);
        // Kept as the daemon wrote it; only blankness is judged on the trimmed value
        let connected_since = match raw_fields.get(CONNECTED_SINCE_FIELD) {
            Some(raw) if !raw.trim().is_empty() => ConnectedSince::Reported(raw.to_string()),
            _ => ConnectedSince::Observed(self.now),
        };

        let session = ClientSession {
            name: name.to_string(),
            bytes_received,
            bytes_sent,
            connected_since,
        };
        self.record(line_no, session);
    }

    fn counter(
        &mut self,
        fields: &[&str],
        index: usize,
        field: &'static str,
        line_no: usize,
    ) -> u64 {
        match fields.get(index) {
            Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
                self.anomalies.push(ParseAnomaly::MalformedCounter {
                    line: line_no,
                    field,
                    value: raw.to_string(),
                });
                0
            }),
            None => {
                self.anomalies.push(ParseAnomaly::MissingCounter {
                    line: line_no,
                    field,
                });
                0
            }
        }
    }

    fn record(&mut self, line_no: usize, session: ClientSession) {
        match self.index_by_name.get(&session.name) {
            Some(&slot) => {
                self.anomalies.push(ParseAnomaly::DuplicateClient {
                    line: line_no,
                    name: session.name.clone(),
                });
                self.sessions[slot] = session;
            }
            None => {
                self.index_by_name
                    .insert(session.name.clone(), self.sessions.len());
                self.sessions.push(session);
            }
        }
    }

    fn finish(mut self) -> StatusReport {
        if !self.saw_client_list {
            self.anomalies.push(ParseAnomaly::MissingClientSection);
        }
        StatusReport {
            sessions: self.sessions,
            anomalies: self.anomalies,
        }
    }
}
