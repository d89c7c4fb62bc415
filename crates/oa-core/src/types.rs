//! Core domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Longest accepted client name
pub const MAX_CLIENT_NAME_LEN: usize = 64;

/// Validated client name
///
/// The name is the join key between certificate files, registry rows and
/// status report sessions, and it is interpolated into command arguments and
/// file paths. Only ASCII alphanumerics, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientName(String);

impl ClientName {
    /// Validate a raw name
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let name = raw.into();
        let reason = if name.is_empty() {
            Some("name is empty")
        } else if name.len() > MAX_CLIENT_NAME_LEN {
            Some("name is longer than 64 characters")
        } else if name.chars().any(char::is_whitespace) {
            Some("name contains whitespace")
        } else if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            Some("only letters, digits, '-' and '_' are allowed")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ValidationError::InvalidName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    /// Get the raw name string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ClientName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ClientName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ClientName {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<ClientName> for String {
    fn from(name: ClientName) -> Self {
        name.0
    }
}

/// Last observed connection state of a client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    /// Listed in the most recent status report
    Connected,
    /// Not listed in the most recent status report
    #[default]
    Disconnected,
}

impl ClientStatus {
    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Connected => "connected",
            ClientStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(ClientStatus::Connected),
            "disconnected" => Ok(ClientStatus::Disconnected),
            other => Err(format!("unknown client status {:?}", other)),
        }
    }
}

/// Persistent registry row for a known client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Registry-assigned identifier
    pub id: i64,
    /// Unique client name
    pub name: String,
    /// When the client was issued
    pub created_at: DateTime<Utc>,
    /// Connection start time from the last report that listed the client
    pub last_connected: Option<String>,
    /// Bytes received from the client
    pub bytes_received: u64,
    /// Bytes sent to the client
    pub bytes_sent: u64,
    /// Connection status
    pub status: ClientStatus,
}

impl ClientRecord {
    /// Check if the client was connected at the last reconciliation
    pub fn is_connected(&self) -> bool {
        self.status == ClientStatus::Connected
    }
}

/// Per-client update applied by a reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Client name to update
    pub name: String,
    /// New status
    pub status: ClientStatus,
    /// New last connection time
    pub last_connected: Option<String>,
    /// New bytes received counter
    pub bytes_received: u64,
    /// New bytes sent counter
    pub bytes_sent: u64,
}

impl StatusUpdate {
    /// Build a `connected` update from a parsed session
    pub fn from_session(session: &oa_status::ClientSession) -> Self {
        Self {
            name: session.name.clone(),
            status: ClientStatus::Connected,
            last_connected: Some(session.connected_since.to_record_value()),
            bytes_received: session.bytes_received,
            bytes_sent: session.bytes_sent,
        }
    }
}

/// Aggregate traffic across all registered clients
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficStats {
    /// Number of registered clients
    pub clients: usize,
    /// Number of clients currently connected
    pub connected: usize,
    /// Sum of bytes received
    pub bytes_received: u64,
    /// Sum of bytes sent
    pub bytes_sent: u64,
}

impl TrafficStats {
    /// Sum up a set of records
    pub fn from_records(records: &[ClientRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, r| {
            acc.clients += 1;
            if r.is_connected() {
                acc.connected += 1;
            }
            acc.bytes_received = acc.bytes_received.saturating_add(r.bytes_received);
            acc.bytes_sent = acc.bytes_sent.saturating_add(r.bytes_sent);
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_name_accepts_valid() {
        for raw in ["alice", "client-01", "ops_team", "A1"] {
            assert_eq!(ClientName::parse(raw).unwrap().as_str(), raw);
        }
        let longest = "a".repeat(MAX_CLIENT_NAME_LEN);
        assert!(ClientName::parse(longest).is_ok());
    }

    #[test]
    fn test_client_name_rejects_invalid() {
        let too_long = "a".repeat(MAX_CLIENT_NAME_LEN + 1);
        for raw in [
            "",
            "bad name",
            "tab\tname",
            "../etc",
            "a;rm",
            "x$(y)",
            "ünïcode",
            too_long.as_str(),
        ] {
            assert!(ClientName::parse(raw).is_err(), "{:?} should be rejected", raw);
        }
    }

    #[test]
    fn test_client_name_reason() {
        let err = ClientName::parse("bad name").unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidName {
                name: "bad name".to_string(),
                reason: "name contains whitespace"
            }
        );
    }

    #[test]
    fn test_client_name_serde_validates() {
        let ok: ClientName = serde_json::from_str(r#""alice""#).unwrap();
        assert_eq!(ok.as_str(), "alice");
        assert!(serde_json::from_str::<ClientName>(r#""a b""#).is_err());
    }

    #[test]
    fn test_client_status_roundtrip_str() {
        assert_eq!(ClientStatus::Connected.to_string(), "connected");
        assert_eq!(
            "disconnected".parse::<ClientStatus>().unwrap(),
            ClientStatus::Disconnected
        );
        assert!("active".parse::<ClientStatus>().is_err());
    }

    fn record(name: &str, status: ClientStatus, rx: u64, tx: u64) -> ClientRecord {
        ClientRecord {
            id: 1,
            name: name.to_string(),
            created_at: Utc::now(),
            last_connected: None,
            bytes_received: rx,
            bytes_sent: tx,
            status,
        }
    }

    #[test]
    fn test_traffic_stats() {
        let records = vec![
            record("a", ClientStatus::Connected, 10, 20),
            record("b", ClientStatus::Disconnected, 1, 2),
        ];
        let stats = TrafficStats::from_records(&records);
        assert_eq!(
            stats,
            TrafficStats {
                clients: 2,
                connected: 1,
                bytes_received: 11,
                bytes_sent: 22,
            }
        );
    }
}
