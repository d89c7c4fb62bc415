//! oa-status: Parser for the OpenVPN connection status report
//!
//! The VPN daemon periodically writes a section-based text snapshot of the
//! clients connected to it. This crate turns that snapshot into typed
//! [`ClientSession`] records. Parsing is total: malformed input degrades to
//! fewer sessions plus a list of [`ParseAnomaly`] values, never an error.

pub mod anomaly;
pub mod parser;
pub mod session;

pub use anomaly::ParseAnomaly;
pub use parser::{parse, parse_at, StatusReport, CLIENT_LIST_MARKER, ROUTING_TABLE_MARKER};
pub use session::{ClientSession, ConnectedSince};
