//! Parse anomaly types
//!
//! Anomalies describe lines the parser had to skip or patch up. They are
//! reported next to the parsed sessions and are never fatal.

use thiserror::Error;

/// Something unexpected the parser saw while reading a status report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseAnomaly {
    /// The report never opened a client list section
    #[error("No CLIENT LIST section found")]
    MissingClientSection,

    /// A placeholder connection that has not authenticated yet
    #[error("Line {line}: skipped unauthenticated client {name:?}")]
    Unauthenticated { line: usize, name: String },

    /// A data line with an empty name field
    #[error("Line {line}: empty client name")]
    EmptyName { line: usize },

    /// A counter column that is present but not an integer
    #[error("Line {line}: malformed {field} value {value:?}, using 0")]
    MalformedCounter {
        line: usize,
        field: &'static str,
        value: String,
    },

    /// A counter column that is absent
    #[error("Line {line}: missing {field} column, using 0")]
    MissingCounter { line: usize, field: &'static str },

    /// The same client listed twice; the later line replaces the earlier one
    #[error("Line {line}: duplicate client {name:?}, keeping the later entry")]
    DuplicateClient { line: usize, name: String },
}

impl ParseAnomaly {
    /// One-based line number the anomaly refers to, if any
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseAnomaly::MissingClientSection => None,
            ParseAnomaly::Unauthenticated { line, .. }
            | ParseAnomaly::EmptyName { line }
            | ParseAnomaly::MalformedCounter { line, .. }
            | ParseAnomaly::MissingCounter { line, .. }
            | ParseAnomaly::DuplicateClient { line, .. } => Some(*line),
        }
    }
}
