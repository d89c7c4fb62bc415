//! Core error types for ovpn-admin

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::outcome::RevocationOutcome;

/// Top-level error type for the ovpn-admin ecosystem
#[derive(Error, Debug)]
pub enum OaError {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// External command error
    #[error("Execution error: {0}")]
    Execution(#[from] ExecError),

    /// Status source error
    #[error("Status source error: {0}")]
    Source(#[from] SourceError),

    /// Audit sink error
    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Revocation error
    #[error("Revocation error: {0}")]
    Revocation(#[from] RevocationError),

    /// Issuance error
    #[error("Issuance error: {0}")]
    Issuance(#[from] IssuanceError),

    /// Profile error
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Client name does not satisfy the naming rule
    #[error("Invalid client name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
}

/// Client registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No record with this name
    #[error("Client not found: {0}")]
    NotFound(String),

    /// A record with this name already exists
    #[error("Client already exists: {0}")]
    DuplicateName(String),

    /// Underlying store failure
    #[error("Database error: {0}")]
    Database(String),

    /// Stored row could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// External command errors
#[derive(Error, Debug)]
pub enum ExecError {
    /// The process could not be started
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exited unsuccessfully
    #[error("`{command}` exited with {}", exit_label(*code))]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The process ran past its time limit and was killed
    #[error("`{command}` timed out after {after:?}")]
    Timeout { command: String, after: Duration },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (killed by signal)".to_string(),
    }
}

impl ExecError {
    /// Captured standard output, if the process got far enough to produce any
    pub fn stdout(&self) -> &str {
        match self {
            ExecError::NonZeroExit { stdout, .. } => stdout,
            _ => "",
        }
    }

    /// Captured standard error, if the process got far enough to produce any
    pub fn stderr(&self) -> &str {
        match self {
            ExecError::NonZeroExit { stderr, .. } => stderr,
            _ => "",
        }
    }
}

/// Status report source errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// The report could not be read
    #[error("Failed to read status report {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source is unavailable for another reason
    #[error("Status report unavailable: {0}")]
    Unavailable(String),
}

/// Audit sink errors
#[derive(Error, Debug)]
pub enum AuditError {
    /// The audit log could not be written
    #[error("Audit log write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The entry could not be encoded
    #[error("Audit entry encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors collected during a reconciliation cycle
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The status report could not be read; the cycle was skipped
    #[error("Cycle skipped: {0}")]
    Source(#[from] SourceError),

    /// The snapshot batch could not be started, reset or committed; the
    /// cycle was skipped
    #[error("Cycle skipped: {0}")]
    Snapshot(RegistryError),

    /// Updating one client failed
    #[error("Update of {name} failed: {error}")]
    Update { name: String, error: RegistryError },
}

/// Revocation call failures
#[derive(Error, Debug)]
pub enum RevocationError {
    /// Client name failed validation; no step was attempted
    #[error(transparent)]
    InvalidName(#[from] ValidationError),

    /// No such client; no step was attempted
    #[error("Client not found: {0}")]
    NotFound(String),

    /// Client lookup failed; no step was attempted
    #[error("Client lookup failed: {0}")]
    Lookup(RegistryError),

    /// Every step ran but the registry delete failed
    #[error("Registry delete for {name} failed: {error}")]
    DatabaseDeleteFailed {
        name: String,
        error: RegistryError,
        outcome: Box<RevocationOutcome>,
    },
}

/// Issuance call failures
#[derive(Error, Debug)]
pub enum IssuanceError {
    /// Client name failed validation; nothing was run
    #[error(transparent)]
    InvalidName(#[from] ValidationError),

    /// Client already exists; nothing was run
    #[error("Client already exists: {0}")]
    DuplicateName(String),

    /// The PKI tool failed; no record was created
    #[error("Certificate issuance failed: {0}")]
    Execution(#[from] ExecError),

    /// Registry access failed
    #[error("Registry error: {0}")]
    Registry(RegistryError),
}

/// Client profile rendering errors
#[derive(Error, Debug)]
pub enum ProfileError {
    /// Client name failed validation
    #[error(transparent)]
    InvalidName(#[from] ValidationError),

    /// No such client
    #[error("Client not found: {0}")]
    NotFound(String),

    /// Registry access failed
    #[error("Registry error: {0}")]
    Registry(RegistryError),

    /// A template or PKI artifact could not be read
    #[error("Failed to read {path:?}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A PKI artifact does not contain the expected PEM block
    #[error("No PEM block found in {0:?}")]
    MissingPem(PathBuf),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
