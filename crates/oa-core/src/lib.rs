//! oa-core: Core abstractions and configuration for ovpn-admin
//!
//! This crate provides the shared domain types, the error taxonomy, the
//! collaborator traits (status source, registry store, command executor,
//! audit sink) and the configuration structures used by the daemon and CLI.

pub mod audit;
pub mod command;
pub mod config;
pub mod error;
pub mod outcome;
pub mod traits;
pub mod types;

pub use audit::RevocationAuditEntry;
pub use command::{CommandOutput, CommandSpec};
pub use error::OaError;
pub use outcome::{
    IssuanceOutcome, ReconciliationResult, RevocationOutcome, StepResult, StepStatus,
};
pub use types::{ClientName, ClientRecord, ClientStatus, StatusUpdate, TrafficStats};
