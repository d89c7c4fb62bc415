//! Collaborator trait definitions
//!
//! The reconciliation engine, revocation sequencer and issuance path are
//! written against these traits so that tests can substitute in-memory
//! implementations.

mod audit;
mod executor;
mod registry;
mod source;

pub use audit::AuditSink;
pub use executor::CommandExecutor;
pub use registry::{RegistryStore, SnapshotApplied};
pub use source::StatusSource;
