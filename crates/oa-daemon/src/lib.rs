//! oa-daemon: Client state reconciliation and certificate lifecycle engine
//!
//! The engine keeps a persistent registry of VPN clients in line with the
//! daemon's status report, and drives the external PKI tool to issue and
//! revoke client certificates. The [`Coordinator`] owns the background
//! reconciliation task and exposes every operation to callers.

pub mod audit;
pub mod coordinator;
pub mod exec;
pub mod issue;
pub mod profile;
pub mod reconcile;
pub mod registry;
pub mod revoke;
pub mod source;
pub mod state;

pub use coordinator::Coordinator;
pub use state::AdminState;
