//! ovpn-admin: Command-line interface for OpenVPN client administration
//!
//! Provides the `ovpn-admin` CLI for running the reconciliation service,
//! issuing and revoking client certificates, and inspecting client state.

pub mod commands;
pub mod output;
