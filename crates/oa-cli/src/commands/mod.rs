//! CLI command implementations

mod clients;
mod config;
mod parse;
mod serve;

use std::path::Path;

use anyhow::{Context, Result};

use oa_daemon::{AdminState, Coordinator};

pub use clients::{
    issue_command, list_command, profile_command, revoke_command, revoke_plan_command,
    stats_command,
};
pub use config::{config_init, config_path, config_show, load_admin_config};
pub use parse::parse_command;
pub use serve::{reconcile_command, serve_command};

/// Load the configuration, open the registry and build a coordinator
pub async fn open_coordinator(config_path: Option<&Path>) -> Result<Coordinator> {
    let config = load_admin_config(config_path)?;
    let database = config.database_path.clone();
    let state = AdminState::open(config)
        .await
        .with_context(|| format!("Failed to open client registry at {:?}", database))?;
    Ok(Coordinator::new(state))
}
