//! Client lifecycle commands

use std::path::Path;

use anyhow::{Context, Result};

use oa_core::config::AdminConfig;
use oa_core::error::{IssuanceError, RevocationError};
use oa_core::types::ClientName;
use oa_daemon::revoke::revocation_plan;
use oa_daemon::Coordinator;

use crate::output::{
    format_clients, format_plan, format_revocation, format_stats, print_error, print_info,
    print_success, print_warning,
};

/// List registered clients
pub async fn list_command(coordinator: &Coordinator, long: bool, json: bool) -> Result<()> {
    let clients = coordinator
        .list_clients()
        .await
        .context("Failed to list clients")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&clients)?);
    } else {
        println!("{}", format_clients(&clients, long));
    }
    Ok(())
}

/// Show aggregate traffic
pub async fn stats_command(coordinator: &Coordinator, json: bool) -> Result<()> {
    let stats = coordinator
        .traffic_stats()
        .await
        .context("Failed to read traffic stats")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", format_stats(&stats));
    }
    Ok(())
}

/// Issue a certificate for a new client
pub async fn issue_command(coordinator: &Coordinator, name: &str) -> Result<()> {
    print_info(&format!("Issuing certificate for {}...", name));
    let outcome = coordinator.issue(name).await.map_err(|e| {
        print_error(&format!("Issuance failed: {}", e));
        if let IssuanceError::Execution(exec) = &e {
            for (stream, text) in [("stderr", exec.stderr()), ("stdout", exec.stdout())] {
                let text = text.trim_end();
                if !text.is_empty() {
                    print_error(&format!("easyrsa {}:\n{}", stream, text));
                }
            }
        }
        e
    })?;

    print_success(&format!(
        "Client {} created (id {})",
        outcome.record.name, outcome.record.id
    ));
    Ok(())
}

/// Print the steps a revocation would run without running them
pub fn revoke_plan_command(config: &AdminConfig, name: &str) -> Result<()> {
    let name = ClientName::parse(name)?;
    let plan = revocation_plan(&config.pki, &config.openvpn, &name);
    print_info(&format!("Revoking {} would run:", name));
    println!("{}", format_plan(&plan));
    Ok(())
}

/// Revoke a client
pub async fn revoke_command(coordinator: &Coordinator, name: &str) -> Result<()> {
    match coordinator.revoke(name).await {
        Ok(outcome) => {
            println!("{}", format_revocation(&outcome));
            let failed = outcome.failed_steps().count();
            if !outcome.removed {
                print_warning(&format!("No registry row for {} was deleted", name));
            }
            if failed > 0 {
                print_warning(&format!(
                    "{} of {} steps failed; see the audit log for details",
                    failed,
                    outcome.steps.len()
                ));
            } else {
                print_success(&format!("Client {} revoked", name));
            }
            Ok(())
        }
        Err(RevocationError::DatabaseDeleteFailed {
            name,
            error,
            outcome,
        }) => {
            println!("{}", format_revocation(&outcome));
            print_error(&format!(
                "Certificate steps ran but {} is still in the registry: {}",
                name, error
            ));
            anyhow::bail!("Registry delete for {} failed", name)
        }
        Err(e) => {
            print_error(&format!("Revocation failed: {}", e));
            Err(e.into())
        }
    }
}

/// Render a client profile to stdout or a file
pub async fn profile_command(
    coordinator: &Coordinator,
    name: &str,
    output: Option<&Path>,
) -> Result<()> {
    let profile = coordinator
        .render_profile(name)
        .await
        .with_context(|| format!("Failed to render profile for {}", name))?;

    match output {
        Some(path) => {
            std::fs::write(path, profile)
                .with_context(|| format!("Failed to write profile to {:?}", path))?;
            print_success(&format!("Profile written to {:?}", path));
        }
        None => print!("{}", profile),
    }
    Ok(())
}
