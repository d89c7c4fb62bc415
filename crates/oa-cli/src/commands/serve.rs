//! Service and reconciliation commands

use anyhow::Result;

use oa_daemon::Coordinator;

use crate::output::{print_info, print_success, print_warning};

/// Run the reconciliation service until interrupted
pub async fn serve_command(coordinator: &Coordinator) -> Result<()> {
    let config = &coordinator.state().config;
    tracing::info!(
        "ovpn-admin starting (status file: {:?}, interval: {:?})",
        config.status_file,
        config.reconcile_interval
    );

    coordinator.start().await;
    wait_for_shutdown().await;
    coordinator.stop().await;

    tracing::info!("ovpn-admin shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

/// Run a single reconciliation cycle and report what changed
pub async fn reconcile_command(coordinator: &Coordinator) -> Result<()> {
    let result = coordinator.reconcile_now().await;

    for error in &result.errors {
        print_warning(&error.to_string());
    }
    if result.skipped() {
        anyhow::bail!("Reconciliation cycle was skipped");
    }

    for name in &result.orphaned {
        print_info(&format!("Session for unregistered client {} ignored", name));
    }
    print_success(&format!(
        "{} clients connected ({} previously connected rows reset first)",
        result.updated, result.reset
    ));
    Ok(())
}
