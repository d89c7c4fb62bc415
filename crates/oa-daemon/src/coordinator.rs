//! Process-wide coordinator
//!
//! The `Coordinator` owns the background reconciliation task and is the
//! single entry point for every engine operation. The task has an explicit
//! lifecycle: [`Coordinator::start`] spawns it (its first cycle runs
//! immediately) and [`Coordinator::stop`] cancels it and waits for it to
//! exit.
//!
//! # Serialization
//!
//! Timer-driven cycles and [`Coordinator::reconcile_now`] go through the
//! same [`Reconciler`], which never runs two cycles at once. Revocation and
//! issuance run concurrently with reconciliation; conflicting writes to the
//! same client resolve as last write wins.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use oa_core::error::{IssuanceError, ProfileError, RegistryError, RevocationError, ValidationError};
use oa_core::outcome::{IssuanceOutcome, ReconciliationResult, RevocationOutcome};
use oa_core::types::{ClientName, ClientRecord, TrafficStats};

use crate::issue::Issuer;
use crate::profile::ProfileRenderer;
use crate::reconcile::{run_reconcile_loop, Reconciler};
use crate::revoke::{RevocationSequencer, RevocationStep};
use crate::state::AdminState;

struct ReconcileTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the reconciliation task and dispatches engine operations
pub struct Coordinator {
    state: Arc<AdminState>,
    reconciler: Arc<Reconciler>,
    sequencer: RevocationSequencer,
    issuer: Issuer,
    profiles: ProfileRenderer,
    task: Mutex<Option<ReconcileTask>>,
}

impl Coordinator {
    /// Create a coordinator over the given state; nothing runs until `start`
    pub fn new(state: AdminState) -> Self {
        let state = Arc::new(state);
        let config = &state.config;

        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&state.source),
            Arc::clone(&state.registry),
        ));
        let sequencer = RevocationSequencer::new(
            Arc::clone(&state.registry),
            Arc::clone(&state.executor),
            Arc::clone(&state.audit),
            config.pki.clone(),
            config.openvpn.clone(),
        );
        let issuer = Issuer::new(
            Arc::clone(&state.registry),
            Arc::clone(&state.executor),
            config.pki.clone(),
        );
        let profiles = ProfileRenderer::new(
            Arc::clone(&state.registry),
            config.pki.clone(),
            config.openvpn.clone(),
        );

        Self {
            state,
            reconciler,
            sequencer,
            issuer,
            profiles,
            task: Mutex::new(None),
        }
    }

    /// Shared state
    pub fn state(&self) -> &Arc<AdminState> {
        &self.state
    }

    /// Start the reconciliation task
    ///
    /// Returns false if it was already running.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_reconcile_loop(
            Arc::clone(&self.reconciler),
            self.state.config.reconcile_interval,
            cancel.clone(),
        ));
        *task = Some(ReconcileTask { cancel, handle });
        true
    }

    /// Stop the reconciliation task and wait for it to exit
    ///
    /// A cycle in progress finishes first. Returns false if it was not
    /// running.
    pub async fn stop(&self) -> bool {
        let Some(task) = self.task.lock().await.take() else {
            return false;
        };

        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            tracing::warn!("Reconciliation task ended abnormally: {}", e);
        }
        true
    }

    /// Check if the reconciliation task is running
    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Run one reconciliation cycle now
    pub async fn reconcile_now(&self) -> ReconciliationResult {
        self.reconciler.reconcile().await
    }

    /// Revoke a client's certificate and remove it from the registry
    pub async fn revoke(&self, name: &str) -> Result<RevocationOutcome, RevocationError> {
        self.sequencer.revoke(name).await
    }

    /// Steps a revocation of `name` would run, without running them
    pub fn revocation_plan(&self, name: &str) -> Result<Vec<RevocationStep>, ValidationError> {
        let name = ClientName::parse(name)?;
        Ok(self.sequencer.plan(&name))
    }

    /// Issue a certificate for a new client
    pub async fn issue(&self, name: &str) -> Result<IssuanceOutcome, IssuanceError> {
        self.issuer.issue(name).await
    }

    /// All known clients, ordered by id
    pub async fn list_clients(&self) -> Result<Vec<ClientRecord>, RegistryError> {
        self.state.registry.list_all().await
    }

    /// Aggregate traffic across all clients
    pub async fn traffic_stats(&self) -> Result<TrafficStats, RegistryError> {
        let records = self.state.registry.list_all().await?;
        Ok(TrafficStats::from_records(&records))
    }

    /// Render the client profile of an existing client
    pub async fn render_profile(&self, name: &str) -> Result<String, ProfileError> {
        self.profiles.render(name).await
    }
}
