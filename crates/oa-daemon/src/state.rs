//! Shared engine state

use std::sync::Arc;

use oa_core::config::AdminConfig;
use oa_core::error::OaError;
use oa_core::traits::{AuditSink, CommandExecutor, RegistryStore, StatusSource};

use crate::audit::FileAuditSink;
use crate::exec::ProcessExecutor;
use crate::registry::SqliteRegistry;
use crate::source::FileStatusSource;

/// Configuration plus the collaborators every operation works against
pub struct AdminState {
    /// Configuration
    pub config: AdminConfig,
    /// Client registry
    pub registry: Arc<dyn RegistryStore>,
    /// External command runner
    pub executor: Arc<dyn CommandExecutor>,
    /// Revocation audit log
    pub audit: Arc<dyn AuditSink>,
    /// Status report source
    pub source: Arc<dyn StatusSource>,
}

impl AdminState {
    /// Open the production collaborators described by `config`
    pub async fn open(config: AdminConfig) -> Result<Self, OaError> {
        config.validate()?;

        let registry = SqliteRegistry::open(&config.database_path).await?;
        tracing::info!("Client registry: {:?}", config.database_path);

        Ok(Self {
            registry: Arc::new(registry),
            executor: Arc::new(ProcessExecutor::new(config.step_timeout)),
            audit: Arc::new(FileAuditSink::new(&config.audit_log)),
            source: Arc::new(FileStatusSource::new(&config.status_file)),
            config,
        })
    }

    /// Assemble state from explicit collaborators
    pub fn with_parts(
        config: AdminConfig,
        registry: Arc<dyn RegistryStore>,
        executor: Arc<dyn CommandExecutor>,
        audit: Arc<dyn AuditSink>,
        source: Arc<dyn StatusSource>,
    ) -> Self {
        Self {
            config,
            registry,
            executor,
            audit,
            source,
        }
    }
}
