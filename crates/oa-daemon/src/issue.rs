//! Client certificate issuance
//!
//! Issuance runs a single PKI command and then creates the registry row.
//! Any failure aborts the call; a row only exists once the certificate
//! does.

use std::sync::Arc;

use oa_core::command::CommandSpec;
use oa_core::config::PkiConfig;
use oa_core::error::{IssuanceError, RegistryError};
use oa_core::outcome::IssuanceOutcome;
use oa_core::traits::{CommandExecutor, RegistryStore};
use oa_core::types::ClientName;

/// PKI command that builds a client certificate and key
pub fn issuance_command(pki: &PkiConfig, name: &ClientName) -> CommandSpec {
    CommandSpec::new(pki.easyrsa_program().to_string_lossy().into_owned())
        .args(["--batch", "build-client-full", name.as_str(), "nopass"])
        .current_dir(&pki.easyrsa_dir)
}

/// Issues client certificates and registers the clients
pub struct Issuer {
    registry: Arc<dyn RegistryStore>,
    executor: Arc<dyn CommandExecutor>,
    pki: PkiConfig,
}

impl Issuer {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        executor: Arc<dyn CommandExecutor>,
        pki: PkiConfig,
    ) -> Self {
        Self {
            registry,
            executor,
            pki,
        }
    }

    /// Issue a certificate for a new client
    pub async fn issue(&self, raw_name: &str) -> Result<IssuanceOutcome, IssuanceError> {
        let name = ClientName::parse(raw_name)?;

        if self
            .registry
            .get_by_name(name.as_str())
            .await
            .map_err(IssuanceError::Registry)?
            .is_some()
        {
            return Err(IssuanceError::DuplicateName(name.to_string()));
        }

        let command = issuance_command(&self.pki, &name);
        tracing::info!("Issuing certificate for {}", name);
        let output = self.executor.run(&command).await.map_err(|e| {
            tracing::warn!("Certificate issuance for {} failed: {}", name, e);
            IssuanceError::Execution(e)
        })?;

        let record = self.registry.insert(&name).await.map_err(|e| match e {
            RegistryError::DuplicateName(n) => IssuanceError::DuplicateName(n),
            other => IssuanceError::Registry(other),
        })?;

        tracing::info!("Registered client {} (id {})", record.name, record.id);
        Ok(IssuanceOutcome {
            record,
            stdout: output.stdout,
        })
    }
}
