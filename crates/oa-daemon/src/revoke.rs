//! Certificate revocation sequencer
//!
//! Revocation is a fixed pipeline of external steps followed by the
//! registry delete. Every step is attempted even when an earlier one
//! fails, and every attempt is written to the audit sink before the next
//! one starts. The caller only sees the aggregate [`RevocationOutcome`];
//! the audit log is where a partial revocation is diagnosed.

use std::sync::Arc;

use chrono::Utc;

use oa_core::audit::RevocationAuditEntry;
use oa_core::command::CommandSpec;
use oa_core::config::{OpenVpnConfig, PkiConfig};
use oa_core::error::RevocationError;
use oa_core::outcome::{RevocationOutcome, StepResult, StepStatus};
use oa_core::traits::{AuditSink, CommandExecutor, RegistryStore};
use oa_core::types::ClientName;

/// Description of the final, in-process registry step
pub const REGISTRY_DELETE_STEP: &str = "Delete client from registry";

/// One external step of the revocation pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationStep {
    /// What the step does
    pub description: &'static str,
    /// Command to run
    pub command: CommandSpec,
}

/// Build the external steps that revoke `name`
///
/// The plan depends only on configuration and the name, so it can be
/// shown to an operator before anything runs.
pub fn revocation_plan(
    pki: &PkiConfig,
    openvpn: &OpenVpnConfig,
    name: &ClientName,
) -> Vec<RevocationStep> {
    let easyrsa = || {
        CommandSpec::new(pki.easyrsa_program().to_string_lossy().into_owned())
            .current_dir(&pki.easyrsa_dir)
    };
    let active_crl = openvpn.active_crl();
    // An empty restart command is rejected by AdminConfig::validate; if one
    // slips through the step fails at spawn like any other
    let restart = CommandSpec::from_argv(&openvpn.restart_command)
        .unwrap_or_else(|| CommandSpec::new(String::new()));

    vec![
        RevocationStep {
            description: "Revoke client certificate",
            command: easyrsa().args(["--batch", "revoke", name.as_str()]),
        },
        RevocationStep {
            description: "Generate certificate revocation list",
            command: easyrsa().args(["--batch", "gen-crl"]),
        },
        RevocationStep {
            description: "Remove certificate request",
            command: CommandSpec::new("rm").arg("-f").path_arg(&pki.request(name)),
        },
        RevocationStep {
            description: "Remove private key",
            command: CommandSpec::new("rm").arg("-f").path_arg(&pki.private_key(name)),
        },
        RevocationStep {
            description: "Remove issued certificate",
            command: CommandSpec::new("rm").arg("-f").path_arg(&pki.issued_cert(name)),
        },
        RevocationStep {
            description: "Remove active revocation list",
            command: CommandSpec::new("rm").arg("-f").path_arg(&active_crl),
        },
        RevocationStep {
            description: "Install new revocation list",
            command: CommandSpec::new("cp")
                .path_arg(&pki.generated_crl())
                .path_arg(&active_crl),
        },
        RevocationStep {
            description: "Set revocation list permissions",
            command: CommandSpec::new("chmod").arg("644").path_arg(&active_crl),
        },
        RevocationStep {
            description: "Restart VPN daemon",
            command: restart,
        },
    ]
}

/// Drives the revocation pipeline
pub struct RevocationSequencer {
    registry: Arc<dyn RegistryStore>,
    executor: Arc<dyn CommandExecutor>,
    audit: Arc<dyn AuditSink>,
    pki: PkiConfig,
    openvpn: OpenVpnConfig,
}

impl RevocationSequencer {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        executor: Arc<dyn CommandExecutor>,
        audit: Arc<dyn AuditSink>,
        pki: PkiConfig,
        openvpn: OpenVpnConfig,
    ) -> Self {
        Self {
            registry,
            executor,
            audit,
            pki,
            openvpn,
        }
    }

    /// Steps that revoking `name` would run
    pub fn plan(&self, name: &ClientName) -> Vec<RevocationStep> {
        revocation_plan(&self.pki, &self.openvpn, name)
    }

    /// Revoke a client
    ///
    /// Fails before any step when the name is invalid or unknown. Once the
    /// pipeline starts every step runs; only the registry delete can turn
    /// the call into an error, and that error still carries the outcome.
    pub async fn revoke(&self, raw_name: &str) -> Result<RevocationOutcome, RevocationError> {
        let name = ClientName::parse(raw_name)?;

        match self.registry.get_by_name(name.as_str()).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(RevocationError::NotFound(name.to_string())),
            Err(e) => return Err(RevocationError::Lookup(e)),
        }

        tracing::info!("Revoking client {}", name);

        let plan = self.plan(&name);
        let mut outcome = RevocationOutcome {
            client: name.to_string(),
            removed: false,
            steps: Vec::with_capacity(plan.len() + 1),
        };

        for (index, step) in plan.iter().enumerate() {
            let result = self.run_step(index + 1, step).await;
            self.record(&name, &result).await;
            outcome.steps.push(result);
        }

        let delete_step = plan.len() + 1;
        let command = format!("registry delete {}", name);
        match self.registry.delete_by_name(name.as_str()).await {
            Ok(rows) => {
                outcome.removed = rows > 0;
                let result = StepResult {
                    step: delete_step,
                    description: REGISTRY_DELETE_STEP.to_string(),
                    command,
                    status: if rows > 0 {
                        StepStatus::Succeeded
                    } else {
                        StepStatus::Warning
                    },
                    stdout: format!("{} rows deleted", rows),
                    stderr: String::new(),
                    error: (rows == 0)
                        .then(|| "No registry row was deleted".to_string()),
                };
                self.record(&name, &result).await;
                outcome.steps.push(result);
            }
            Err(error) => {
                let result = StepResult {
                    step: delete_step,
                    description: REGISTRY_DELETE_STEP.to_string(),
                    command,
                    status: StepStatus::Failed,
                    stdout: String::new(),
                    stderr: String::new(),
                    error: Some(error.to_string()),
                };
                self.record(&name, &result).await;
                outcome.steps.push(result);

                tracing::error!("Registry delete for {} failed: {}", name, error);
                return Err(RevocationError::DatabaseDeleteFailed {
                    name: name.to_string(),
                    error,
                    outcome: Box::new(outcome),
                });
            }
        }

        let failed = outcome.failed_steps().count();
        if failed > 0 {
            tracing::warn!(
                "Revocation of {} finished with {} failed steps",
                name,
                failed
            );
        } else {
            tracing::info!("Revoked client {}", name);
        }
        Ok(outcome)
    }

    async fn run_step(&self, number: usize, step: &RevocationStep) -> StepResult {
        let command = step.command.to_string();
        match self.executor.run(&step.command).await {
            Ok(output) => StepResult {
                step: number,
                description: step.description.to_string(),
                command,
                status: StepStatus::Succeeded,
                stdout: output.stdout,
                stderr: output.stderr,
                error: None,
            },
            Err(e) => {
                tracing::warn!("Revocation step {} ({}) failed: {}", number, step.description, e);
                StepResult {
                    step: number,
                    description: step.description.to_string(),
                    command,
                    status: StepStatus::Failed,
                    stdout: e.stdout().to_string(),
                    stderr: e.stderr().to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn record(&self, name: &ClientName, result: &StepResult) {
        let entry = RevocationAuditEntry::from_step(name.as_str(), result, Utc::now());
        if let Err(e) = self.audit.append(&entry).await {
            // Never abort the pipeline over auditing
            tracing::warn!(
                client = %name,
                step = result.step,
                status = %result.status,
                "Failed to write audit entry: {}",
                e
            );
        }
    }
}
