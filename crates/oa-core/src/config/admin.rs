//! Admin daemon configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;
use crate::types::ClientName;

/// Configuration for the admin daemon and CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// SQLite database holding the client registry
    pub database_path: PathBuf,

    /// Status report written by the VPN daemon
    pub status_file: PathBuf,

    /// Append-only revocation audit log
    pub audit_log: PathBuf,

    /// Time between reconciliation cycles, in seconds
    #[serde(with = "duration_secs")]
    pub reconcile_interval: Duration,

    /// Upper bound on each external command, in seconds
    #[serde(with = "duration_secs")]
    pub step_timeout: Duration,

    /// Certificate authority tooling
    pub pki: PkiConfig,

    /// VPN daemon layout
    pub openvpn: OpenVpnConfig,
}

impl Default for AdminConfig {
    fn default() -> Self {
        let config_dir = super::default_config_dir();

        Self {
            database_path: config_dir.join("ovpn-admin.db"),
            status_file: PathBuf::from("/var/log/openvpn/status.log"),
            audit_log: config_dir.join("revocation-audit.log"),
            reconcile_interval: Duration::from_secs(5),
            step_timeout: Duration::from_secs(60),
            pki: PkiConfig::default(),
            openvpn: OpenVpnConfig::default(),
        }
    }
}

impl AdminConfig {
    /// Reject settings the daemon cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconcile_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "reconcile_interval must be at least 1 second".to_string(),
            ));
        }
        if self.step_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "step_timeout must be at least 1 second".to_string(),
            ));
        }
        if self.openvpn.restart_command.is_empty() {
            return Err(ConfigError::Invalid(
                "openvpn.restart_command must not be empty".to_string(),
            ));
        }
        if self.openvpn.crl_file.is_empty() || self.openvpn.crl_file.contains('/') {
            return Err(ConfigError::Invalid(
                "openvpn.crl_file must be a plain file name".to_string(),
            ));
        }
        Ok(())
    }
}

/// Easy-RSA layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PkiConfig {
    /// Directory containing the easyrsa script and its `pki/` tree
    pub easyrsa_dir: PathBuf,

    /// easyrsa executable, relative to `easyrsa_dir` or absolute
    pub easyrsa_bin: String,
}

impl Default for PkiConfig {
    fn default() -> Self {
        Self {
            easyrsa_dir: PathBuf::from("/etc/openvpn/easy-rsa"),
            easyrsa_bin: "./easyrsa".to_string(),
        }
    }
}

impl PkiConfig {
    /// Resolved easyrsa executable
    ///
    /// A relative path containing a separator is taken relative to
    /// `easyrsa_dir`; a bare name is left for `PATH` lookup.
    pub fn easyrsa_program(&self) -> PathBuf {
        let bin = Path::new(&self.easyrsa_bin);
        if bin.is_relative() && bin.components().count() > 1 {
            self.easyrsa_dir.join(bin)
        } else {
            bin.to_path_buf()
        }
    }

    /// The `pki/` directory managed by easyrsa
    pub fn pki_dir(&self) -> PathBuf {
        self.easyrsa_dir.join("pki")
    }

    /// CA certificate
    pub fn ca_cert(&self) -> PathBuf {
        self.pki_dir().join("ca.crt")
    }

    /// Freshly generated CRL
    pub fn generated_crl(&self) -> PathBuf {
        self.pki_dir().join("crl.pem")
    }

    /// Certificate request of a client
    pub fn request(&self, name: &ClientName) -> PathBuf {
        self.pki_dir().join("reqs").join(format!("{}.req", name))
    }

    /// Private key of a client
    pub fn private_key(&self, name: &ClientName) -> PathBuf {
        self.pki_dir().join("private").join(format!("{}.key", name))
    }

    /// Issued certificate of a client
    pub fn issued_cert(&self, name: &ClientName) -> PathBuf {
        self.pki_dir().join("issued").join(format!("{}.crt", name))
    }
}

/// VPN daemon layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenVpnConfig {
    /// Server configuration directory
    pub server_dir: PathBuf,

    /// CRL file name inside `server_dir`
    pub crl_file: String,

    /// Command that makes the daemon reload (argv form)
    pub restart_command: Vec<String>,

    /// Client profile template
    pub client_template: PathBuf,

    /// Optional tls-crypt key embedded in client profiles
    pub tls_crypt_key: Option<PathBuf>,
}

impl Default for OpenVpnConfig {
    fn default() -> Self {
        Self {
            server_dir: PathBuf::from("/etc/openvpn"),
            crl_file: "crl.pem".to_string(),
            restart_command: vec![
                "systemctl".to_string(),
                "restart".to_string(),
                "openvpn@server".to_string(),
            ],
            client_template: PathBuf::from("/etc/openvpn/client-template.txt"),
            tls_crypt_key: Some(PathBuf::from("/etc/openvpn/tls-crypt.key")),
        }
    }
}

impl OpenVpnConfig {
    /// CRL location the daemon reads
    pub fn active_crl(&self) -> PathBuf {
        self.server_dir.join(&self.crl_file)
    }

    /// Check whether a tls-crypt key is configured and present
    pub fn tls_crypt_key_present(&self) -> Option<&Path> {
        self.tls_crypt_key
            .as_deref()
            .filter(|path| path.exists())
    }
}
