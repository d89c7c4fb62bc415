//! Client profile rendering
//!
//! A profile is the client template followed by inline `<ca>`, `<cert>`,
//! `<key>` and optional `<tls-crypt>` blocks read from the PKI tree.

use std::path::Path;
use std::sync::Arc;

use oa_core::config::{OpenVpnConfig, PkiConfig};
use oa_core::error::ProfileError;
use oa_core::traits::RegistryStore;
use oa_core::types::ClientName;

const CERT_BEGIN: &str = "-----BEGIN CERTIFICATE-----";

/// Renders downloadable client profiles
pub struct ProfileRenderer {
    registry: Arc<dyn RegistryStore>,
    pki: PkiConfig,
    openvpn: OpenVpnConfig,
}

impl ProfileRenderer {
    pub fn new(registry: Arc<dyn RegistryStore>, pki: PkiConfig, openvpn: OpenVpnConfig) -> Self {
        Self {
            registry,
            pki,
            openvpn,
        }
    }

    /// Render the profile of an existing client
    pub async fn render(&self, raw_name: &str) -> Result<String, ProfileError> {
        let name = ClientName::parse(raw_name)?;
        if self
            .registry
            .get_by_name(name.as_str())
            .await
            .map_err(ProfileError::Registry)?
            .is_none()
        {
            return Err(ProfileError::NotFound(name.to_string()));
        }

        let template = read_artifact(&self.openvpn.client_template).await?;
        let ca = read_artifact(&self.pki.ca_cert()).await?;
        let cert_path = self.pki.issued_cert(&name);
        let cert = certificate_pem(&read_artifact(&cert_path).await?)
            .ok_or(ProfileError::MissingPem(cert_path))?
            .to_string();
        let key = read_artifact(&self.pki.private_key(&name)).await?;

        let mut profile = template;
        if !profile.ends_with('\n') {
            profile.push('\n');
        }
        push_block(&mut profile, "ca", &ca);
        push_block(&mut profile, "cert", &cert);
        push_block(&mut profile, "key", &key);
        if let Some(path) = self.openvpn.tls_crypt_key_present() {
            let tls_crypt = read_artifact(path).await?;
            push_block(&mut profile, "tls-crypt", &tls_crypt);
        }

        tracing::debug!("Rendered profile for {}", name);
        Ok(profile)
    }
}

async fn read_artifact(path: &Path) -> Result<String, ProfileError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProfileError::Artifact {
            path: path.to_path_buf(),
            source,
        })
}

/// Strip the human-readable dump easyrsa puts before the certificate
fn certificate_pem(issued: &str) -> Option<&str> {
    issued.find(CERT_BEGIN).map(|start| issued[start..].trim_end())
}

fn push_block(profile: &mut String, tag: &str, body: &str) {
    profile.push_str(&format!("<{}>\n{}\n</{}>\n", tag, body.trim_end(), tag));
}
