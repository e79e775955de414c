//! OCI registry pulls
//!
//! Helm charts pushed to OCI registries are single-layer artifacts whose layer
//! is the packaged chart tarball.

use oci_distribution::Reference;
use oci_distribution::client::{Client, ClientConfig, ClientProtocol};
use oci_distribution::secrets::RegistryAuth;

use crate::error::{RepoError, Result};

/// Media types of Helm charts in OCI
pub mod media_types {
    /// Helm chart config
    pub const HELM_CONFIG: &str = "application/vnd.cncf.helm.config.v1+json";
    /// Helm chart content layer
    pub const HELM_CONTENT: &str = "application/vnd.cncf.helm.chart.content.v1.tar+gzip";
}

/// Anonymous OCI registry client
pub struct OciPuller {
    client: Client,
    auth: RegistryAuth,
}

impl Default for OciPuller {
    fn default() -> Self {
        Self::new()
    }
}

impl OciPuller {
    pub fn new() -> Self {
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        };

        Self {
            client: Client::new(config),
            auth: RegistryAuth::Anonymous,
        }
    }

    /// Build a reference from `oci://registry/repo` and a tag
    pub fn reference(oci_ref: &str, tag: &str) -> Result<Reference> {
        let base = oci_ref
            .trim()
            .trim_start_matches("oci://")
            .trim_end_matches('/');

        if base.is_empty() || !base.contains('/') {
            return Err(RepoError::InvalidOciReference {
                reference: oci_ref.to_string(),
            });
        }

        let full = format!("{}:{}", base, tag);
        Reference::try_from(full.as_str()).map_err(|e| RepoError::InvalidOciReference {
            reference: format!("{}: {}", full, e),
        })
    }

    /// Pull the packaged chart (`.tgz` bytes) for `oci_ref` at `tag`
    pub async fn pull_chart(&self, oci_ref: &str, tag: &str) -> Result<Vec<u8>> {
        let reference = Self::reference(oci_ref, tag)?;
        tracing::info!(reference = %reference, "pulling chart from OCI registry");

        let image = self
            .client
            .pull(
                &reference,
                &self.auth,
                vec![media_types::HELM_CONFIG, media_types::HELM_CONTENT],
            )
            .await
            .map_err(|e| RepoError::OciError {
                message: format!("Failed to pull {}: {}", reference, e),
            })?;

        let layer = image
            .layers
            .into_iter()
            .find(|l| l.media_type == media_types::HELM_CONTENT)
            .ok_or_else(|| RepoError::OciError {
                message: format!("No chart content layer found in {}", reference),
            })?;

        Ok(layer.data)
    }
}
