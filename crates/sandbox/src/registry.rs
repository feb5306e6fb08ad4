use crate::config::ImageFromRegistryOptions;
use crate::proto::{ImageRegistryConfig, RegistryAuthType};
use crate::types::Secret;

/// Authentication used when the control plane pulls an image.
///
/// Cloud-provider variants always hold a secret; only static credentials are
/// optional, which is expressed by resolving to [`RegistryAuth::Anonymous`].
#[derive(Debug, Clone, Copy)]
pub enum RegistryAuth<'a> {
    Anonymous,
    StaticCredentials(&'a Secret),
    Aws(&'a Secret),
    Gcp(&'a Secret),
}

impl<'a> RegistryAuth<'a> {
    pub fn from_options(options: &'a ImageFromRegistryOptions) -> Self {
        options
            .secret
            .as_ref()
            .map_or(Self::Anonymous, Self::StaticCredentials)
    }

    /// The wire auth configuration, or `None` for anonymous pulls.
    pub fn registry_config(&self) -> Option<ImageRegistryConfig> {
        let (registry_auth_type, secret) = match *self {
            Self::Anonymous => return None,
            Self::StaticCredentials(secret) => (RegistryAuthType::StaticCreds, secret),
            Self::Aws(secret) => (RegistryAuthType::Aws, secret),
            Self::Gcp(secret) => (RegistryAuthType::Gcp, secret),
        };
        Some(ImageRegistryConfig {
            registry_auth_type,
            secret_id: secret.secret_id().to_string(),
        })
    }
}
