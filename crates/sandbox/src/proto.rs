//! Wire messages exchanged with the control plane.
//!
//! Field names serialize in camelCase. Optional sub-messages are omitted from
//! the payload entirely when absent, which the server treats differently from
//! an empty value (see [`SandboxDefinition::open_ports`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectCreationType {
    #[default]
    Unspecified,
    CreateIfMissing,
    Ephemeral,
}

// ---------------------------------------------------------------------------
// Apps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppGetOrCreateRequest {
    pub app_name: String,
    pub environment_name: String,
    pub object_creation_type: ObjectCreationType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppGetOrCreateResponse {
    pub app_id: String,
}

// ---------------------------------------------------------------------------
// Sandboxes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkAccessType {
    #[default]
    Open,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAccess {
    pub network_access_type: NetworkAccessType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub milli_cpu: u32,
    pub memory_mb: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub volume_id: String,
    pub mount_path: String,
    pub allow_background_commits: bool,
    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TunnelType {
    H2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    pub port: u32,
    pub unencrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel_type: Option<TunnelType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpecs {
    pub ports: Vec<PortSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxDefinition {
    pub entrypoint_args: Vec<String>,
    pub image_id: String,
    /// Zero means the server default applies.
    pub timeout_secs: u32,
    pub network_access: NetworkAccess,
    pub resources: Resources,
    pub volume_mounts: Vec<VolumeMount>,
    /// `None` requests no port forwarding at all; `Some` with an empty list
    /// explicitly requests zero ports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_ports: Option<PortSpecs>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxCreateRequest {
    pub app_id: String,
    pub definition: SandboxDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxCreateResponse {
    pub sandbox_id: String,
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryAuthType {
    StaticCreds,
    Aws,
    Gcp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistryConfig {
    pub registry_auth_type: RegistryAuthType,
    pub secret_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFromRegistryRequest {
    pub app_id: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_registry_config: Option<ImageRegistryConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFromRegistryResponse {
    pub image_id: String,
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretGetOrCreateRequest {
    /// Empty for ephemeral secrets.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub deployment_name: String,
    pub environment_name: String,
    pub object_creation_type: ObjectCreationType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env_dict: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretGetOrCreateResponse {
    pub secret_id: String,
}

// ---------------------------------------------------------------------------
// Volumes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGetOrCreateRequest {
    pub deployment_name: String,
    pub environment_name: String,
    pub object_creation_type: ObjectCreationType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGetOrCreateResponse {
    pub volume_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDeleteRequest {
    pub deployment_name: String,
    pub environment_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDeleteResponse {}
