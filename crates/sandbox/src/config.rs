use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::{Secret, Volume};

pub(crate) const DEFAULT_ENVIRONMENT: &str = "main";
pub(crate) const CLIENT_TYPE: &str = "rust";

/// Header names attached to the session context by the client.
pub const CLIENT_TYPE_KEY: &str = "x-client-type";
pub const CLIENT_VERSION_KEY: &str = "x-client-version";

/// Client-wide settings shared by every call made through a
/// [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Environment used when an options struct leaves `environment` empty.
    pub default_environment: String,
    /// Reported to the server in the session metadata.
    pub client_version: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            default_environment: DEFAULT_ENVIRONMENT.to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ClientSettings {
    pub(crate) fn environment_name(&self, requested: &str) -> String {
        if requested.is_empty() {
            self.default_environment.clone()
        } else {
            requested.to_string()
        }
    }
}

/// Options for finding named remote objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupOptions {
    pub environment: String,
    pub create_if_missing: bool,
}

/// Options for deleting a named object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub environment: String,
}

/// Options for creating a temporary, nameless object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EphemeralOptions {
    pub environment: String,
}

/// How a volume is attached to a sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBinding {
    pub volume: Volume,
    pub allow_background_commits: bool,
    pub read_only: bool,
}

impl VolumeBinding {
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn without_background_commits(mut self) -> Self {
        self.allow_background_commits = false;
        self
    }
}

impl From<Volume> for VolumeBinding {
    fn from(volume: Volume) -> Self {
        Self {
            volume,
            allow_background_commits: true,
            read_only: false,
        }
    }
}

/// Options for creating a sandbox. `Default` requests no CPU/memory, no
/// timeout cap, no volumes and no ports.
#[derive(Debug, Clone, Default)]
pub struct SandboxOptions {
    /// CPU request in physical cores.
    pub cpu: f64,
    /// Memory request in MiB.
    pub memory: u32,
    /// Maximum lifetime of the sandbox. Sub-second remainders are dropped.
    pub timeout: Option<Duration>,
    /// Command run in the sandbox on startup.
    pub command: Vec<String>,
    /// Volumes keyed by mount path.
    pub volumes: BTreeMap<String, VolumeBinding>,
    /// Ports tunnelled with TLS encryption.
    pub encrypted_ports: Vec<u16>,
    /// Ports tunnelled with TLS encryption over HTTP/2.
    pub h2_ports: Vec<u16>,
    /// Ports tunnelled without encryption.
    pub unencrypted_ports: Vec<u16>,
}

impl SandboxOptions {
    /// Mount `volume` at `mount_path` with the default binding flags.
    pub fn mount(
        mut self,
        mount_path: impl Into<String>,
        volume: impl Into<VolumeBinding>,
    ) -> Self {
        self.volumes.insert(mount_path.into(), volume.into());
        self
    }
}

/// Options for creating an image from a public or private registry.
#[derive(Debug, Clone, Default)]
pub struct ImageFromRegistryOptions {
    /// Static registry credentials. `None` pulls anonymously.
    pub secret: Option<Secret>,
}
