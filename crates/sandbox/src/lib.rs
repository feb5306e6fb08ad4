//! Client-side provisioning for remote sandboxes.
//!
//! Resolves named apps on the control plane and compiles declarative
//! [`SandboxOptions`] into the [`proto::SandboxDefinition`] sent over RPC.
//! The wire transport is supplied by the caller through the [`Transport`]
//! trait.

mod client;
mod compile;
mod config;
mod context;
mod error;
mod ports;
pub mod proto;
mod registry;
mod resources;
mod transport;
mod types;

pub use client::Client;
pub use compile::compile_sandbox;
pub use config::{
    CLIENT_TYPE_KEY, CLIENT_VERSION_KEY, ClientSettings, DeleteOptions, EphemeralOptions,
    ImageFromRegistryOptions, LookupOptions, SandboxOptions, VolumeBinding,
};
pub use context::Context;
pub use error::{Code, Result, SandboxError, Status};
pub use ports::{ExposedPort, TunnelMode, classify_ports, port_specs};
pub use registry::RegistryAuth;
pub use resources::{milli_cpu, resources, timeout_secs, volume_mounts};
pub use transport::Transport;
pub use types::{App, Image, Sandbox, Secret, Volume};
