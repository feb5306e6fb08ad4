use crate::config::SandboxOptions;
use crate::error::Result;
use crate::ports::{classify_ports, port_specs};
use crate::proto::{NetworkAccess, NetworkAccessType, SandboxDefinition};
use crate::resources::{resources, timeout_secs, volume_mounts};
use crate::types::Image;

/// Compile user-facing sandbox options into the definition sent to the
/// control plane. Network access is always open.
pub fn compile_sandbox(image: &Image, options: &SandboxOptions) -> Result<SandboxDefinition> {
    let exposed = classify_ports(
        &options.encrypted_ports,
        &options.h2_ports,
        &options.unencrypted_ports,
    );
    Ok(SandboxDefinition {
        entrypoint_args: options.command.clone(),
        image_id: image.image_id().to_string(),
        timeout_secs: timeout_secs(options.timeout)?,
        network_access: NetworkAccess {
            network_access_type: NetworkAccessType::Open,
        },
        resources: resources(options.cpu, options.memory)?,
        volume_mounts: volume_mounts(&options.volumes),
        open_ports: port_specs(&exposed)?,
    })
}
