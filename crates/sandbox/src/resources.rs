use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::VolumeBinding;
use crate::error::{Result, SandboxError};
use crate::proto::{Resources, VolumeMount};

/// Convert a CPU request in physical cores to milli-CPU, truncating any
/// fractional milli-core. Values beyond `u32::MAX` saturate.
pub fn milli_cpu(cores: f64) -> Result<u32> {
    if !cores.is_finite() || cores < 0.0 {
        return Err(SandboxError::InvalidConfig(format!(
            "cpu must be a non-negative number of cores, got {cores}"
        )));
    }
    Ok((cores * 1000.0) as u32)
}

pub fn resources(cpu: f64, memory_mb: u32) -> Result<Resources> {
    Ok(Resources {
        milli_cpu: milli_cpu(cpu)?,
        memory_mb,
    })
}

/// Whole seconds of `timeout`, dropping any sub-second remainder. `None`
/// compiles to 0, leaving the server default in place.
pub fn timeout_secs(timeout: Option<Duration>) -> Result<u32> {
    let Some(timeout) = timeout else {
        return Ok(0);
    };
    u32::try_from(timeout.as_secs()).map_err(|_| {
        SandboxError::InvalidConfig(format!(
            "timeout of {}s exceeds the supported maximum",
            timeout.as_secs()
        ))
    })
}

/// One mount per binding, ordered by mount path.
pub fn volume_mounts(volumes: &BTreeMap<String, VolumeBinding>) -> Vec<VolumeMount> {
    volumes
        .iter()
        .map(|(mount_path, binding)| VolumeMount {
            volume_id: binding.volume.volume_id().to_string(),
            mount_path: mount_path.clone(),
            allow_background_commits: binding.allow_background_commits,
            read_only: binding.read_only,
        })
        .collect()
}
