use std::collections::HashSet;

use crate::error::{Result, SandboxError};
use crate::proto::{PortSpec, PortSpecs, TunnelType};

/// How an exposed port is tunnelled out of the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelMode {
    /// TLS-encrypted tunnel.
    Encrypted,
    /// TLS-encrypted tunnel speaking HTTP/2.
    H2,
    /// Plain TCP.
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposedPort {
    pub port: u16,
    pub mode: TunnelMode,
}

impl ExposedPort {
    fn to_spec(self) -> PortSpec {
        let (unencrypted, tunnel_type) = match self.mode {
            TunnelMode::Encrypted => (false, None),
            TunnelMode::H2 => (false, Some(TunnelType::H2)),
            TunnelMode::Plain => (true, None),
        };
        PortSpec {
            port: u32::from(self.port),
            unencrypted,
            tunnel_type,
        }
    }
}

/// Merge the three per-mode port lists into one tagged sequence: encrypted
/// first, then H2, then plain, each in caller order.
pub fn classify_ports(encrypted: &[u16], h2: &[u16], unencrypted: &[u16]) -> Vec<ExposedPort> {
    let tagged = |ports: &[u16], mode: TunnelMode| {
        ports
            .iter()
            .map(move |&port| ExposedPort { port, mode })
            .collect::<Vec<_>>()
    };
    let mut out = tagged(encrypted, TunnelMode::Encrypted);
    out.extend(tagged(h2, TunnelMode::H2));
    out.extend(tagged(unencrypted, TunnelMode::Plain));
    out
}

/// Compile exposed ports into the wire collection.
///
/// Returns `None` when no ports are exposed, so the definition carries no
/// port configuration at all. Port 0 and ports listed more than once are
/// rejected.
pub fn port_specs(ports: &[ExposedPort]) -> Result<Option<PortSpecs>> {
    if ports.is_empty() {
        return Ok(None);
    }
    let mut seen = HashSet::with_capacity(ports.len());
    for exposed in ports {
        if exposed.port == 0 {
            return Err(SandboxError::InvalidConfig("port 0 cannot be exposed".to_string()));
        }
        if !seen.insert(exposed.port) {
            return Err(SandboxError::InvalidConfig(format!(
                "port {} is exposed more than once",
                exposed.port
            )));
        }
    }
    Ok(Some(PortSpecs {
        ports: ports.iter().map(|p| p.to_spec()).collect(),
    }))
}
