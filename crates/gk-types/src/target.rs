//! Target host domain types.
use std::fmt;

use serde::{Deserialize, Serialize};

/// A host reachable through the proxy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Human-readable target name (what users type after `@`).
    pub name: String,
    /// IP or hostname of the target.
    pub address: String,
    /// SSH port of the target.
    pub port: u16,
    /// Pinned host key in OpenSSH format; `None` accepts any key.
    pub host_key: Option<String>,
    /// Negotiate with the legacy algorithm suite (old appliances, CBC ciphers).
    pub legacy_crypto: bool,
}

impl TargetDescriptor {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            host_key: None,
            legacy_crypto: false,
        }
    }

    /// `address:port` form used for logging and socket connects.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
