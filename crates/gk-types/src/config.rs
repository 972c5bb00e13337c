//! Configuration structs for the proxy server, loaded from TOML.
use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::target::TargetDescriptor;

pub const DEFAULT_SERVER_PORT: u16 = 2222;
pub const DEFAULT_TARGET_PORT: u16 = 22;

/// Top-level configuration file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub users: Vec<UserEntry>,
    #[serde(default)]
    pub targets: Vec<TargetEntry>,
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
    #[serde(default)]
    pub grants: Vec<GrantEntry>,
}

/// Runtime configuration for the front-end SSH listener.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address or hostname to bind the SSH listener to (e.g. `127.0.0.1`).
    pub bind: String,
    /// TCP port the SSH listener accepts clients on.
    pub port: u16,
    /// Where the server host key is read from, or generated into on first start.
    pub host_key_path: PathBuf,
    /// Log level applied when `RUST_LOG` is unset and no `--log-level` flag is given.
    /// Re-read on SIGHUP.
    pub log_level: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_SERVER_PORT,
            host_key_path: PathBuf::from("gk_host_ed25519"),
            log_level: None,
        }
    }
}

/// Knobs for a single proxy attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Hard deadline for establishing the backend connection.
    pub connect_timeout_secs: u64,
    /// How long the "Connecting to ..." counter keeps ticking.
    pub progress_timeout_secs: u64,
    /// Check access before resolving credentials, so denied users are never prompted.
    pub check_access_first: bool,
    /// Size of the in-memory replay buffer kept per session.
    pub replay_buffer_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            progress_timeout_secs: 10,
            check_access_first: true,
            replay_buffer_bytes: 64 * 1024,
        }
    }
}

/// A front-end user allowed to log in to the proxy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub name: String,
    /// Argon2 PHC string (`gk-server hash-password`).
    pub password_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub name: String,
    pub address: String,
    #[serde(default = "default_target_port")]
    pub port: u16,
    #[serde(default)]
    pub host_key: Option<String>,
    #[serde(default)]
    pub legacy_crypto: bool,
    /// Account used when the login name does not name one.
    #[serde(default)]
    pub default_account: Option<String>,
}

fn default_target_port() -> u16 {
    DEFAULT_TARGET_PORT
}

impl From<&TargetEntry> for TargetDescriptor {
    fn from(entry: &TargetEntry) -> Self {
        Self {
            name: entry.name.clone(),
            address: entry.address.clone(),
            port: entry.port,
            host_key: entry.host_key.clone(),
            legacy_crypto: entry.legacy_crypto,
        }
    }
}

/// Stored account on one or more targets. Secrets are optional; a missing secret is prompted for.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub name: String,
    /// Login name on the target; defaults to `name`.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub key_passphrase: Option<String>,
}

impl AccountEntry {
    pub fn login_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Debug for AccountEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountEntry")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("key_passphrase", &self.key_passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Allows `user` to reach `target` as any of `accounts`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantEntry {
    pub user: String,
    pub target: String,
    pub accounts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config: GatekeeperConfig = toml::from_str(
            r#"
            [[targets]]
            name = "web01"
            address = "10.0.0.5"
            "#,
        )
        .unwrap();

        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.proxy, ProxyConfig::default());
        assert_eq!(config.targets[0].port, DEFAULT_TARGET_PORT);
        assert!(config.targets[0].default_account.is_none());
    }

    #[test]
    fn account_debug_hides_secrets() {
        let entry = AccountEntry {
            name: "root".into(),
            username: None,
            password: Some("hunter2".into()),
            private_key: None,
            key_passphrase: None,
        };
        assert!(!format!("{entry:?}").contains("hunter2"));
        assert_eq!(entry.login_name(), "root");
    }
}
