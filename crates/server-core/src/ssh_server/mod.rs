//! Front-end SSH listener.
//!
//! Users log in with `<user>[:[<account>@]<target>]` and their proxy password; an accepted shell
//! request is handed to the proxy orchestrator.

mod client;
mod handler;
mod login;
mod server_manager;

use std::{path::Path, sync::Arc, time::Duration};

use gk_types::config::GatekeeperConfig;
use russh::{
    MethodKind, MethodSet,
    keys::{
        Algorithm, PrivateKey,
        ssh_key::{LineEnding, rand_core::OsRng},
    },
    server::{self as ssh_server, Server},
};
use tracing::info;

pub use client::SshClientChannel;
pub use login::render_target_list;

use crate::{
    authz::{AuthorizationService, ConfigDirectory},
    error::{ServerError, ServerResult},
    proxy::ProxyContext,
    recorder::DefaultRecorderFactory,
    relay::SshEstablisher,
    sessions::SessionRegistry,
};

/// Build the shared proxy context from a validated config.
pub fn build_context(config: &GatekeeperConfig) -> (Arc<ProxyContext>, Arc<ConfigDirectory>) {
    let directory = Arc::new(ConfigDirectory::from_config(config));
    let authz: Arc<dyn AuthorizationService> = directory.clone();
    let ctx = Arc::new(ProxyContext {
        authz,
        establisher: Arc::new(SshEstablisher::new(Duration::from_secs(config.proxy.connect_timeout_secs))),
        registry: SessionRegistry::new(),
        recorders: Arc::new(DefaultRecorderFactory::new(config.proxy.replay_buffer_bytes)),
        config: config.proxy.clone(),
    });
    (ctx, directory)
}

/// Run the front-end SSH server until the listener fails.
pub async fn run_ssh_server(config: GatekeeperConfig) -> ServerResult<()> {
    if config.users.is_empty() {
        return Err(ServerError::invalid_config(
            "no users configured; add a [[users]] entry with a hash from `gk-server hash-password`",
        ));
    }

    let host_key = load_or_create_host_key(&config.server.host_key_path)?;
    let (ctx, directory) = build_context(&config);
    let _event_log = ctx.registry.spawn_event_log();

    let mut server_config = ssh_server::Config {
        preferred: crate::relay::ssh::default_preferred(),
        auth_rejection_time: Duration::from_millis(250),
        auth_rejection_time_initial: Some(Duration::from_millis(0)),
        nodelay: true,
        ..Default::default()
    };
    server_config.methods = MethodSet::empty();
    server_config.methods.push(MethodKind::Password);
    server_config.keys.push(host_key);

    let mut server = server_manager::ServerManager::new(ctx, directory);
    info!(bind = %config.server.bind, port = config.server.port, "starting SSH proxy server");
    server
        .run_on_address(Arc::new(server_config), (config.server.bind.as_str(), config.server.port))
        .await?;
    Ok(())
}

pub fn load_or_create_host_key(path: &Path) -> ServerResult<PrivateKey> {
    if path.exists() {
        let pem = std::fs::read_to_string(path)?;
        let key = PrivateKey::from_openssh(&pem)
            .map_err(|e| ServerError::Other(format!("invalid host key {}: {e}", path.display())))?;
        info!(path = %path.display(), "loaded server host key");
        return Ok(key);
    }

    let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).map_err(|e| ServerError::Other(e.to_string()))?;
    let pem = key.to_openssh(LineEnding::LF).map_err(|e| ServerError::Other(e.to_string()))?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, pem.as_bytes())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    info!(path = %path.display(), "generated new server host key");
    Ok(key)
}
