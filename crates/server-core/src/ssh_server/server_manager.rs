use std::{net::SocketAddr, sync::Arc};

use tracing::{info, warn};

use super::handler::{ServerHandler, display_addr};
use crate::{authz::ConfigDirectory, proxy::ProxyContext};

/// Factory invoked by russh whenever a client connects.
pub(super) struct ServerManager {
    ctx: Arc<ProxyContext>,
    directory: Arc<ConfigDirectory>,
}

impl ServerManager {
    pub(super) fn new(ctx: Arc<ProxyContext>, directory: Arc<ConfigDirectory>) -> Self {
        Self { ctx, directory }
    }
}

impl russh::server::Server for ServerManager {
    type Handler = ServerHandler;

    fn new_client(&mut self, addr: Option<SocketAddr>) -> Self::Handler {
        info!(peer = %display_addr(addr), "client connected");
        ServerHandler::new(addr, self.ctx.clone(), self.directory.clone())
    }

    fn handle_session_error(&mut self, error: <Self::Handler as russh::server::Handler>::Error) {
        warn!(?error, "server session ended with error");
    }
}
