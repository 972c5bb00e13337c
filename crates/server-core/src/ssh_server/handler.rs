//! Per-connection russh handler for the front-end listener.

use std::{net::SocketAddr, sync::Arc, time::Instant};

use gk_types::{AuthDecision, Identity, LoginTarget, TerminalSize, terminal::DEFAULT_TERM};
use russh::{
    Channel, ChannelId, CryptoVec, Pty,
    server::{self as ssh_server, Auth, Session},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::{client::SshClientChannel, login::run_login};
use crate::{
    auth::{authenticate_password, parse_login_target},
    authz::ConfigDirectory,
    client::TerminalMeta,
    proxy::ProxyContext,
};

pub(super) struct ServerHandler {
    ctx: Arc<ProxyContext>,
    directory: Arc<ConfigDirectory>,
    peer_addr: Option<SocketAddr>,
    login: Option<LoginTarget>,
    channel: Option<ChannelId>,
    term: String,
    size_tx: watch::Sender<TerminalSize>,
    input_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    input_rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    proxy_task: Option<JoinHandle<()>>,
    closed: bool,
    connected_at: Instant,
}

impl ServerHandler {
    pub(super) fn new(peer_addr: Option<SocketAddr>, ctx: Arc<ProxyContext>, directory: Arc<ConfigDirectory>) -> Self {
        let (size_tx, _) = watch::channel(TerminalSize::default());
        Self {
            ctx,
            directory,
            peer_addr,
            login: None,
            channel: None,
            term: DEFAULT_TERM.to_string(),
            size_tx,
            input_tx: None,
            input_rx: None,
            proxy_task: None,
            closed: false,
            connected_at: Instant::now(),
        }
    }

    fn send_line(&self, session: &mut Session, channel: ChannelId, line: &str) -> Result<(), russh::Error> {
        let mut payload = CryptoVec::new();
        payload.extend(line.as_bytes());
        payload.extend(b"\r\n");
        session.data(channel, payload)
    }

    fn set_pty_size(&mut self, cols: u32, rows: u32) {
        self.size_tx.send_replace(TerminalSize::new(cols, rows).clamped());
    }

    fn log_disconnect(&mut self, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        info!(
            peer = %display_addr(self.peer_addr),
            user = %self.login.as_ref().map(|l| l.username.as_str()).unwrap_or("<unauthenticated>"),
            duration = ?self.connected_at.elapsed(),
            reason,
            "client disconnected",
        );
    }
}

impl Drop for ServerHandler {
    fn drop(&mut self) {
        // Dropping the input sender ends any running bridge through its normal teardown.
        self.input_tx = None;
        if !self.closed {
            self.log_disconnect("connection dropped");
        }
    }
}

impl ssh_server::Handler for ServerHandler {
    type Error = russh::Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        let login = parse_login_target(user);
        match authenticate_password(&self.directory, &login, password) {
            AuthDecision::Accept => {
                info!(
                    peer = %display_addr(self.peer_addr),
                    user = %login.username,
                    target_name = %login.target.as_deref().unwrap_or("<none>"),
                    "password authentication accepted"
                );
                self.login = Some(login);
                Ok(Auth::Accept)
            }
            AuthDecision::Reject => {
                warn!(
                    peer = %display_addr(self.peer_addr),
                    user = %login.username,
                    "password authentication rejected"
                );
                Ok(Auth::reject())
            }
        }
    }

    async fn channel_open_session(&mut self, channel: Channel<ssh_server::Msg>, _session: &mut Session) -> Result<bool, Self::Error> {
        if self.channel.is_some() {
            debug!(peer = %display_addr(self.peer_addr), "refusing second session channel");
            return Ok(false);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.channel = Some(channel.id());
        self.input_tx = Some(tx);
        self.input_rx = Some(rx);
        Ok(true)
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        term: &str,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if !term.is_empty() {
            self.term = term.to_string();
        }
        self.set_pty_size(col_width, row_height);
        session.channel_success(channel)?;
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        channel: ChannelId,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.set_pty_size(col_width, row_height);
        session.channel_success(channel)?;
        Ok(())
    }

    async fn shell_request(&mut self, channel: ChannelId, session: &mut Session) -> Result<(), Self::Error> {
        if Some(channel) != self.channel || self.proxy_task.is_some() {
            session.channel_failure(channel)?;
            return Ok(());
        }
        let (Some(login), Some(input_rx)) = (self.login.clone(), self.input_rx.take()) else {
            session.channel_failure(channel)?;
            return Ok(());
        };
        session.channel_success(channel)?;

        let client = Arc::new(SshClientChannel::new(
            Identity::new(login.username.clone()),
            TerminalMeta::new(self.term.clone(), self.size_tx.subscribe()),
            session.handle(),
            channel,
            input_rx,
        ));
        let ctx = self.ctx.clone();
        let directory = self.directory.clone();
        self.proxy_task = Some(tokio::spawn(async move {
            let status = run_login(ctx, directory, login, client.clone()).await;
            client.finish(status).await;
        }));
        Ok(())
    }

    async fn exec_request(&mut self, channel: ChannelId, _data: &[u8], session: &mut Session) -> Result<(), Self::Error> {
        session.channel_success(channel)?;
        self.send_line(session, channel, "This server only provides interactive sessions; request a shell.")?;
        session.exit_status_request(channel, 1)?;
        session.close(channel)?;
        Ok(())
    }

    async fn data(&mut self, channel: ChannelId, data: &[u8], _session: &mut Session) -> Result<(), Self::Error> {
        if Some(channel) != self.channel || data.is_empty() {
            return Ok(());
        }
        if let Some(tx) = self.input_tx.as_ref() {
            let _ = tx.send(data.to_vec());
        }
        Ok(())
    }

    async fn channel_eof(&mut self, channel: ChannelId, _session: &mut Session) -> Result<(), Self::Error> {
        if Some(channel) == self.channel {
            self.input_tx = None;
        }
        Ok(())
    }

    async fn channel_close(&mut self, channel: ChannelId, _session: &mut Session) -> Result<(), Self::Error> {
        if Some(channel) == self.channel {
            self.input_tx = None;
            self.channel = None;
            self.log_disconnect("channel closed");
        }
        Ok(())
    }
}

/// Display helper used for tracing; keeps logging concise when the socket address is unavailable.
pub(super) fn display_addr(addr: Option<SocketAddr>) -> String {
    addr.map(|a| a.to_string()).unwrap_or_else(|| "<unknown>".into())
}
