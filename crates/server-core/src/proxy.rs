//! Orchestration of one proxy attempt: access check, credentials, connect, bridge and teardown.

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use gk_types::{AccountDescriptor, Identity, TargetDescriptor, config::ProxyConfig};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    access::AccessGate,
    authz::AuthorizationService,
    bridge::{BridgeEnd, Session, SessionMeta},
    client::ClientChannel,
    credential::CredentialResolver,
    format::{CRLF, connecting_banner, warning_line},
    progress::{ConnectProgressNotifier, ProgressHandle},
    recorder::RecorderFactory,
    relay::{ConnectionEstablisher, ServerChannel},
    resize::ResizeWatcher,
    sessions::SessionRegistry,
};

pub const NO_PERMISSION: &str = "No permission";

/// Collaborators shared by every proxy attempt in the process.
pub struct ProxyContext {
    pub authz: Arc<dyn AuthorizationService>,
    pub establisher: Arc<dyn ConnectionEstablisher>,
    pub registry: SessionRegistry,
    pub recorders: Arc<dyn RecorderFactory>,
    pub config: ProxyConfig,
}

/// State of a single proxy attempt.
pub struct ProxySession {
    pub id: Uuid,
    pub identity: Identity,
    pub target: TargetDescriptor,
    pub account: AccountDescriptor,
    cancel: CancellationToken,
    channel: OnceLock<Arc<dyn ServerChannel>>,
}

impl ProxySession {
    pub fn new(identity: Identity, target: TargetDescriptor, account: AccountDescriptor) -> Self {
        Self {
            id: Uuid::now_v7(),
            identity,
            target,
            account,
            cancel: CancellationToken::new(),
            channel: OnceLock::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Set the cancellation signal. It is never cleared.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The live channel, once the connection succeeded.
    pub fn channel(&self) -> Option<&Arc<dyn ServerChannel>> {
        self.channel.get()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyOutcome {
    Denied,
    ConnectFailed(String),
    /// The user abandoned the credential prompt.
    Cancelled,
    Completed { session_number: u32, end: BridgeEnd },
    /// The bridge failed or panicked; teardown still ran.
    Aborted { session_number: u32, reason: String },
}

/// Runs cleanup if the attempt future is dropped while a session is live.
struct Teardown {
    cancel: CancellationToken,
    registry: SessionRegistry,
    channel: Arc<dyn ServerChannel>,
    id: Uuid,
    tasks: Vec<AbortHandle>,
    armed: bool,
}

impl Teardown {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.cancel.cancel();
        for task in &self.tasks {
            task.abort();
        }
        let registry = self.registry.clone();
        let channel = self.channel.clone();
        let id = self.id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                channel.close().await;
                registry.remove(id).await;
            });
        }
        warn!(session_id = %id, "proxy attempt dropped before teardown; cleaned up in background");
    }
}

pub struct ProxyServer {
    ctx: Arc<ProxyContext>,
    client: Arc<dyn ClientChannel>,
}

impl ProxyServer {
    pub fn new(ctx: Arc<ProxyContext>, client: Arc<dyn ClientChannel>) -> Self {
        Self { ctx, client }
    }

    pub async fn proxy(&self, target: TargetDescriptor, account: AccountDescriptor) -> ProxyOutcome {
        let mut session = ProxySession::new(self.client.identity().clone(), target, account);
        self.run(&mut session).await
    }

    async fn deny(&self, session: &ProxySession, progress: Option<ProgressHandle>) -> ProxyOutcome {
        if let Some(progress) = progress {
            progress.finish().await;
        }
        info!(user = %session.identity, target_name = %session.target.name, account = %session.account.name, "access denied");
        let _ = self.client.send_text(&warning_line(NO_PERMISSION)).await;
        ProxyOutcome::Denied
    }

    pub async fn run(&self, session: &mut ProxySession) -> ProxyOutcome {
        let config = &self.ctx.config;
        let gate = AccessGate::new(self.ctx.authz.clone());

        info!(user = %session.identity, target_name = %session.target.name, account = %session.account.name, "proxy attempt");
        if config.check_access_first && !gate.allowed(&session.identity, &session.target, &session.account).await {
            return self.deny(session, None).await;
        }

        let resolver = CredentialResolver::new(self.ctx.authz.clone());
        let typeahead = match resolver.resolve(self.client.as_ref(), &mut session.account).await {
            Ok(typeahead) => typeahead,
            Err(err) => {
                info!(user = %session.identity, error = %err, "credential prompt abandoned");
                return ProxyOutcome::Cancelled;
            }
        };

        let banner = connecting_banner(&session.account.username, &session.target.name);
        let progress = ConnectProgressNotifier::start(
            self.client.clone(),
            banner,
            Duration::from_secs(config.progress_timeout_secs),
        );

        if !config.check_access_first && !gate.allowed(&session.identity, &session.target, &session.account).await {
            return self.deny(session, Some(progress)).await;
        }

        let sizes = self.client.terminal().resize_events();
        let established = self
            .ctx
            .establisher
            .establish(&session.target, &session.account, self.client.terminal())
            .await;
        progress.finish().await;

        let channel = match established {
            Ok(channel) => channel,
            Err(failure) => {
                warn!(target_name = %session.target.name, reason = %failure, "connect failed");
                let _ = self.client.send_text(&warning_line(&failure.message)).await;
                let _ = self.client.send_text(CRLF).await;
                return ProxyOutcome::ConnectFailed(failure.message);
            }
        };
        let _ = self.client.send_text(CRLF).await;
        let channel = session.channel.get_or_init(|| channel).clone();

        let meta = SessionMeta {
            id: session.id,
            user: session.identity.clone(),
            target: session.target.name.clone(),
            account: session.account.name.clone(),
            started_at: chrono::Utc::now(),
        };
        let live = Arc::new(Session::new(
            meta.clone(),
            self.client.clone(),
            channel.clone(),
            self.ctx.recorders.command_recorder(&meta),
            self.ctx.recorders.replay_recorder(&meta),
        )
        .with_typeahead(typeahead));

        let registry = self.ctx.registry.clone();
        let session_number = registry.add(live.clone()).await;
        let mut teardown = Teardown {
            cancel: session.cancel_token(),
            registry: registry.clone(),
            channel: channel.clone(),
            id: session.id,
            tasks: Vec::new(),
            armed: true,
        };

        let watcher = ResizeWatcher::new(channel.clone(), sizes, session.cancel_token()).spawn();
        teardown.tasks.push(watcher.abort_handle());
        let bridge = tokio::spawn(async move { live.bridge().await });
        teardown.tasks.push(bridge.abort_handle());

        let result = bridge.await;

        session.cancel();
        match watcher.await {
            Ok(reason) => debug!(session_id = %session.id, ?reason, "resize watcher stopped"),
            Err(err) => warn!(session_id = %session.id, error = %err, "resize watcher task failed"),
        }
        // A failed bridge never reached its own close.
        channel.close().await;
        registry.remove(session.id).await;
        teardown.disarm();

        match result {
            Ok(Ok(end)) => {
                info!(session_id = %session.id, session_number, ?end, "session ended");
                ProxyOutcome::Completed { session_number, end }
            }
            Ok(Err(err)) => {
                error!(session_id = %session.id, error = %err, "bridge failed");
                ProxyOutcome::Aborted {
                    session_number,
                    reason: err.to_string(),
                }
            }
            Err(err) => {
                error!(session_id = %session.id, error = %err, "bridge task panicked");
                ProxyOutcome::Aborted {
                    session_number,
                    reason: "bridge task failed".to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
