//! Duplex relay between the client and the target, with recording.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gk_types::Identity;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    client::ClientChannel,
    error::{ServerError, ServerResult},
    recorder::{CommandAssembler, CommandRecorder, ReplayRecorder},
    relay::ServerChannel,
};

#[derive(Debug, Clone)]
pub struct SessionMeta {
    pub id: Uuid,
    pub user: Identity,
    pub target: String,
    pub account: String,
    pub started_at: DateTime<Utc>,
}

impl SessionMeta {
    pub fn new(user: Identity, target: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user,
            target: target.into(),
            account: account.into(),
            started_at: Utc::now(),
        }
    }
}

/// Which side ended the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEnd {
    ClientClosed,
    ServerClosed,
}

pub struct Session {
    meta: SessionMeta,
    client: Arc<dyn ClientChannel>,
    server: Arc<dyn ServerChannel>,
    command_recorder: Arc<dyn CommandRecorder>,
    replay_recorder: Arc<dyn ReplayRecorder>,
    typeahead: Vec<u8>,
}

impl Session {
    pub fn new(
        meta: SessionMeta,
        client: Arc<dyn ClientChannel>,
        server: Arc<dyn ServerChannel>,
        command_recorder: Arc<dyn CommandRecorder>,
        replay_recorder: Arc<dyn ReplayRecorder>,
    ) -> Self {
        Self {
            meta,
            client,
            server,
            command_recorder,
            replay_recorder,
            typeahead: Vec::new(),
        }
    }

    /// Client input captured before the bridge started, forwarded ahead of live input.
    pub fn with_typeahead(mut self, typeahead: Vec<u8>) -> Self {
        self.typeahead = typeahead;
        self
    }

    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    /// Relay bytes until either side closes. The target channel is closed and the replay
    /// recording finished before returning.
    pub async fn bridge(&self) -> ServerResult<BridgeEnd> {
        let mut output = self
            .server
            .take_output()
            .ok_or_else(|| ServerError::Other(format!("session {} output already consumed", self.meta.id)))?;
        let mut commands = CommandAssembler::new();

        info!(session_id = %self.meta.id, user = %self.meta.user, target_name = %self.meta.target, "bridge started");
        let replayed = self.typeahead.is_empty() || self.forward_input(&mut commands, self.typeahead.clone()).await;
        let end = if replayed {
            self.relay(&mut output, &mut commands).await
        } else {
            BridgeEnd::ServerClosed
        };

        self.server.close().await;
        self.replay_recorder.finish();
        debug!(session_id = %self.meta.id, ?end, "bridge finished");
        Ok(end)
    }

    async fn relay(&self, output: &mut mpsc::UnboundedReceiver<Vec<u8>>, commands: &mut CommandAssembler) -> BridgeEnd {
        loop {
            tokio::select! {
                out = output.recv() => {
                    let Some(data) = out else { return BridgeEnd::ServerClosed };
                    self.replay_recorder.record_output(&data);
                    if self.client.send(&data).await.is_err() {
                        return BridgeEnd::ClientClosed;
                    }
                }
                input = self.client.recv() => {
                    let Some(data) = input else { return BridgeEnd::ClientClosed };
                    if !self.forward_input(commands, data).await {
                        return BridgeEnd::ServerClosed;
                    }
                }
            }
        }
    }

    /// Record and forward client input. Returns false once the target stops accepting it.
    async fn forward_input(&self, commands: &mut CommandAssembler, data: Vec<u8>) -> bool {
        for command in commands.feed(&data) {
            self.command_recorder.record(&self.meta, &command);
        }
        self.server.send(data).await.is_ok()
    }
}
