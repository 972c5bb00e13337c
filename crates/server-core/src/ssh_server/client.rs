use async_trait::async_trait;
use gk_types::Identity;
use russh::{ChannelId, CryptoVec, server::Handle};
use tokio::sync::{Mutex, mpsc};

use crate::{
    client::{ClientChannel, TerminalMeta},
    relay::ChannelError,
};

/// Client channel backed by a russh server session.
pub struct SshClientChannel {
    identity: Identity,
    terminal: TerminalMeta,
    handle: Handle,
    channel: ChannelId,
    input: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl SshClientChannel {
    pub fn new(
        identity: Identity,
        terminal: TerminalMeta,
        handle: Handle,
        channel: ChannelId,
        input: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            identity,
            terminal,
            handle,
            channel,
            input: Mutex::new(input),
        }
    }

    /// Report the exit status and close the client channel.
    pub async fn finish(&self, exit_status: u32) {
        let _ = self.handle.exit_status_request(self.channel, exit_status).await;
        let _ = self.handle.eof(self.channel).await;
        let _ = self.handle.close(self.channel).await;
    }
}

#[async_trait]
impl ClientChannel for SshClientChannel {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn terminal(&self) -> &TerminalMeta {
        &self.terminal
    }

    async fn send(&self, data: &[u8]) -> Result<(), ChannelError> {
        if data.is_empty() {
            return Ok(());
        }
        let mut payload = CryptoVec::new();
        payload.extend(data);
        self.handle.data(self.channel, payload).await.map_err(|_| ChannelError::Closed)
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        self.input.lock().await.recv().await
    }
}
