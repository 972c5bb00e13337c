//! Shared fakes for server-core integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gk_types::{AccountDescriptor, Identity, TargetDescriptor, TerminalSize};
use server_core::{
    client::{ClientChannel, TerminalMeta},
    relay::{ChannelError, ConnectFailure, ConnectionEstablisher, ServerChannel},
};
use tokio::sync::{mpsc, watch};

/// Client whose keystrokes are pushed by the test through `input`.
pub struct ScriptedClient {
    identity: Identity,
    terminal: TerminalMeta,
    pub sizes: watch::Sender<TerminalSize>,
    pub input: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    sent: Mutex<Vec<u8>>,
}

impl ScriptedClient {
    pub fn new(user: &str) -> Arc<Self> {
        let (sizes, size_rx) = watch::channel(TerminalSize::default());
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            identity: Identity::new(user),
            terminal: TerminalMeta::new("xterm", size_rx),
            sizes,
            input: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn type_bytes(&self, data: &[u8]) {
        if let Some(tx) = self.input.lock().unwrap().as_ref() {
            let _ = tx.send(data.to_vec());
        }
    }

    pub fn hang_up(&self) {
        self.input.lock().unwrap().take();
    }

    pub fn screen(&self) -> String {
        String::from_utf8_lossy(&self.sent.lock().unwrap()).to_string()
    }
}

#[async_trait]
impl ClientChannel for ScriptedClient {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn terminal(&self) -> &TerminalMeta {
        &self.terminal
    }

    async fn send(&self, data: &[u8]) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        self.rx.lock().await.recv().await
    }
}

/// Target that echoes every input chunk back as output.
pub struct EchoChannel {
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    pub resizes: Mutex<Vec<TerminalSize>>,
}

impl EchoChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            resizes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ServerChannel for EchoChannel {
    async fn send(&self, data: Vec<u8>) -> Result<(), ChannelError> {
        match self.tx.lock().unwrap().as_ref() {
            Some(tx) => tx.send(data).map_err(|_| ChannelError::Closed),
            None => Err(ChannelError::Closed),
        }
    }

    fn take_output(&self) -> Option<mpsc::UnboundedReceiver<Vec<u8>>> {
        self.rx.lock().unwrap().take()
    }

    async fn resize(&self, size: TerminalSize) -> Result<(), ChannelError> {
        self.resizes.lock().unwrap().push(size);
        Ok(())
    }

    async fn close(&self) {
        self.tx.lock().unwrap().take();
    }
}

/// Hands out fresh echo channels and remembers what each attempt authenticated with.
#[derive(Default)]
pub struct EchoEstablisher {
    pub attempts: Mutex<Vec<(String, String, Option<String>)>>,
}

#[async_trait]
impl ConnectionEstablisher for EchoEstablisher {
    async fn establish(
        &self,
        target: &TargetDescriptor,
        account: &AccountDescriptor,
        _term: &TerminalMeta,
    ) -> Result<Arc<dyn ServerChannel>, ConnectFailure> {
        self.attempts.lock().unwrap().push((
            target.name.clone(),
            account.username.clone(),
            account.password().map(str::to_string),
        ));
        Ok(Arc::new(EchoChannel::new()))
    }
}
