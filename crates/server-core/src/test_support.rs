//! In-memory fakes for the client, authorization service, establisher and backend channel.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use gk_types::{AccountDescriptor, AccountSecret, Identity, TargetDescriptor, TerminalSize};
use tokio::sync::{Notify, mpsc, watch};

use crate::{
    authz::AuthorizationService,
    client::{ClientChannel, TerminalMeta},
    error::{ServerError, ServerResult},
    relay::{ChannelError, ConnectFailure, ConnectionEstablisher, ServerChannel},
};

pub struct MockClient {
    identity: Identity,
    terminal: TerminalMeta,
    size_tx: watch::Sender<TerminalSize>,
    sent: Mutex<Vec<Vec<u8>>>,
    input: tokio::sync::Mutex<VecDeque<Vec<u8>>>,
    keep_open: bool,
    fail_sends: bool,
}

impl MockClient {
    pub fn new(user: &str) -> Self {
        let (size_tx, size_rx) = watch::channel(TerminalSize::default());
        Self {
            identity: Identity::new(user),
            terminal: TerminalMeta::new("xterm", size_rx),
            size_tx,
            sent: Mutex::new(Vec::new()),
            input: tokio::sync::Mutex::new(VecDeque::new()),
            keep_open: false,
            fail_sends: false,
        }
    }

    /// Queue one chunk of input.
    pub fn with_input(self, chunk: &[u8]) -> Self {
        self.input.try_lock().expect("fresh mock").push_back(chunk.to_vec());
        self
    }

    /// Block on `recv` once scripted input runs out instead of reporting a hangup.
    pub fn keep_open(mut self) -> Self {
        self.keep_open = true;
        self
    }

    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub fn resize(&self, cols: u32, rows: u32) {
        self.size_tx.send_replace(TerminalSize::new(cols, rows));
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| String::from_utf8_lossy(m).to_string()).collect()
    }

    pub fn sent_text(&self) -> String {
        self.sent_messages().concat()
    }
}

#[async_trait]
impl ClientChannel for MockClient {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn terminal(&self) -> &TerminalMeta {
        &self.terminal
    }

    async fn send(&self, data: &[u8]) -> Result<(), ChannelError> {
        if self.fail_sends {
            return Err(ChannelError::Closed);
        }
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        let next = self.input.lock().await.pop_front();
        match next {
            Some(chunk) => Some(chunk),
            None if self.keep_open => std::future::pending().await,
            None => None,
        }
    }
}

#[derive(Default)]
pub struct MockAuthz {
    password: Option<String>,
    private_key: Option<String>,
    allowed: bool,
    fail_lookup: bool,
    fail_check: bool,
    lookups: AtomicUsize,
    checks: AtomicUsize,
}

impl MockAuthz {
    pub fn allowing() -> Self {
        Self {
            allowed: true,
            ..Default::default()
        }
    }

    pub fn denying() -> Self {
        Self::default()
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_private_key(mut self, key: &str) -> Self {
        self.private_key = Some(key.to_string());
        self
    }

    pub fn failing_secret_lookup(mut self) -> Self {
        self.fail_lookup = true;
        self
    }

    pub fn failing_permission_check(mut self) -> Self {
        self.fail_check = true;
        self
    }

    pub fn secret_lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn permission_checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthorizationService for MockAuthz {
    async fn account_secret(&self, _account: &AccountDescriptor) -> ServerResult<Option<AccountSecret>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup {
            return Err(ServerError::Other("secret store unavailable".into()));
        }
        if let Some(key) = &self.private_key {
            return Ok(Some(AccountSecret::private_key(key.clone(), None)));
        }
        Ok(self.password.clone().map(AccountSecret::password))
    }

    async fn check_permission(&self, _identity: &Identity, _target: &TargetDescriptor, _account: &AccountDescriptor) -> ServerResult<bool> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.fail_check {
            return Err(ServerError::Other("policy store unavailable".into()));
        }
        Ok(self.allowed)
    }
}

pub struct MockChannel {
    input: Mutex<Vec<u8>>,
    input_chunks: AtomicUsize,
    input_notify: Notify,
    output_tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    output_rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    resizes: Mutex<Vec<TerminalSize>>,
    resize_notify: Notify,
    fail_resize: bool,
    closed: AtomicBool,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            input: Mutex::new(Vec::new()),
            input_chunks: AtomicUsize::new(0),
            input_notify: Notify::new(),
            output_tx: Mutex::new(Some(tx)),
            output_rx: Mutex::new(Some(rx)),
            resizes: Mutex::new(Vec::new()),
            resize_notify: Notify::new(),
            fail_resize: false,
            closed: AtomicBool::new(false),
        }
    }

    pub fn failing_resize(mut self) -> Self {
        self.fail_resize = true;
        self
    }

    pub fn emit(&self, data: &[u8]) {
        if let Some(tx) = self.output_tx.lock().unwrap().as_ref() {
            let _ = tx.send(data.to_vec());
        }
    }

    /// Simulate the target closing its side.
    pub fn end_output(&self) {
        self.output_tx.lock().unwrap().take();
    }

    pub fn received(&self) -> Vec<u8> {
        self.input.lock().unwrap().clone()
    }

    pub fn resizes(&self) -> Vec<TerminalSize> {
        self.resizes.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn wait_for_resizes(&self, count: usize) {
        loop {
            let notified = self.resize_notify.notified();
            if self.resizes.lock().unwrap().len() >= count {
                return;
            }
            notified.await;
        }
    }

    pub async fn wait_for_input(&self, chunks: usize) {
        loop {
            let notified = self.input_notify.notified();
            if self.input_chunks.load(Ordering::SeqCst) >= chunks {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl ServerChannel for MockChannel {
    async fn send(&self, data: Vec<u8>) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.input.lock().unwrap().extend_from_slice(&data);
        self.input_chunks.fetch_add(1, Ordering::SeqCst);
        self.input_notify.notify_waiters();
        Ok(())
    }

    fn take_output(&self) -> Option<mpsc::UnboundedReceiver<Vec<u8>>> {
        self.output_rx.lock().unwrap().take()
    }

    async fn resize(&self, size: TerminalSize) -> Result<(), ChannelError> {
        if self.fail_resize || self.is_closed() {
            return Err(ChannelError::ResizeFailed("channel gone".into()));
        }
        self.resizes.lock().unwrap().push(size);
        self.resize_notify.notify_waiters();
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.output_tx.lock().unwrap().take();
    }
}

pub struct MockEstablisher {
    channel: Option<Arc<MockChannel>>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen_password: Mutex<Option<String>>,
}

impl MockEstablisher {
    pub fn succeeding(channel: Arc<MockChannel>) -> Self {
        Self {
            channel: Some(channel),
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
            seen_password: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            channel: None,
            failure: Some(message.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
            seen_password: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_password(&self) -> Option<String> {
        self.seen_password.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionEstablisher for MockEstablisher {
    async fn establish(
        &self,
        _target: &TargetDescriptor,
        account: &AccountDescriptor,
        _term: &TerminalMeta,
    ) -> Result<Arc<dyn ServerChannel>, ConnectFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_password.lock().unwrap() = account.password().map(str::to_string);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match (&self.channel, &self.failure) {
            (Some(channel), _) => Ok(channel.clone()),
            (None, Some(message)) => Err(ConnectFailure::new(message.clone())),
            (None, None) => Err(ConnectFailure::new("no channel configured")),
        }
    }
}
