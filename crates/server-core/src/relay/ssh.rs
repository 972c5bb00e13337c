//! SSH implementation of the backend connection.

use std::{borrow::Cow, sync::Arc, time::Duration};

use async_trait::async_trait;
use gk_types::{AccountDescriptor, AccountSecret, TargetDescriptor, TerminalSize};
use russh::{
    ChannelMsg, Preferred, client,
    keys::{self, Algorithm, HashAlg},
};
use secrecy::ExposeSecret;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ChannelError, ConnectFailure, ConnectionEstablisher, ServerChannel, handler::TargetKeyHandler};
use crate::{
    client::TerminalMeta,
    error::{ServerError, ServerResult},
};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn default_preferred() -> Preferred {
    Preferred::DEFAULT.clone()
}

/// Algorithms accepted by older appliances that predate curve25519 and CTR-only servers.
pub fn legacy_preferred() -> Preferred {
    Preferred {
        kex: Cow::Owned(vec![
            russh::kex::CURVE25519,
            russh::kex::DH_G14_SHA1,
            russh::kex::DH_G1_SHA1,
        ]),
        key: Cow::Owned(vec![
            Algorithm::Ed25519,
            Algorithm::Rsa {
                hash: Some(HashAlg::Sha512),
            },
            Algorithm::Rsa {
                hash: Some(HashAlg::Sha256),
            },
            Algorithm::Rsa { hash: None },
        ]),
        cipher: Cow::Owned(vec![
            russh::cipher::AES_128_CTR,
            russh::cipher::AES_256_CTR,
            russh::cipher::AES_128_CBC,
            russh::cipher::CHACHA20_POLY1305,
        ]),
        mac: Cow::Owned(vec![russh::mac::HMAC_SHA256, russh::mac::HMAC_SHA512, russh::mac::HMAC_SHA1]),
        compression: Preferred::DEFAULT.compression,
    }
}

fn build_client_config(legacy: bool) -> Arc<client::Config> {
    let cfg = client::Config {
        preferred: if legacy { legacy_preferred() } else { default_preferred() },
        nodelay: true,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        ..Default::default()
    };
    Arc::new(cfg)
}

fn ensure_success(res: client::AuthResult, method: &str) -> ServerResult<()> {
    match res {
        client::AuthResult::Success => Ok(()),
        client::AuthResult::Failure { .. } => Err(ServerError::AuthFailed(method.to_string())),
    }
}

async fn authenticate(remote: &mut client::Handle<TargetKeyHandler>, account: &AccountDescriptor) -> ServerResult<()> {
    let username = account.username.clone();
    match account.secret() {
        Some(AccountSecret::PrivateKey { key, passphrase }) => {
            let passphrase = passphrase.as_ref().map(|p| p.expose_secret().as_str());
            let private = keys::decode_secret_key(key.expose_secret(), passphrase)?;
            let rsa_hint = remote.best_supported_rsa_hash().await.unwrap_or(None).flatten();
            let hash_alg = if private.algorithm().is_rsa() { rsa_hint } else { None };
            let key = keys::PrivateKeyWithHashAlg::new(Arc::new(private), hash_alg);
            let res = remote.authenticate_publickey(username, key).await?;
            ensure_success(res, "publickey")
        }
        Some(AccountSecret::Password(password)) => {
            let res = remote.authenticate_password(username, password.expose_secret().clone()).await?;
            ensure_success(res, "password")
        }
        None => {
            debug!(account = %account.name, "no secret available; trying empty password");
            let res = remote.authenticate_password(username, String::new()).await?;
            ensure_success(res, "password")
        }
    }
}

/// Connects to targets over SSH and opens an interactive shell channel.
pub struct SshEstablisher {
    connect_timeout: Duration,
}

impl Default for SshEstablisher {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl SshEstablisher {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn open(&self, target: &TargetDescriptor, account: &AccountDescriptor, term: &TerminalMeta) -> ServerResult<SshChannel> {
        let cfg = build_client_config(target.legacy_crypto);
        let handler = TargetKeyHandler::new(target.host_key.clone(), target.name.clone());
        let mismatch = handler.mismatch.clone();

        info!(target_name = %target.name, endpoint = %target.endpoint(), account = %account.name, "connecting to target");
        let mut remote = match client::connect(cfg, (target.address.as_str(), target.port), handler).await {
            Ok(remote) => remote,
            Err(err) => {
                let pinned = mismatch.lock().ok().and_then(|mut slot| slot.take());
                return Err(match pinned {
                    Some(msg) => ServerError::Other(msg),
                    None => err.into(),
                });
            }
        };

        authenticate(&mut remote, account).await?;

        let size = term.size().clamped();
        let rchan = remote.channel_open_session().await?;
        rchan.request_pty(true, term.term(), size.cols, size.rows, 0, 0, &[]).await?;
        rchan.request_shell(true).await?;

        Ok(SshChannel::spawn(remote, rchan, target.name.clone()))
    }
}

#[async_trait]
impl ConnectionEstablisher for SshEstablisher {
    async fn establish(
        &self,
        target: &TargetDescriptor,
        account: &AccountDescriptor,
        term: &TerminalMeta,
    ) -> Result<Arc<dyn ServerChannel>, ConnectFailure> {
        match tokio::time::timeout(self.connect_timeout, self.open(target, account, term)).await {
            Ok(Ok(channel)) => Ok(Arc::new(channel)),
            Ok(Err(err)) => {
                warn!(target_name = %target.name, error = %err, "connection to target failed");
                Err(err.into())
            }
            Err(_) => {
                warn!(target_name = %target.name, timeout = ?self.connect_timeout, "connection to target timed out");
                Err(ConnectFailure::new(format!("Connect to {} timed out", target.name)))
            }
        }
    }
}

/// Live SSH shell channel. A single pump task owns the russh channel and session handle.
pub struct SshChannel {
    input_tx: mpsc::UnboundedSender<Vec<u8>>,
    resize_tx: mpsc::UnboundedSender<TerminalSize>,
    output: std::sync::Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    shutdown: CancellationToken,
}

impl SshChannel {
    fn spawn(remote: client::Handle<TargetKeyHandler>, rchan: russh::Channel<client::Msg>, target_name: String) -> Self {
        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (resize_tx, mut resize_rx) = mpsc::unbounded_channel::<TerminalSize>();
        let (output_tx, output_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        tokio::spawn(async move {
            let mut rchan = rchan;
            loop {
                tokio::select! {
                    msg = rchan.wait() => {
                        match msg {
                            Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                                if output_tx.send(data.to_vec()).is_err() {
                                    break;
                                }
                            }
                            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                            _ => {}
                        }
                    }
                    maybe_bytes = input_rx.recv() => {
                        match maybe_bytes {
                            Some(bytes) => {
                                if !bytes.is_empty() {
                                    let mut cursor = std::io::Cursor::new(bytes);
                                    if rchan.data(&mut cursor).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            None => break,
                        }
                    }
                    Some(size) = resize_rx.recv() => {
                        if rchan.window_change(size.cols, size.rows, 0, 0).await.is_err() {
                            warn!(target_name = %target_name, "failed to propagate window change");
                            break;
                        }
                    }
                    _ = stop.cancelled() => break,
                }
            }
            let _ = rchan.eof().await;
            let _ = rchan.close().await;
            let _ = remote.disconnect(russh::Disconnect::ByApplication, "", "en").await;
            debug!(target_name = %target_name, "target channel closed");
        });

        Self {
            input_tx,
            resize_tx,
            output: std::sync::Mutex::new(Some(output_rx)),
            shutdown,
        }
    }
}

#[async_trait]
impl ServerChannel for SshChannel {
    async fn send(&self, data: Vec<u8>) -> Result<(), ChannelError> {
        self.input_tx.send(data).map_err(|_| ChannelError::Closed)
    }

    fn take_output(&self) -> Option<mpsc::UnboundedReceiver<Vec<u8>>> {
        self.output.lock().ok().and_then(|mut slot| slot.take())
    }

    async fn resize(&self, size: TerminalSize) -> Result<(), ChannelError> {
        if self.shutdown.is_cancelled() {
            return Err(ChannelError::Closed);
        }
        self.resize_tx
            .send(size.clamped())
            .map_err(|e| ChannelError::ResizeFailed(e.to_string()))
    }

    async fn close(&self) {
        self.shutdown.cancel();
    }
}
