//! Backend side of a proxied session.
//!
//! A [`ConnectionEstablisher`] turns a target and an account into a live [`ServerChannel`].
//! The SSH implementation lives in [`ssh`]; tests substitute in-memory channels.

pub mod handler;
pub mod ssh;

use std::sync::Arc;

use async_trait::async_trait;
use gk_types::{AccountDescriptor, TargetDescriptor, TerminalSize};
use tokio::sync::mpsc;

use crate::client::TerminalMeta;

pub use handler::TargetKeyHandler;
pub use ssh::{SshChannel, SshEstablisher};

/// Errors raised by a live backend channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel is closed")]
    Closed,
    #[error("Resize failed: {0}")]
    ResizeFailed(String),
}

/// Live duplex channel to a target.
#[async_trait]
pub trait ServerChannel: Send + Sync {
    /// Forward client input to the target.
    async fn send(&self, data: Vec<u8>) -> Result<(), ChannelError>;

    /// Take the target output stream. Yields `Some` exactly once; the stream ends when the target closes.
    fn take_output(&self) -> Option<mpsc::UnboundedReceiver<Vec<u8>>>;

    /// Apply a new terminal size to the remote pty.
    async fn resize(&self, size: TerminalSize) -> Result<(), ChannelError>;

    /// Close the channel. Repeated calls are harmless.
    async fn close(&self);
}

/// Human-readable reason a connection could not be established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectFailure {
    pub message: String,
}

impl ConnectFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<crate::error::ServerError> for ConnectFailure {
    fn from(err: crate::error::ServerError) -> Self {
        Self::new(err.to_string())
    }
}

#[async_trait]
pub trait ConnectionEstablisher: Send + Sync {
    /// Connect, authenticate and open an interactive pty channel sized from `term`.
    async fn establish(
        &self,
        target: &TargetDescriptor,
        account: &AccountDescriptor,
        term: &TerminalMeta,
    ) -> Result<Arc<dyn ServerChannel>, ConnectFailure>;
}
