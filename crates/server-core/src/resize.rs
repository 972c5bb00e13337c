//! Propagates client window changes to the live backend channel.

use std::sync::Arc;

use gk_types::TerminalSize;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::relay::ServerChannel;

/// Why a [`ResizeWatcher`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    /// The client side dropped its size sender.
    ClientGone,
    /// Applying a size failed; the channel is no longer usable.
    ChannelClosed,
}

pub struct ResizeWatcher {
    channel: Arc<dyn ServerChannel>,
    sizes: watch::Receiver<TerminalSize>,
    cancel: CancellationToken,
}

impl ResizeWatcher {
    pub fn new(channel: Arc<dyn ServerChannel>, sizes: watch::Receiver<TerminalSize>, cancel: CancellationToken) -> Self {
        Self { channel, sizes, cancel }
    }

    pub fn spawn(self) -> JoinHandle<StopReason> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> StopReason {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return StopReason::Cancelled,
                changed = self.sizes.changed() => {
                    if changed.is_err() {
                        return StopReason::ClientGone;
                    }
                }
            }
            // A size that raced with teardown is dropped.
            if self.cancel.is_cancelled() {
                return StopReason::Cancelled;
            }
            let size = self.sizes.borrow_and_update().clamped();
            debug!(cols = size.cols, rows = size.rows, "propagating window change");
            if let Err(err) = self.channel.resize(size).await {
                debug!(error = %err, "window change failed; stopping resize watcher");
                return StopReason::ChannelClosed;
            }
        }
    }
}
