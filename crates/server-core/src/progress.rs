//! The "Connecting to account@target 0.0" counter shown while a connection is being established.

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};
use tracing::trace;

use crate::{client::ClientChannel, format::counter_update};

pub const PROGRESS_TICK: Duration = Duration::from_millis(100);

pub struct ConnectProgressNotifier;

impl ConnectProgressNotifier {
    /// Send `banner` and start ticking on a background task. Ticking stops after `timeout`
    /// or once the returned handle is cleared, whichever comes first.
    pub fn start(client: Arc<dyn ClientChannel>, banner: String, timeout: Duration) -> ProgressHandle {
        let (connecting, rx) = watch::channel(true);
        let max_ticks = (timeout.as_millis() / PROGRESS_TICK.as_millis()) as u64;
        let task = tokio::spawn(run(client, banner, rx, max_ticks));
        ProgressHandle { connecting, task }
    }
}

async fn run(client: Arc<dyn ClientChannel>, banner: String, mut connecting: watch::Receiver<bool>, max_ticks: u64) {
    if client.send_text(&banner).await.is_err() {
        return;
    }
    let mut ticks = 0u64;
    while *connecting.borrow_and_update() && ticks < max_ticks {
        let elapsed = PROGRESS_TICK.as_secs_f64() * ticks as f64;
        if client.send_text(&counter_update(elapsed)).await.is_err() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(PROGRESS_TICK) => {}
            changed = connecting.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        ticks += 1;
    }
    trace!(ticks, "connect progress stopped");
}

/// Owner side of the "still connecting" flag.
pub struct ProgressHandle {
    connecting: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ProgressHandle {
    pub fn clear(&self) {
        self.connecting.send_replace(false);
    }

    pub fn is_connecting(&self) -> bool {
        *self.connecting.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Clear the flag and wait for the counter to stop writing. The wait lasts at most one
    /// in-flight send, since clearing wakes the counter immediately.
    pub async fn finish(self) {
        self.clear();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockClient;

    const BANNER: &str = "Connecting to root@web01 0.0";

    #[tokio::test(start_paused = true)]
    async fn stops_at_timeout_when_never_cleared() {
        let client = Arc::new(MockClient::new("alice"));
        let handle = ConnectProgressNotifier::start(client.clone(), BANNER.to_string(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(handle.is_finished());
        assert!(handle.is_connecting());
        let sent = client.sent_messages();
        assert_eq!(sent[0], BANNER);
        assert_eq!(sent.len(), 1 + 100);
        assert_eq!(sent[1], "\x08\x08\x080.0");
        assert_eq!(sent[100], "\x08\x08\x089.9");
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_stops_ticks() {
        let client = Arc::new(MockClient::new("alice"));
        let handle = ConnectProgressNotifier::start(client.clone(), BANNER.to_string(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_millis(350)).await;
        handle.finish().await;
        let after_clear = client.sent_messages().len();
        assert!((1 + 3..=1 + 4).contains(&after_clear), "sent {after_clear}");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(client.sent_messages().len(), after_clear);
    }

    #[tokio::test(start_paused = true)]
    async fn gone_client_ends_early() {
        let client = Arc::new(MockClient::new("alice").failing_sends());
        let handle = ConnectProgressNotifier::start(client, BANNER.to_string(), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(handle.is_finished());
    }
}
