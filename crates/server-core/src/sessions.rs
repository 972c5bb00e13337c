//! Process-wide registry of live proxied sessions.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{
        RwLock,
        broadcast::{self, error::RecvError},
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bridge::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: Uuid,
    pub session_number: u32,
    pub user: String,
    pub target: String,
    pub account: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Created(SessionSummary),
    Removed { id: Uuid, session_number: u32 },
}

struct Entry {
    session_number: u32,
    session: Arc<Session>,
}

impl Entry {
    fn summary(&self) -> SessionSummary {
        let meta = self.session.meta();
        SessionSummary {
            id: meta.id,
            session_number: self.session_number,
            user: meta.user.username.clone(),
            target: meta.target.clone(),
            account: meta.account.clone(),
            started_at: meta.started_at,
        }
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
    next_number: Arc<AtomicU32>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_number: Arc::new(AtomicU32::new(1)),
            event_tx,
        }
    }

    /// Register a session and return its display number.
    pub async fn add(&self, session: Arc<Session>) -> u32 {
        let session_number = self.next_number.fetch_add(1, Ordering::Relaxed);
        let entry = Entry { session_number, session };
        let summary = entry.summary();
        {
            let mut sessions = self.sessions.write().await;
            if sessions.insert(summary.id, entry).is_some() {
                warn!(session_id = %summary.id, "replaced an already registered session");
            }
        }
        debug!(session_id = %summary.id, session_number, user = %summary.user, "session registered");
        let _ = self.event_tx.send(SessionEvent::Created(summary));
        session_number
    }

    /// Remove a session. Returns false if it was not registered.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id);
        match removed {
            Some(entry) => {
                debug!(session_id = %id, session_number = entry.session_number, "session removed");
                let _ = self.event_tx.send(SessionEvent::Removed {
                    id,
                    session_number: entry.session_number,
                });
                true
            }
            None => false,
        }
    }

    pub async fn list_all(&self) -> Vec<SessionSummary> {
        let mut all: Vec<_> = self.sessions.read().await.values().map(Entry::summary).collect();
        all.sort_by_key(|s| s.session_number);
        all
    }

    pub async fn list_for_user(&self, user: &str) -> Vec<SessionSummary> {
        let mut all = self.list_all().await;
        all.retain(|s| s.user == user);
        all
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Log every session open and close together with the number of live sessions.
    pub fn spawn_event_log(&self) -> JoinHandle<()> {
        let registry = self.clone();
        let mut events = self.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Created(s)) => {
                        let active = registry.len().await;
                        info!(
                            session_number = s.session_number,
                            user = %s.user,
                            target_name = %s.target,
                            account = %s.account,
                            active,
                            "session opened"
                        );
                    }
                    Ok(SessionEvent::Removed { id, session_number }) => {
                        let active = registry.len().await;
                        info!(session_id = %id, session_number, active, "session closed");
                    }
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "session event log fell behind"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
