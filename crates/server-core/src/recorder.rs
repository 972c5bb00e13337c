//! Command and replay recording sinks handed to each session.
//!
//! Recordings are not persisted here. The defaults write commands to the audit log target and
//! keep a bounded in-memory replay buffer per session.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use tracing::{info, warn};

use crate::bridge::SessionMeta;

pub const AUDIT_TARGET: &str = "gk::audit";

pub trait CommandRecorder: Send + Sync {
    fn record(&self, meta: &SessionMeta, command: &str);
}

pub trait ReplayRecorder: Send + Sync {
    fn record_output(&self, data: &[u8]);
    fn finish(&self);
}

/// Creates the recorders for a new session.
pub trait RecorderFactory: Send + Sync {
    fn command_recorder(&self, meta: &SessionMeta) -> Arc<dyn CommandRecorder>;
    fn replay_recorder(&self, meta: &SessionMeta) -> Arc<dyn ReplayRecorder>;
}

pub struct AuditCommandRecorder;

impl CommandRecorder for AuditCommandRecorder {
    fn record(&self, meta: &SessionMeta, command: &str) {
        info!(
            target: AUDIT_TARGET,
            session_id = %meta.id,
            user = %meta.user,
            target_name = %meta.target,
            account = %meta.account,
            command,
            "command"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayFrame {
    /// Milliseconds since the recorder was created.
    pub offset_ms: u64,
    pub data: Vec<u8>,
}

struct ReplayBuffer {
    frames: VecDeque<ReplayFrame>,
    bytes: usize,
}

/// Keeps the most recent `limit` bytes of output with timing.
pub struct MemoryReplayRecorder {
    limit: usize,
    started: Instant,
    buffer: Mutex<ReplayBuffer>,
    finished: AtomicBool,
}

impl MemoryReplayRecorder {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            started: Instant::now(),
            buffer: Mutex::new(ReplayBuffer {
                frames: VecDeque::new(),
                bytes: 0,
            }),
            finished: AtomicBool::new(false),
        }
    }

    pub fn frames(&self) -> Vec<ReplayFrame> {
        self.buffer.lock().map(|b| b.frames.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffer.lock().map(|b| b.bytes).unwrap_or(0)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

impl ReplayRecorder for MemoryReplayRecorder {
    fn record_output(&self, data: &[u8]) {
        if data.is_empty() || self.is_finished() {
            return;
        }
        let Ok(mut buffer) = self.buffer.lock() else {
            warn!("replay buffer poisoned; dropping output");
            return;
        };
        buffer.frames.push_back(ReplayFrame {
            offset_ms: self.started.elapsed().as_millis() as u64,
            data: data.to_vec(),
        });
        buffer.bytes += data.len();
        while buffer.bytes > self.limit {
            match buffer.frames.pop_front() {
                Some(old) => buffer.bytes -= old.data.len(),
                None => break,
            }
        }
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

pub struct DefaultRecorderFactory {
    replay_limit: usize,
}

impl DefaultRecorderFactory {
    pub fn new(replay_limit: usize) -> Self {
        Self { replay_limit }
    }
}

impl RecorderFactory for DefaultRecorderFactory {
    fn command_recorder(&self, _meta: &SessionMeta) -> Arc<dyn CommandRecorder> {
        Arc::new(AuditCommandRecorder)
    }

    fn replay_recorder(&self, _meta: &SessionMeta) -> Arc<dyn ReplayRecorder> {
        Arc::new(MemoryReplayRecorder::new(self.replay_limit))
    }
}

/// Reassembles typed commands from raw client keystrokes.
#[derive(Default)]
pub struct CommandAssembler {
    line: Vec<u8>,
    escape: EscapeState,
}

#[derive(Default, Clone, Copy, PartialEq, Eq)]
enum EscapeState {
    #[default]
    None,
    Start,
    Csi,
}

impl CommandAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed input bytes, returning every command completed by them.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        let mut done = Vec::new();
        for &b in data {
            match self.escape {
                EscapeState::Start => {
                    self.escape = if b == b'[' || b == b'O' { EscapeState::Csi } else { EscapeState::None };
                    continue;
                }
                EscapeState::Csi => {
                    if (0x40..=0x7e).contains(&b) {
                        self.escape = EscapeState::None;
                    }
                    continue;
                }
                EscapeState::None => {}
            }
            match b {
                0x1b => self.escape = EscapeState::Start,
                b'\r' | b'\n' => {
                    let command = String::from_utf8_lossy(&self.line).trim().to_string();
                    self.line.clear();
                    if !command.is_empty() {
                        done.push(command);
                    }
                }
                0x7f | 0x08 => {
                    self.line.pop();
                }
                0x03 | 0x15 => self.line.clear(),
                b if b < 0x20 => {}
                b => self.line.push(b),
            }
        }
        done
    }
}
