use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use hangar_types::BuilderCaps;

/// Which leg of the builder protocol a session is currently on. Transitions
/// are driven exclusively by messages received from the builder; DRIVER
/// never moves a session except in response to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveState {
    Handshake,
    Idle,
    Building,
    Sending,
    Goodbye,
}

/// What a session is building or sending, when it isn't idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentJob {
    pub package: String,
    pub version: String,
    pub abi: String,
    pub started_at: DateTime<Utc>,
}

/// Per-file state while a `Sending` session's files transfer through
/// JUGGLER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub filenames: Vec<String>,
    pub next: usize,
}

impl PendingSend {
    pub fn current_filename(&self) -> Option<&str> {
        self.filenames.get(self.next).map(String::as_str)
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.filenames.len()
    }
}

#[derive(Debug, Clone)]
pub struct SlaveSession {
    pub slave_id: u64,
    pub caps: BuilderCaps,
    pub master_timeout: Duration,
    pub state: SlaveState,
    pub current: Option<CurrentJob>,
    pub pending_send: Option<PendingSend>,
    pub last_heartbeat: Instant,
    pub kill_armed: bool,
    pub cancel_armed: bool,
    pub verified: HashSet<String>,
    pub rejected: HashSet<String>,
    /// Consecutive hash-mismatch rejections per filename. Reset only by a
    /// fresh session; a filename that reaches 3 fails the whole build (§7).
    pub rejection_counts: HashMap<String, u32>,
}

impl SlaveSession {
    fn new(slave_id: u64, caps: BuilderCaps, master_timeout: Duration) -> Self {
        SlaveSession {
            slave_id,
            caps,
            master_timeout,
            state: SlaveState::Idle,
            current: None,
            pending_send: None,
            last_heartbeat: Instant::now(),
            kill_armed: false,
            cancel_armed: false,
            verified: HashSet::new(),
            rejected: HashSet::new(),
            rejection_counts: HashMap::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.last_heartbeat) > self.master_timeout
    }
}

/// The map of live builder sessions. Owned by a single thread, per the
/// "no locks across tasks" rule — every mutation happens inline in the
/// message-handling call, never from a background thread.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<u64, SlaveSession>,
    next_id: u64,
}

impl SessionTable {
    pub fn new() -> Self {
        SessionTable::default()
    }

    /// Allocate a fresh slave id and register a new session in `Idle`
    /// (handshake is immediate: HELLO is answered synchronously with ACK).
    pub fn allocate(&mut self, caps: BuilderCaps, master_timeout: Duration) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.sessions.insert(id, SlaveSession::new(id, caps, master_timeout));
        id
    }

    pub fn get(&self, slave_id: u64) -> Option<&SlaveSession> {
        self.sessions.get(&slave_id)
    }

    pub fn get_mut(&mut self, slave_id: u64) -> Option<&mut SlaveSession> {
        self.sessions.get_mut(&slave_id)
    }

    pub fn remove(&mut self, slave_id: u64) -> Option<SlaveSession> {
        self.sessions.remove(&slave_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SlaveSession> {
        self.sessions.values_mut()
    }

    /// Sessions whose last heartbeat is older than their own master-timeout.
    /// Their slave ids are never reused.
    pub fn expired(&self, now: Instant) -> Vec<u64> {
        self.sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.slave_id)
            .collect()
    }
}
