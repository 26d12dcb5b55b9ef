use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::stats::ClientStats;

/// Identity of a connection, unique within a channel.
pub type ClientId = u64;

/// Connection state as reported in [`ClientStats::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ClientState {
    Init = 0,
    Disconnected = 1,
    Connected = 2,
    Subscribed = 3,
    Closing = 4,
}

impl ClientState {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Init),
            1 => Some(Self::Disconnected),
            2 => Some(Self::Connected),
            3 => Some(Self::Subscribed),
            4 => Some(Self::Closing),
            _ => None,
        }
    }
}

/// A connected consumer as seen by its channel.
///
/// `stats` is called while a snapshot is in progress, so implementations
/// must be cheap and internally synchronized.
///
/// The delivery hooks are invoked by the owning channel while it holds its
/// write lock, so they must not call back into the registry.
pub trait Client: Send + Sync {
    fn id(&self) -> ClientId;

    fn stats(&self) -> ClientStats;

    /// A message was handed to this client.
    fn sending_message(&self) {}

    fn finished_message(&self) {}

    fn requeued_message(&self) {}

    fn timed_out_message(&self) {}
}

/// Client connection with lock-free counters.
#[derive(Debug)]
pub struct ClientConnection {
    id: ClientId,
    version: String,
    remote_address: String,
    name: String,
    connect_time: i64,
    state: AtomicI32,
    ready_count: AtomicI64,
    in_flight_count: AtomicI64,
    message_count: AtomicU64,
    finish_count: AtomicU64,
    requeue_count: AtomicU64,
}

impl ClientConnection {
    pub fn new(
        id: ClientId,
        version: impl Into<String>,
        remote_address: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let connect_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .and_then(|d| i64::try_from(d.as_secs()).ok())
            .unwrap_or(0);
        Self {
            id,
            version: version.into(),
            remote_address: remote_address.into(),
            name: name.into(),
            connect_time,
            state: AtomicI32::new(ClientState::Connected as i32),
            ready_count: AtomicI64::new(0),
            in_flight_count: AtomicI64::new(0),
            message_count: AtomicU64::new(0),
            finish_count: AtomicU64::new(0),
            requeue_count: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_raw(self.state.load(Ordering::Acquire)).unwrap_or(ClientState::Init)
    }

    pub fn set_state(&self, state: ClientState) {
        self.state.store(state as i32, Ordering::Release);
    }

    pub fn set_ready_count(&self, count: i64) {
        self.ready_count.store(count, Ordering::Relaxed);
    }

    fn release_in_flight(&self) {
        let _ = self
            .in_flight_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1).max(0)));
    }
}

impl Client for ClientConnection {
    fn id(&self) -> ClientId {
        self.id
    }

    fn stats(&self) -> ClientStats {
        ClientStats {
            version: self.version.clone(),
            remote_address: self.remote_address.clone(),
            name: self.name.clone(),
            state: self.state.load(Ordering::Acquire),
            ready_count: self.ready_count.load(Ordering::Relaxed),
            in_flight_count: self.in_flight_count.load(Ordering::Relaxed),
            message_count: self.message_count.load(Ordering::Relaxed),
            finish_count: self.finish_count.load(Ordering::Relaxed),
            requeue_count: self.requeue_count.load(Ordering::Relaxed),
            connect_time: self.connect_time,
        }
    }

    fn sending_message(&self) {
        self.in_flight_count.fetch_add(1, Ordering::Relaxed);
        self.message_count.fetch_add(1, Ordering::Relaxed);
    }

    fn finished_message(&self) {
        self.release_in_flight();
        self.finish_count.fetch_add(1, Ordering::Relaxed);
    }

    fn requeued_message(&self) {
        self.release_in_flight();
        self.requeue_count.fetch_add(1, Ordering::Relaxed);
    }

    fn timed_out_message(&self) {
        self.release_in_flight();
    }
}
