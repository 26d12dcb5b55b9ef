use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ChannelError, ChannelResult};
use crate::latency::{LatencyAggregator, LatencyStream, QuantileAggregator};
use crate::ordering::Named;
use crate::registry::backend::BackendQueue;
use crate::registry::client::{Client, ClientId};
use crate::registry::message::Message;

/// A message delivered to a client and not yet finished, requeued or timed out.
pub(crate) struct InFlight {
    pub(crate) message: Message,
    pub(crate) client_id: ClientId,
    pub(crate) delivered_at: Instant,
}

/// A requeued message waiting for its delay to elapse.
pub(crate) struct Deferred {
    pub(crate) message: Message,
    pub(crate) due: Instant,
}

/// Everything guarded by the channel lock.
#[derive(Default)]
pub(crate) struct ChannelState {
    /// Connection order.
    pub(crate) clients: Vec<Arc<dyn Client>>,
    pub(crate) memory: VecDeque<Message>,
    pub(crate) in_flight: HashMap<Uuid, InFlight>,
    pub(crate) deferred: HashMap<Uuid, Deferred>,
    pub(crate) message_count: u64,
    pub(crate) requeue_count: u64,
    pub(crate) timeout_count: u64,
    pub(crate) paused: bool,
}

impl ChannelState {
    fn has_client(&self, id: ClientId) -> bool {
        self.client(id).is_some()
    }

    /// Subscribed client with `id`. `None` once it has disconnected.
    fn client(&self, id: ClientId) -> Option<&Arc<dyn Client>> {
        self.clients.iter().find(|c| c.id() == id)
    }
}

/// A channel of a topic: its own copy of the topic's message stream, the
/// clients consuming it, and its delivery bookkeeping.
///
/// Mutators take only this channel's write lock. A deleted channel keeps
/// answering reads so that snapshots holding it stay valid.
pub struct Channel<A: LatencyAggregator = QuantileAggregator> {
    name: String,
    topic_name: String,
    backend: Arc<dyn BackendQueue>,
    pub(crate) e2e_latency: A::Stream,
    pub(crate) state: RwLock<ChannelState>,
    deleted: AtomicBool,
}

impl<A: LatencyAggregator> Channel<A> {
    pub(crate) fn new(
        topic_name: &str,
        name: &str,
        backend: Arc<dyn BackendQueue>,
        e2e_latency: A::Stream,
    ) -> Self {
        Self {
            name: name.to_string(),
            topic_name: topic_name.to_string(),
            backend,
            e2e_latency,
            state: RwLock::new(ChannelState::default()),
            deleted: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Write lock on a channel that has not been deleted.
    fn live_state(&self) -> ChannelResult<RwLockWriteGuard<'_, ChannelState>> {
        let state = self.state.write();
        if self.is_deleted() {
            return Err(ChannelError::Deleted(self.name.clone()));
        }
        Ok(state)
    }

    pub(crate) fn mark_deleted(&self) {
        let _state = self.state.write();
        self.deleted.store(true, Ordering::Release);
        info!(topic = %self.topic_name, channel = %self.name, "channel deleted");
    }

    /// Subscribe a client. Adding an already subscribed id is a no-op.
    pub fn add_client(&self, client: Arc<dyn Client>) -> ChannelResult<()> {
        let mut state = self.live_state()?;
        let id = client.id();
        if state.has_client(id) {
            return Ok(());
        }
        state.clients.push(client);
        debug!(topic = %self.topic_name, channel = %self.name, client_id = id, "client added");
        Ok(())
    }

    /// Unsubscribe a client, preserving the order of the others. Returns
    /// whether the client was subscribed.
    pub fn remove_client(&self, id: ClientId) -> bool {
        let mut state = self.state.write();
        match state.clients.iter().position(|c| c.id() == id) {
            Some(idx) => {
                state.clients.remove(idx);
                debug!(topic = %self.topic_name, channel = %self.name, client_id = id, "client removed");
                true
            }
            None => false,
        }
    }

    pub fn client_count(&self) -> usize {
        self.state.read().clients.len()
    }

    pub fn put_message(&self, message: Message) -> ChannelResult<()> {
        let mut state = self.live_state()?;
        state.memory.push_back(message);
        state.message_count += 1;
        Ok(())
    }

    /// Hand the oldest queued message to `client_id`. Returns `None` when the
    /// channel is paused or has nothing queued in memory.
    pub fn start_in_flight(&self, client_id: ClientId) -> ChannelResult<Option<Message>> {
        let mut state = self.live_state()?;
        let client = state
            .client(client_id)
            .cloned()
            .ok_or(ChannelError::ClientNotFound(client_id))?;
        if state.paused {
            return Ok(None);
        }
        let Some(mut message) = state.memory.pop_front() else {
            return Ok(None);
        };
        message.attempts = message.attempts.saturating_add(1);
        client.sending_message();
        state.in_flight.insert(
            message.id,
            InFlight {
                message: message.clone(),
                client_id,
                delivered_at: Instant::now(),
            },
        );
        Ok(Some(message))
    }

    /// Acknowledge an in-flight message and record its end-to-end latency.
    pub fn finish_message(&self, id: Uuid) -> ChannelResult<()> {
        let mut state = self.live_state()?;
        let entry = state
            .in_flight
            .remove(&id)
            .ok_or(ChannelError::MessageNotInFlight(id))?;
        if let Some(client) = state.client(entry.client_id) {
            client.finished_message();
        }
        self.e2e_latency.record(entry.message.created_at.elapsed());
        Ok(())
    }

    /// Return an in-flight message for redelivery. A zero delay puts it back
    /// in the memory queue, otherwise it is deferred until the delay elapses.
    pub fn requeue_message(&self, id: Uuid, delay: Duration) -> ChannelResult<()> {
        let mut state = self.live_state()?;
        let entry = state
            .in_flight
            .remove(&id)
            .ok_or(ChannelError::MessageNotInFlight(id))?;
        if let Some(client) = state.client(entry.client_id) {
            client.requeued_message();
        }
        state.requeue_count += 1;
        if delay.is_zero() {
            state.memory.push_back(entry.message);
        } else {
            state.deferred.insert(
                id,
                Deferred {
                    message: entry.message,
                    due: Instant::now() + delay,
                },
            );
        }
        Ok(())
    }

    /// Time out deliveries older than `timeout` and queue them again. The
    /// owning client, if still subscribed, is told about each timeout.
    /// Returns the number of messages timed out.
    pub fn process_in_flight(&self, now: Instant, timeout: Duration) -> usize {
        let Ok(mut state) = self.live_state() else {
            return 0;
        };
        let expired: Vec<Uuid> = state
            .in_flight
            .iter()
            .filter(|(_, f)| now.saturating_duration_since(f.delivered_at) >= timeout)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            if let Some(entry) = state.in_flight.remove(id) {
                debug!(
                    topic = %self.topic_name,
                    channel = %self.name,
                    msg_id = %id,
                    client_id = entry.client_id,
                    "message timed out"
                );
                if let Some(client) = state.client(entry.client_id) {
                    client.timed_out_message();
                }
                state.memory.push_back(entry.message);
                state.timeout_count += 1;
            }
        }
        expired.len()
    }

    /// Move deferred messages whose delay has elapsed back to the memory
    /// queue. Returns the number moved.
    pub fn process_deferred(&self, now: Instant) -> usize {
        let Ok(mut state) = self.live_state() else {
            return 0;
        };
        let due: Vec<Uuid> = state
            .deferred
            .iter()
            .filter(|(_, d)| d.due <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &due {
            if let Some(entry) = state.deferred.remove(id) {
                state.memory.push_back(entry.message);
            }
        }
        due.len()
    }

    pub fn pause(&self) -> ChannelResult<()> {
        self.live_state()?.paused = true;
        info!(topic = %self.topic_name, channel = %self.name, "channel paused");
        Ok(())
    }

    pub fn unpause(&self) -> ChannelResult<()> {
        self.live_state()?.paused = false;
        info!(topic = %self.topic_name, channel = %self.name, "channel unpaused");
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.state.read().paused
    }

    /// In-memory queue length.
    pub fn depth(&self) -> i64 {
        depth_of(self.state.read().memory.len())
    }

    pub fn backend_depth(&self) -> i64 {
        self.backend.depth()
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.read().in_flight.len()
    }

    pub fn deferred_count(&self) -> usize {
        self.state.read().deferred.len()
    }

    pub fn message_count(&self) -> u64 {
        self.state.read().message_count
    }
}

impl<A: LatencyAggregator> Named for Channel<A> {
    fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) fn depth_of(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}
