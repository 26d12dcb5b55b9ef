use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{RegistryError, RegistryResult};
use crate::latency::{LatencyAggregator, QuantileAggregator};
use crate::ordering::{self, Named};
use crate::registry::backend::{BackendProvider, BackendQueue};
use crate::registry::channel::{depth_of, Channel};
use crate::registry::message::Message;

/// Everything guarded by the topic lock.
pub(crate) struct TopicState<A: LatencyAggregator> {
    pub(crate) channels: HashMap<String, Arc<Channel<A>>>,
    /// Messages published before the first channel existed.
    pub(crate) memory: VecDeque<Message>,
    pub(crate) message_count: u64,
}

/// A named message stream fanned out to its channels.
pub struct Topic<A: LatencyAggregator = QuantileAggregator> {
    name: String,
    backend: Arc<dyn BackendQueue>,
    backends: Arc<dyn BackendProvider>,
    pub(crate) aggregator: Arc<A>,
    pub(crate) state: RwLock<TopicState<A>>,
    deleted: AtomicBool,
}

impl<A: LatencyAggregator> Topic<A> {
    pub(crate) fn new(name: &str, backends: Arc<dyn BackendProvider>, aggregator: Arc<A>) -> Self {
        Self {
            name: name.to_string(),
            backend: backends.topic_backend(name),
            backends,
            aggregator,
            state: RwLock::new(TopicState {
                channels: HashMap::new(),
                memory: VecDeque::new(),
                message_count: 0,
            }),
            deleted: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Look up a channel, creating it if needed. Messages that were waiting
    /// in the topic for a first channel are moved into it.
    pub fn get_or_create_channel(&self, name: &str) -> RegistryResult<Arc<Channel<A>>> {
        if let Some(channel) = self.state.read().channels.get(name) {
            return Ok(Arc::clone(channel));
        }

        let mut state = self.state.write();
        if self.is_deleted() {
            return Err(RegistryError::TopicDeleted(self.name.clone()));
        }
        if let Some(channel) = state.channels.get(name) {
            return Ok(Arc::clone(channel));
        }

        let channel = Arc::new(Channel::new(
            &self.name,
            name,
            self.backends.channel_backend(&self.name, name),
            self.aggregator.new_stream(),
        ));
        if state.channels.is_empty() {
            let waiting = state.memory.len();
            for message in state.memory.drain(..) {
                channel.put_message(message)?;
            }
            if waiting > 0 {
                debug!(topic = %self.name, channel = %name, waiting, "flushed topic queue to first channel");
            }
        }
        state.channels.insert(name.to_string(), Arc::clone(&channel));
        info!(topic = %self.name, channel = %name, "channel created");
        Ok(channel)
    }

    pub fn get_channel(&self, name: &str) -> Option<Arc<Channel<A>>> {
        self.state.read().channels.get(name).cloned()
    }

    /// Remove a channel. The channel is marked deleted after the topic lock
    /// is released.
    pub fn delete_channel(&self, name: &str) -> RegistryResult<()> {
        let channel = self
            .state
            .write()
            .channels
            .remove(name)
            .ok_or_else(|| RegistryError::ChannelNotFound(name.to_string()))?;
        channel.mark_deleted();
        Ok(())
    }

    /// Sorted copy of the channel names.
    pub fn channel_names(&self) -> Vec<String> {
        let state = self.state.read();
        ordering::sorted_by_name(state.channels.values())
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Publish a message: counts it and gives every channel its own copy.
    /// Takes the topic write lock, then each channel's write lock in turn.
    pub fn put_message(&self, message: Message) -> RegistryResult<()> {
        let mut state = self.state.write();
        if self.is_deleted() {
            return Err(RegistryError::TopicDeleted(self.name.clone()));
        }
        state.message_count += 1;
        if state.channels.is_empty() {
            state.memory.push_back(message);
            return Ok(());
        }
        for channel in state.channels.values() {
            channel.put_message(message.clone())?;
        }
        Ok(())
    }

    pub(crate) fn mark_deleted(&self) {
        let state = self.state.write();
        self.deleted.store(true, Ordering::Release);
        for channel in state.channels.values() {
            channel.mark_deleted();
        }
        info!(topic = %self.name, channels = state.channels.len(), "topic deleted");
    }

    /// In-memory queue length.
    pub fn depth(&self) -> i64 {
        depth_of(self.state.read().memory.len())
    }

    pub fn backend_depth(&self) -> i64 {
        self.backend.depth()
    }

    pub fn message_count(&self) -> u64 {
        self.state.read().message_count
    }

    pub fn channel_count(&self) -> usize {
        self.state.read().channels.len()
    }
}

impl<A: LatencyAggregator> Named for Topic<A> {
    fn name(&self) -> &str {
        &self.name
    }
}
