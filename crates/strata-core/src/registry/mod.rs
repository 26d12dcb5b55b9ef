//! The live topic → channel → client hierarchy.
//!
//! Each level owns a `parking_lot::RwLock`. Locks are always taken top-down
//! (daemon, then topic, then channel); no mutator takes an ancestor's lock
//! while holding a descendant's. Callers outside the registry only ever see
//! copied-out references, never the live containers.

mod backend;
mod channel;
mod client;
mod message;
mod topic;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::config::StatsConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::latency::{LatencyAggregator, QuantileAggregator};
use crate::metrics::Metrics;
use crate::ordering;

pub use backend::{BackendProvider, BackendQueue, CountingBackend, EmptyBackend, EmptyBackends};
pub use channel::Channel;
pub use client::{Client, ClientConnection, ClientId, ClientState};
pub use message::Message;
pub use topic::Topic;

pub(crate) use channel::depth_of;

/// Root of the registry: the set of topics and the shared collaborators
/// every topic and channel is created with.
pub struct Daemon<A: LatencyAggregator = QuantileAggregator> {
    pub(crate) config: StatsConfig,
    pub(crate) aggregator: Arc<A>,
    backends: Arc<dyn BackendProvider>,
    pub(crate) metrics: Metrics,
    pub(crate) topics: RwLock<HashMap<String, Arc<Topic<A>>>>,
}

impl Daemon<QuantileAggregator> {
    /// Create a daemon whose latency streams follow `config.latency`.
    pub fn new(config: StatsConfig) -> Self {
        let aggregator = QuantileAggregator::from_config(&config.latency);
        Self::with_aggregator(config, aggregator)
    }
}

impl<A: LatencyAggregator> Daemon<A> {
    pub fn with_aggregator(config: StatsConfig, aggregator: A) -> Self {
        Self {
            config,
            aggregator: Arc::new(aggregator),
            backends: Arc::new(EmptyBackends),
            metrics: Metrics::new(),
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Backends for topics and channels created from now on.
    pub fn with_backends(mut self, backends: Arc<dyn BackendProvider>) -> Self {
        self.backends = backends;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    pub fn get_or_create_topic(&self, name: &str) -> Arc<Topic<A>> {
        if let Some(topic) = self.topics.read().get(name) {
            return Arc::clone(topic);
        }

        let mut topics = self.topics.write();
        if let Some(topic) = topics.get(name) {
            return Arc::clone(topic);
        }
        let topic = Arc::new(Topic::new(
            name,
            Arc::clone(&self.backends),
            Arc::clone(&self.aggregator),
        ));
        topics.insert(name.to_string(), Arc::clone(&topic));
        info!(topic = %name, "topic created");
        topic
    }

    pub fn get_topic(&self, name: &str) -> Option<Arc<Topic<A>>> {
        self.topics.read().get(name).cloned()
    }

    /// Remove a topic from the registry, then mark it and its channels
    /// deleted once the daemon lock is released.
    pub fn delete_topic(&self, name: &str) -> RegistryResult<()> {
        let topic = self
            .topics
            .write()
            .remove(name)
            .ok_or_else(|| RegistryError::TopicNotFound(name.to_string()))?;
        topic.mark_deleted();
        Ok(())
    }

    /// Sorted copy of the topic names.
    pub fn topic_names(&self) -> Vec<String> {
        let topics = self.topics.read();
        ordering::sorted_by_name(topics.values())
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }
}
