//! Stats snapshot traversal.
//!
//! Read locks are taken top-down and each is held while everything beneath
//! it is collected: the daemon lock for the whole call, a topic lock while
//! that topic's channels are built, a channel lock while that channel's
//! fields and client references are copied. The result is level-wise
//! consistent: every record reflects the instant its own lock was held, but
//! sibling and parent records may reflect slightly different instants.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, warn};

use crate::error::{SnapshotError, SnapshotResult};
use crate::latency::{LatencyAggregator, LatencyStream};
use crate::ordering;
use crate::registry::{depth_of, Channel, Client, Daemon, Topic};
use crate::stats::{ChannelStats, TopicStats};

/// How a snapshot waits for each read lock on its path.
trait LockWait {
    type Error;

    fn read<'a, T>(
        &self,
        lock: &'a RwLock<T>,
        scope: impl FnOnce() -> String,
    ) -> Result<RwLockReadGuard<'a, T>, Self::Error>;
}

/// Wait as long as it takes. Cannot fail.
#[derive(Debug, Clone, Copy)]
struct Blocking;

impl LockWait for Blocking {
    type Error = Infallible;

    fn read<'a, T>(
        &self,
        lock: &'a RwLock<T>,
        _scope: impl FnOnce() -> String,
    ) -> Result<RwLockReadGuard<'a, T>, Infallible> {
        Ok(lock.read())
    }
}

/// Point after which a snapshot stops waiting for locks.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }
}

impl LockWait for Deadline {
    type Error = SnapshotError;

    fn read<'a, T>(
        &self,
        lock: &'a RwLock<T>,
        scope: impl FnOnce() -> String,
    ) -> SnapshotResult<RwLockReadGuard<'a, T>> {
        lock.try_read_until(self.at)
            .ok_or_else(|| SnapshotError::Unavailable {
                scope: scope(),
                waited: self.timeout,
            })
    }
}

impl<A: LatencyAggregator> Daemon<A> {
    /// Snapshot every topic, channel and client, ordered by topic name then
    /// channel name; clients keep connection order. Blocks while a writer
    /// holds any lock on the path.
    #[tracing::instrument(skip_all)]
    pub fn get_stats(&self) -> Vec<TopicStats> {
        let started = Instant::now();
        let topics = match self.collect(&Blocking) {
            Ok(topics) => topics,
            Err(never) => match never {},
        };
        self.record_taken(&topics, started.elapsed());
        topics
    }

    /// Like [`get_stats`](Self::get_stats), but gives up once `timeout` has
    /// elapsed without a required lock being granted. A timed-out snapshot
    /// is discarded as a whole.
    #[tracing::instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64))]
    pub fn try_get_stats(&self, timeout: Duration) -> SnapshotResult<Vec<TopicStats>> {
        let started = Instant::now();
        match self.collect(&Deadline::after(timeout)) {
            Ok(topics) => {
                self.record_taken(&topics, started.elapsed());
                Ok(topics)
            }
            Err(e) => {
                self.metrics.record_unavailable();
                warn!(error = %e, "stats snapshot abandoned");
                Err(e)
            }
        }
    }

    /// Snapshot using the configured lock timeout, if any.
    pub fn snapshot(&self) -> SnapshotResult<Vec<TopicStats>> {
        match self.config.snapshot.lock_timeout() {
            Some(timeout) => self.try_get_stats(timeout),
            None => Ok(self.get_stats()),
        }
    }

    fn record_taken(&self, topics: &[TopicStats], elapsed: Duration) {
        self.metrics.record_snapshot(topics, elapsed);
        debug!(
            topics = topics.len(),
            channels = topics.iter().map(|t| t.channels.len()).sum::<usize>(),
            elapsed_us = elapsed.as_micros() as u64,
            "stats snapshot"
        );
    }

    fn collect<W: LockWait>(&self, wait: &W) -> Result<Vec<TopicStats>, W::Error> {
        let topics = wait.read(&self.topics, || "daemon".to_string())?;
        let ordered = ordering::sorted_by_name(topics.values());

        let mut stats = Vec::with_capacity(ordered.len());
        for topic in &ordered {
            stats.push(topic_stats(topic, wait)?);
        }
        drop(topics);
        Ok(stats)
    }
}

/// Build one topic's record under its read lock. Also valid for a topic that
/// has already been removed from the daemon.
///
/// Channel and topic latency are computed as of one instant, taken before
/// any channel lock, so the topic count is the sum of the channel counts
/// unless a stream evicts or expires samples during the walk.
fn topic_stats<A: LatencyAggregator, W: LockWait>(
    topic: &Topic<A>,
    wait: &W,
) -> Result<TopicStats, W::Error> {
    let state = wait.read(&topic.state, || format!("topic {}", topic.name()))?;
    let channels = ordering::sorted_by_name(state.channels.values());
    let now = Instant::now();

    let mut records = Vec::with_capacity(channels.len());
    for channel in &channels {
        records.push(channel_stats(channel, wait, now)?);
    }

    let streams: Vec<&A::Stream> = channels.iter().map(|c| &c.e2e_latency).collect();
    let e2e_processing_latency = topic.aggregator.aggregate_at(&streams, now);

    Ok(TopicStats {
        name: topic.name().to_string(),
        channels: records,
        depth: depth_of(state.memory.len()),
        backend_depth: topic.backend_depth(),
        message_count: state.message_count,
        e2e_processing_latency,
    })
}

/// Build one channel's record. Counters are read under the channel's read
/// lock; client stats are gathered after it is released.
fn channel_stats<A: LatencyAggregator, W: LockWait>(
    channel: &Channel<A>,
    wait: &W,
    now: Instant,
) -> Result<ChannelStats, W::Error> {
    let (mut stats, clients) = {
        let state = wait.read(&channel.state, || {
            format!("channel {}/{}", channel.topic_name(), channel.name())
        })?;
        let clients: Vec<Arc<dyn Client>> = state.clients.clone();
        let stats = ChannelStats {
            name: channel.name().to_string(),
            depth: depth_of(state.memory.len()),
            backend_depth: channel.backend_depth(),
            in_flight_count: state.in_flight.len(),
            deferred_count: state.deferred.len(),
            message_count: state.message_count,
            requeue_count: state.requeue_count,
            timeout_count: state.timeout_count,
            clients: Vec::with_capacity(clients.len()),
            paused: state.paused,
            e2e_processing_latency: channel.e2e_latency.percentile_result_at(now),
        };
        (stats, clients)
    };

    stats.clients.extend(clients.iter().map(|c| c.stats()));
    Ok(stats)
}

#[cfg(test)]
mod tests;
