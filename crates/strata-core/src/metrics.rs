use std::time::Duration;

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;

use crate::stats::TopicStats;

/// OTel instruments for snapshot activity. Created once per daemon and
/// updated after every snapshot attempt.
pub struct Metrics {
    pub snapshots_taken: Counter<u64>,
    pub snapshots_unavailable: Counter<u64>,
    pub snapshot_duration: Histogram<f64>,
    pub topics: Gauge<u64>,
    pub channels: Gauge<u64>,
    pub clients: Gauge<u64>,
    pub topic_depth: Gauge<i64>,
    pub channel_depth: Gauge<i64>,
    pub channel_in_flight: Gauge<i64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create metrics from the global meter provider. If no meter provider
    /// is configured, the instruments are no-op.
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("strata");
        Self::from_meter(&meter)
    }

    /// Create metrics from a specific meter (used in tests with in-memory exporter).
    pub fn from_meter(meter: &Meter) -> Self {
        Self {
            snapshots_taken: meter
                .u64_counter("strata.snapshots.taken")
                .with_description("Completed stats snapshots")
                .build(),
            snapshots_unavailable: meter
                .u64_counter("strata.snapshots.unavailable")
                .with_description("Snapshots abandoned because a lock was not granted in time")
                .build(),
            snapshot_duration: meter
                .f64_histogram("strata.snapshot.duration")
                .with_description("Time spent collecting a snapshot")
                .with_unit("s")
                .build(),
            topics: meter
                .u64_gauge("strata.topics")
                .with_description("Topics seen by the last snapshot")
                .build(),
            channels: meter
                .u64_gauge("strata.channels")
                .with_description("Channels seen by the last snapshot")
                .build(),
            clients: meter
                .u64_gauge("strata.clients")
                .with_description("Clients seen by the last snapshot")
                .build(),
            topic_depth: meter
                .i64_gauge("strata.topic.depth")
                .with_description("In-memory topic depth")
                .build(),
            channel_depth: meter
                .i64_gauge("strata.channel.depth")
                .with_description("In-memory channel depth")
                .build(),
            channel_in_flight: meter
                .i64_gauge("strata.channel.in_flight")
                .with_description("Messages delivered and not yet acknowledged")
                .build(),
        }
    }

    /// Record a completed snapshot and the per-topic/per-channel gauges it
    /// observed.
    pub fn record_snapshot(&self, topics: &[TopicStats], elapsed: Duration) {
        self.snapshots_taken.add(1, &[]);
        self.snapshot_duration.record(elapsed.as_secs_f64(), &[]);

        let mut channels = 0u64;
        let mut clients = 0u64;
        for topic in topics {
            self.topic_depth
                .record(topic.depth, &[KeyValue::new("topic", topic.name.clone())]);
            for channel in &topic.channels {
                channels += 1;
                clients += channel.clients.len() as u64;
                let attrs = [
                    KeyValue::new("topic", topic.name.clone()),
                    KeyValue::new("channel", channel.name.clone()),
                ];
                self.channel_depth.record(channel.depth, &attrs);
                self.channel_in_flight.record(
                    i64::try_from(channel.in_flight_count).unwrap_or(i64::MAX),
                    &attrs,
                );
            }
        }
        self.topics.record(topics.len() as u64, &[]);
        self.channels.record(channels, &[]);
        self.clients.record(clients, &[]);
    }

    pub fn record_unavailable(&self) {
        self.snapshots_unavailable.add(1, &[]);
    }
}
