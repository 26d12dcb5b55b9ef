use serde::Serialize;

use crate::latency::PercentileResult;

/// Point-in-time stats for a single topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicStats {
    #[serde(rename = "topic_name")]
    pub name: String,
    pub channels: Vec<ChannelStats>,
    pub depth: i64,
    pub backend_depth: i64,
    pub message_count: u64,
    /// Merged over the raw samples of every channel in the topic, as of the
    /// same instant the channel records were computed.
    pub e2e_processing_latency: PercentileResult,
}

/// Point-in-time stats for a single channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStats {
    #[serde(rename = "channel_name")]
    pub name: String,
    pub depth: i64,
    pub backend_depth: i64,
    pub in_flight_count: usize,
    pub deferred_count: usize,
    pub message_count: u64,
    pub requeue_count: u64,
    pub timeout_count: u64,
    /// Connection order, not sorted.
    pub clients: Vec<ClientStats>,
    pub paused: bool,
    pub e2e_processing_latency: PercentileResult,
}

/// Stats reported by a connected client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientStats {
    pub version: String,
    pub remote_address: String,
    pub name: String,
    pub state: i32,
    pub ready_count: i64,
    pub in_flight_count: i64,
    pub message_count: u64,
    pub finish_count: u64,
    pub requeue_count: u64,
    /// Unix seconds.
    #[serde(rename = "connect_ts")]
    pub connect_time: i64,
}
