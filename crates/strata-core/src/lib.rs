pub mod config;
pub mod error;
pub mod latency;
pub mod metrics;
pub mod ordering;
pub mod registry;
mod snapshot;
pub mod stats;
pub mod telemetry;

pub use config::{LatencyConfig, SnapshotConfig, StatsConfig};
pub use error::{ChannelError, ConfigError, RegistryError, SnapshotError};
pub use latency::{
    LatencyAggregator, LatencyStream, Percentile, PercentileResult, QuantileAggregator,
    SampleStream,
};
pub use metrics::Metrics;
pub use registry::{
    BackendProvider, BackendQueue, Channel, Client, ClientConnection, ClientId, ClientState,
    CountingBackend, Daemon, EmptyBackend, EmptyBackends, Message, Topic,
};
pub use stats::{ChannelStats, ClientStats, TopicStats};
