use std::time::Duration;

use uuid::Uuid;

use crate::registry::ClientId;

/// Errors returned by a deadline-bounded snapshot.
///
/// A blocking snapshot never fails; only `try_get_stats` can report that a
/// read lock was not granted in time.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// A writer held one of the registry locks past the snapshot deadline.
    /// The whole snapshot is discarded, never returned partially.
    #[error("stats temporarily unavailable: {scope} lock not acquired within {waited:?}")]
    Unavailable { scope: String, waited: Duration },
}

/// Per-channel mutation errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel deleted: {0}")]
    Deleted(String),

    #[error("message not in flight: {0}")]
    MessageNotInFlight(Uuid),

    #[error("client not subscribed: {0}")]
    ClientNotFound(ClientId),
}

/// Daemon and topic level registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("topic not found: {0}")]
    TopicNotFound(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("topic deleted: {0}")]
    TopicDeleted(String),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("error reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidValue(String),
}

pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
