use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// Top-level stats configuration, deserializable from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub snapshot: SnapshotConfig,
    pub latency: LatencyConfig,
}

/// Snapshot traversal configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Upper bound on the time a snapshot may spend waiting for read locks.
    /// `None` means snapshots block until every lock is granted.
    pub lock_timeout_ms: Option<u64>,
}

/// End-to-end processing latency sampling configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Quantiles reported for every channel and topic. An empty list turns
    /// latency tracking off.
    pub percentiles: Vec<f64>,
    /// Samples older than this are dropped from every stream.
    pub window_ms: u64,
    /// Per-channel sample capacity; the oldest sample is evicted first.
    pub max_samples: usize,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            percentiles: vec![0.5, 0.9, 0.99],
            window_ms: 600_000,
            max_samples: 10_000,
        }
    }
}

impl SnapshotConfig {
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}

impl LatencyConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl StatsConfig {
    /// Read, parse and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate a TOML document. Missing sections keep their defaults.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(q) = self
            .latency
            .percentiles
            .iter()
            .find(|q| !q.is_finite() || **q <= 0.0 || **q > 1.0)
        {
            return Err(ConfigError::InvalidValue(format!(
                "latency percentile must be in (0, 1], got: {q}"
            )));
        }
        if self.latency.max_samples == 0 {
            return Err(ConfigError::InvalidValue(
                "latency max_samples must be > 0".into(),
            ));
        }
        if self.latency.window_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "latency window_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}
