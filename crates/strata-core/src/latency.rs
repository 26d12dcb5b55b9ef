//! End-to-end processing latency sampling.
//!
//! Each channel owns one [`LatencyStream`]. Topic-level results are produced
//! by a [`LatencyAggregator`], which merges the raw populations of its
//! channels' streams and computes percentiles once over the union. Averaging
//! per-channel percentiles would not yield a percentile of anything.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::LatencyConfig;

/// A single computed quantile. `value` is in nanoseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Percentile {
    pub quantile: f64,
    pub value: u64,
}

/// Percentiles computed over one sample population.
///
/// The empty result (`count == 0`, no percentiles) is returned whenever the
/// population has no samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PercentileResult {
    pub count: u64,
    pub percentiles: Vec<Percentile>,
}

impl PercentileResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Value recorded for `quantile`, if it was computed.
    pub fn value_at(&self, quantile: f64) -> Option<u64> {
        self.percentiles
            .iter()
            .find(|p| p.quantile == quantile)
            .map(|p| p.value)
    }

    /// Nearest-rank percentiles over an unsorted sample population.
    pub fn from_samples(quantiles: &[f64], mut samples: Vec<u64>) -> Self {
        if samples.is_empty() || quantiles.is_empty() {
            return Self::empty();
        }
        samples.sort_unstable();
        let n = samples.len();
        let percentiles = quantiles
            .iter()
            .map(|&quantile| {
                let rank = (quantile * n as f64).ceil() as usize;
                Percentile {
                    quantile,
                    value: samples[rank.clamp(1, n) - 1],
                }
            })
            .collect();
        Self {
            count: n as u64,
            percentiles,
        }
    }
}

/// A per-channel latency sample stream.
pub trait LatencyStream: Send + Sync {
    fn record(&self, latency: Duration);

    /// Percentiles over this stream's own samples as of `now`. Samples
    /// recorded after `now` are not included.
    fn percentile_result_at(&self, now: Instant) -> PercentileResult;

    fn percentile_result(&self) -> PercentileResult {
        self.percentile_result_at(Instant::now())
    }
}

/// Creates per-channel streams and merges them into topic-level results.
///
/// Swapping the implementation (histogram buckets, t-digest, ...) does not
/// touch snapshot traversal.
pub trait LatencyAggregator: Send + Sync + 'static {
    type Stream: LatencyStream;

    fn new_stream(&self) -> Self::Stream;

    /// Percentiles over the union of the raw samples held by `streams` as
    /// of `now`. Returns the empty result when no stream holds a sample.
    ///
    /// Given the same `now`, the result's count equals the sum of the
    /// streams' own `percentile_result_at(now)` counts, unless a stream
    /// evicted or expired samples in between.
    fn aggregate_at(&self, streams: &[&Self::Stream], now: Instant) -> PercentileResult;

    fn aggregate(&self, streams: &[&Self::Stream]) -> PercentileResult {
        self.aggregate_at(streams, Instant::now())
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    nanos: u64,
}

/// Bounded, time-windowed raw sample buffer.
pub struct SampleStream {
    quantiles: Arc<[f64]>,
    window: Duration,
    capacity: usize,
    samples: Mutex<VecDeque<Sample>>,
}

impl SampleStream {
    fn new(quantiles: Arc<[f64]>, window: Duration, capacity: usize) -> Self {
        Self {
            quantiles,
            window,
            capacity,
            samples: Mutex::new(VecDeque::new()),
        }
    }

    fn prune(&self, samples: &mut VecDeque<Sample>, now: Instant) {
        while let Some(front) = samples.front() {
            if now.saturating_duration_since(front.at) <= self.window {
                break;
            }
            samples.pop_front();
        }
    }

    /// Record a sample taken at `now`. Samples stay ordered by time even
    /// when callers pass timestamps out of order.
    pub(crate) fn record_at(&self, latency: Duration, now: Instant) {
        if self.quantiles.is_empty() {
            return;
        }
        let mut samples = self.samples.lock();
        self.insert(&mut samples, latency, now);
    }

    fn insert(&self, samples: &mut VecDeque<Sample>, latency: Duration, now: Instant) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.prune(samples, now);
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        let idx = samples.partition_point(|s| s.at <= now);
        samples.insert(idx, Sample { at: now, nanos });
    }

    /// Raw samples inside the window at `now`, excluding later ones.
    fn live_samples(&self, now: Instant) -> Vec<u64> {
        let mut samples = self.samples.lock();
        self.prune(&mut samples, now);
        samples
            .iter()
            .take_while(|s| s.at <= now)
            .map(|s| s.nanos)
            .collect()
    }

    /// Number of retained samples, including any not yet pruned.
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LatencyStream for SampleStream {
    fn record(&self, latency: Duration) {
        if self.quantiles.is_empty() {
            return;
        }
        let mut samples = self.samples.lock();
        // Read the clock under the lock so concurrent recorders append in order
        self.insert(&mut samples, latency, Instant::now());
    }

    fn percentile_result_at(&self, now: Instant) -> PercentileResult {
        PercentileResult::from_samples(&self.quantiles, self.live_samples(now))
    }
}

/// Default aggregator: exact nearest-rank quantiles over windowed raw samples.
#[derive(Debug, Clone)]
pub struct QuantileAggregator {
    quantiles: Arc<[f64]>,
    window: Duration,
    max_samples: usize,
}

impl QuantileAggregator {
    pub fn new(quantiles: Vec<f64>, window: Duration, max_samples: usize) -> Self {
        Self {
            quantiles: quantiles.into(),
            window,
            max_samples: max_samples.max(1),
        }
    }

    pub fn from_config(config: &LatencyConfig) -> Self {
        Self::new(config.percentiles.clone(), config.window(), config.max_samples)
    }

    pub fn quantiles(&self) -> &[f64] {
        &self.quantiles
    }
}

impl Default for QuantileAggregator {
    fn default() -> Self {
        Self::from_config(&LatencyConfig::default())
    }
}

impl LatencyAggregator for QuantileAggregator {
    type Stream = SampleStream;

    fn new_stream(&self) -> SampleStream {
        SampleStream::new(self.quantiles.clone(), self.window, self.max_samples)
    }

    fn aggregate_at(&self, streams: &[&SampleStream], now: Instant) -> PercentileResult {
        let mut merged = Vec::new();
        for stream in streams {
            merged.extend(stream.live_samples(now));
        }
        PercentileResult::from_samples(&self.quantiles, merged)
    }
}
