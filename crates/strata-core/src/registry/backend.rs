use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Durable queue behind a topic or channel. Only its depth is consumed here.
pub trait BackendQueue: Send + Sync {
    /// Number of messages durably queued.
    fn depth(&self) -> i64;
}

/// Hands out the backend queue for each topic and channel as it is created.
pub trait BackendProvider: Send + Sync {
    fn topic_backend(&self, topic: &str) -> Arc<dyn BackendQueue>;

    fn channel_backend(&self, topic: &str, channel: &str) -> Arc<dyn BackendQueue>;
}

/// Backend for in-memory-only topics and channels. Always empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyBackend;

impl BackendQueue for EmptyBackend {
    fn depth(&self) -> i64 {
        0
    }
}

/// Provider that gives every topic and channel an [`EmptyBackend`].
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyBackends;

impl BackendProvider for EmptyBackends {
    fn topic_backend(&self, _topic: &str) -> Arc<dyn BackendQueue> {
        Arc::new(EmptyBackend)
    }

    fn channel_backend(&self, _topic: &str, _channel: &str) -> Arc<dyn BackendQueue> {
        Arc::new(EmptyBackend)
    }
}

/// Backend whose depth is maintained by the owning durable queue.
#[derive(Debug, Default)]
pub struct CountingBackend {
    depth: AtomicI64,
}

impl CountingBackend {
    pub fn new(depth: i64) -> Self {
        Self {
            depth: AtomicI64::new(depth),
        }
    }

    pub fn set_depth(&self, depth: i64) {
        self.depth.store(depth, Ordering::Relaxed);
    }

    /// Adjust the depth by `delta`, never going below zero.
    pub fn add(&self, delta: i64) {
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_add(delta).max(0))
            });
    }
}

impl BackendQueue for CountingBackend {
    fn depth(&self) -> i64 {
        self.depth.load(Ordering::Relaxed)
    }
}
