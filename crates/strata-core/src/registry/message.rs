use std::time::Instant;

use uuid::Uuid;

/// A message as tracked by the live registry. Each channel receives its own
/// copy of a topic message, sharing the same id.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub payload: Vec<u8>,
    /// Start of the end-to-end processing latency measurement.
    pub created_at: Instant,
    pub attempts: u16,
}

impl Message {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::now_v7(),
            payload,
            created_at: Instant::now(),
            attempts: 0,
        }
    }
}
