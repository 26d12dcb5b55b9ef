use super::*;
use crate::config::StatsConfig;
use crate::latency::PercentileResult;
use crate::registry::{
    BackendProvider, BackendQueue, ClientConnection, ClientId, CountingBackend, Message,
};

mod common;
use common::*;

mod counts;
mod timeout;
