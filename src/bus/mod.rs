//! Event bus - per-session publish/subscribe between server processes
//!
//! A move handled on one process is published on the session's channel;
//! every process holding a subscription for that session hands the event to
//! its fan-out router. Delivery is best-effort and at-most-once. Events of a
//! single session arrive in publish order on a given subscription.

mod memory;
mod redis;

pub use self::redis::RedisBus;
pub use memory::MemoryBus;

use crate::protocol::{self, BusEvent};
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use thiserror::Error;

/// Continuous stream of events for one session, open until dropped
pub type EventStream = BoxStream<'static, BusEvent>;

/// Bus errors
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Event bus unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to encode event: {0}")]
    Encode(#[from] protocol::ProtocolError),
}

impl From<::redis::RedisError> for BusError {
    fn from(err: ::redis::RedisError) -> Self {
        BusError::Unavailable(err.to_string())
    }
}

/// Cross-process publish/subscribe transport
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event on its session's channel
    async fn publish(&self, event: &BusEvent) -> Result<(), BusError>;

    /// Open a new subscription to one session's channel
    async fn subscribe(&self, session_id: &str) -> Result<EventStream, BusError>;
}

/// Channel name for a session
pub fn channel_name(prefix: &str, session_id: &str) -> String {
    format!("{}{}", prefix, session_id)
}

/// Turn a stream of raw payloads into decoded events, skipping bad ones
pub(crate) fn decode_stream<S>(session_id: String, raw: S) -> EventStream
where
    S: futures_util::Stream<Item = Vec<u8>> + Send + 'static,
{
    raw.filter_map(move |bytes| {
        let decoded = match protocol::deserialize::<BusEvent>(&bytes) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!("Dropping undecodable event on session {}: {}", session_id, e);
                None
            }
        };
        futures_util::future::ready(decoded)
    })
    .boxed()
}
