//! In-process bus built on tokio broadcast channels
//!
//! Several server instances in one process (tests, single-node deployments)
//! can share one `MemoryBus` to behave like processes sharing a Redis.

use super::{decode_stream, BusError, EventBus, EventStream};
use crate::protocol::{self, BusEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{broadcast, Mutex};

/// Per-channel buffer; a subscriber lagging further than this skips ahead
const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
pub struct MemoryBus {
    channels: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live subscriptions on a session's channel, across all subscribers
    pub async fn subscriber_count(&self, session_id: &str) -> usize {
        self.channels
            .lock()
            .await
            .get(session_id)
            .map_or(0, |tx| tx.receiver_count())
    }

    /// Channels currently held, live or not yet pruned
    pub async fn channel_count(&self) -> usize {
        self.channels.lock().await.len()
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, event: &BusEvent) -> Result<(), BusError> {
        let bytes = protocol::serialize(event)?;
        let mut channels = self.channels.lock().await;
        if let Some(tx) = channels.get(&event.session_id) {
            // No receivers is not an error: nobody is listening anymore
            if tx.send(bytes).is_err() {
                channels.remove(&event.session_id);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, session_id: &str) -> Result<EventStream, BusError> {
        let rx = {
            let mut channels = self.channels.lock().await;
            channels.retain(|_, tx| tx.receiver_count() > 0);
            channels
                .entry(session_id.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe()
        };

        let session = session_id.to_string();
        let raw = futures_util::stream::unfold(rx, move |mut rx| {
            let session = session.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(bytes) => return Some((bytes, rx)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                "Subscriber on session {} lagged, skipped {} events",
                                session,
                                skipped
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(decode_stream(session_id.to_string(), raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MessageType, SignalPayload};

    fn signal(session: &str) -> BusEvent {
        BusEvent::new(
            MessageType::Signal,
            session,
            None,
            &SignalPayload {
                message: "hi".to_string(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_abandoned_channel_pruned_on_publish() {
        let bus = MemoryBus::new();
        let stream = bus.subscribe("g1").await.unwrap();
        assert_eq!(bus.channel_count().await, 1);

        drop(stream);
        bus.publish(&signal("g1")).await.unwrap();
        assert_eq!(bus.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_abandoned_channels_pruned_on_subscribe() {
        let bus = MemoryBus::new();
        for session in ["g1", "g2", "g3"] {
            drop(bus.subscribe(session).await.unwrap());
        }
        assert_eq!(bus.channel_count().await, 1);

        let _live = bus.subscribe("g4").await.unwrap();
        let _other = bus.subscribe("g5").await.unwrap();
        assert_eq!(bus.channel_count().await, 2);
        assert_eq!(bus.subscriber_count("g4").await, 1);
    }
}
