//! Redis pub/sub bus

use super::{channel_name, decode_stream, BusError, EventBus, EventStream};
use crate::protocol::{self, BusEvent};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;

/// Publishes over a shared multiplexed connection; each subscription gets a
/// dedicated connection, as Redis requires for SUBSCRIBE.
#[derive(Clone)]
pub struct RedisBus {
    client: redis::Client,
    conn: MultiplexedConnection,
    channel_prefix: String,
}

impl RedisBus {
    pub async fn connect(url: &str, channel_prefix: impl Into<String>) -> Result<Self, BusError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self {
            client,
            conn,
            channel_prefix: channel_prefix.into(),
        })
    }
}

#[async_trait]
impl EventBus for RedisBus {
    async fn publish(&self, event: &BusEvent) -> Result<(), BusError> {
        let bytes = protocol::serialize(event)?;
        let channel = channel_name(&self.channel_prefix, &event.session_id);
        let mut conn = self.conn.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(&channel)
            .arg(bytes)
            .query_async(&mut conn)
            .await?;
        tracing::debug!(
            "Published {} on {} to {} subscriber(s)",
            event.kind.as_str(),
            channel,
            receivers
        );
        Ok(())
    }

    async fn subscribe(&self, session_id: &str) -> Result<EventStream, BusError> {
        let channel = channel_name(&self.channel_prefix, session_id);
        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.subscribe(&channel).await?;
        tracing::info!("Subscribed to channel {}", channel);

        let raw = pubsub.into_on_message().filter_map(move |msg| {
            let payload = match msg.get_payload::<Vec<u8>>() {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!("Unreadable payload on {}: {}", msg.get_channel_name(), e);
                    None
                }
            };
            futures_util::future::ready(payload)
        });

        Ok(decode_stream(session_id.to_string(), raw))
    }
}
