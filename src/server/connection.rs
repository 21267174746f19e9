//! Client connection handling

use crate::protocol::{encode_envelope, Envelope, ProtocolError};
use crate::store::Side;
use futures_util::{Sink, SinkExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

/// Process-wide delivery counters
#[derive(Debug, Default)]
pub struct DeliveryStats {
    queued: AtomicU64,
    dropped: AtomicU64,
    unencodable: AtomicU64,
}

impl DeliveryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Messages discarded because a connection's queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Messages that never reached a queue because they failed to encode
    pub fn unencodable(&self) -> u64 {
        self.unencodable.load(Ordering::Relaxed)
    }
}

/// Result of a non-blocking enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue full; the message was discarded and counted
    Dropped,
    /// Writer is gone; the connection is closing
    Closed,
    /// Encoding failed; nothing was queued and the connection is unaffected
    Unencodable,
}

/// Handle to one attached player. Cloning shares the same outbound queue.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    id: Uuid,
    identity: String,
    side: Side,
    sender: mpsc::Sender<String>,
    dropped: Arc<AtomicU64>,
    stats: Arc<DeliveryStats>,
}

impl ClientConnection {
    pub fn new(
        identity: impl Into<String>,
        side: Side,
        sender: mpsc::Sender<String>,
        stats: Arc<DeliveryStats>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.into(),
            side,
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
            stats,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Messages dropped for this connection so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Enqueue already-encoded text without waiting
    pub fn try_send_text(&self, text: String) -> Delivery {
        match self.sender.try_send(text) {
            Ok(()) => {
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
                Delivery::Queued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Outbound queue full for {} ({}), dropped message ({} so far)",
                    self.identity,
                    self.id,
                    total
                );
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Connection {} already closed", self.id);
                Delivery::Closed
            }
        }
    }

    /// Encode and enqueue an envelope without waiting
    pub fn try_send(&self, envelope: &Envelope) -> Delivery {
        self.deliver(envelope.kind.as_str(), encode_envelope(envelope))
    }

    fn deliver(&self, kind: &str, encoded: Result<String, ProtocolError>) -> Delivery {
        match encoded {
            Ok(text) => self.try_send_text(text),
            Err(e) => {
                self.stats.unencodable.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Failed to encode {} for {}: {}", kind, self.id, e);
                Delivery::Unencodable
            }
        }
    }
}

/// Sole writer of a connection: drains the queue in order until it closes
/// or the transport fails.
pub async fn client_writer_task<W>(mut writer: W, mut receiver: mpsc::Receiver<String>)
where
    W: Sink<Message> + Unpin,
    W::Error: std::fmt::Display,
{
    while let Some(text) = receiver.recv().await {
        if let Err(e) = writer.send(Message::Text(text)).await {
            tracing::error!("Failed to write message to client: {}", e);
            break;
        }
    }

    let _ = writer.close().await;
    tracing::debug!("Client writer task finished");
}

/// Session id from an upgrade path such as `/ws/game/<id>`
pub fn session_id_from_path(path: &str, prefix: &str) -> Option<String> {
    let path = path.split('?').next().unwrap_or(path);
    let id = path.strip_prefix(prefix)?.trim_end_matches('/');
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id.to_string())
}

/// Value of the named cookie in a `Cookie` header
pub fn identity_from_cookies(header: &str, cookie_name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}
