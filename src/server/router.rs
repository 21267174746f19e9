//! Fan-out of bus events to the players attached to this process

use super::connection::Delivery;
use crate::protocol::{envelope_from_event, BusEvent, Envelope, MessageType, StartGamePayload};
use crate::registry::GameRegistry;
use crate::store::Side;

/// Deliver an event to every local player of its session except the one
/// who caused it. Returns how many messages were queued.
pub async fn forward_event(registry: &GameRegistry, event: &BusEvent) -> usize {
    // Snapshot taken under the registry lock; sending happens after release
    let recipients = registry.recipients(&event.session_id).await;
    if recipients.is_empty() {
        return 0;
    }

    let envelope = match envelope_from_event(event) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Dropping event for session {}: {}", event.session_id, e);
            return 0;
        }
    };

    let mut queued = 0;
    for player in recipients {
        if event.originating_identity.as_deref() == Some(player.identity()) {
            continue;
        }

        let message = personalize(&envelope, player.side());
        if player.try_send(&message) == Delivery::Queued {
            queued += 1;
        }
    }

    tracing::debug!(
        "Forwarded {} for session {} to {} player(s)",
        event.kind.as_str(),
        event.session_id,
        queued
    );
    queued
}

/// Fill in recipient-specific fields; `start_game` carries the recipient's
/// own colour.
pub fn personalize(envelope: &Envelope, side: Side) -> Envelope {
    if envelope.kind != MessageType::StartGame {
        return envelope.clone();
    }

    match serde_json::from_value::<StartGamePayload>(envelope.data.clone()) {
        Ok(payload) => {
            let payload = StartGamePayload::for_side(payload.board, side);
            match Envelope::new(MessageType::StartGame, &payload) {
                Ok(personal) => personal,
                Err(_) => envelope.clone(),
            }
        }
        Err(e) => {
            tracing::warn!("Malformed start_game payload, forwarding as is: {}", e);
            envelope.clone()
        }
    }
}
