//! Protocol definitions for client connections and the event bus
//!
//! Clients exchange JSON envelopes `{type, data}` over WebSocket text
//! frames. Events between server processes travel as MessagePack.

mod message;

pub use message::{
    BusEvent, Envelope, MessageType, MoveEventPayload, MovePayload, SignalPayload,
    StartGamePayload, TimePayload,
};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol-specific errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Invalid payload for '{kind}': {reason}")]
    InvalidPayload { kind: &'static str, reason: String },

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Encoding failed: {0}")]
    Encode(String),
}

/// Default cap on inbound text frames (64 KiB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Serialize a bus event to MessagePack bytes
pub fn serialize<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    rmp_serde::to_vec_named(msg).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Deserialize a bus event from MessagePack bytes
pub fn deserialize<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, ProtocolError> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| ProtocolError::MalformedMessage(format!("Failed to deserialize: {}", e)))
}

/// Parse an inbound text frame into an envelope
pub fn parse_envelope(text: &str, max_size: usize) -> Result<Envelope, ProtocolError> {
    if text.len() > max_size {
        return Err(ProtocolError::MessageTooLarge {
            size: text.len(),
            max: max_size,
        });
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
}

/// Decode the `data` of an envelope into its typed payload
pub fn parse_payload<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, ProtocolError> {
    serde_json::from_value(envelope.data.clone()).map_err(|e| ProtocolError::InvalidPayload {
        kind: envelope.kind.as_str(),
        reason: e.to_string(),
    })
}

/// Render an envelope as the JSON text sent to a client
pub fn encode_envelope(envelope: &Envelope) -> Result<String, ProtocolError> {
    serde_json::to_string(envelope).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Build a client envelope from a bus event, keeping its JSON payload
pub fn envelope_from_event(event: &BusEvent) -> Result<Envelope, ProtocolError> {
    let data = serde_json::from_str(&event.data).map_err(|e| ProtocolError::InvalidPayload {
        kind: event.kind.as_str(),
        reason: e.to_string(),
    })?;
    Ok(Envelope {
        kind: event.kind,
        data,
    })
}
