//! Message types for the tandem wire protocol

use crate::store::Side;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope `type` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Free-form notification (`connected`, ...)
    Signal,

    /// Both players are connected
    StartGame,

    /// First move was made, clocks are running
    StartClock,

    /// A move was applied, or the mover flagged on time
    Move,

    /// Clock snapshot request/response
    TimeSync,

    /// Anything this server does not know; ignored
    #[serde(other)]
    Unknown,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Signal => "signal",
            MessageType::StartGame => "start_game",
            MessageType::StartClock => "start_clock",
            MessageType::Move => "move",
            MessageType::TimeSync => "time_sync",
            MessageType::Unknown => "unknown",
        }
    }
}

/// Every message on a client connection, in both directions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Envelope {
    pub fn new<T: Serialize>(kind: MessageType, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            kind,
            data: serde_json::to_value(payload)?,
        })
    }

    pub fn signal(message: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Signal,
            data: serde_json::json!({ "message": message.into() }),
        }
    }
}

/// Payload of `signal`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPayload {
    pub message: String,
}

/// Inbound `move` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub from_square: String,
    pub to_square: String,

    /// Promotion piece, e.g. `"q"`; defaults to a queen when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

/// Outbound `move` payload: the move plus the state it produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveEventPayload {
    pub from_square: String,
    pub to_square: String,

    /// Position after the move; unchanged on a timeout
    pub board: String,

    pub white_time_ms: u64,
    pub black_time_ms: u64,
    pub ended: bool,
}

/// Payload of `time_sync` and `start_clock`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePayload {
    pub white_time_ms: u64,
    pub black_time_ms: u64,
}

/// Payload of `start_game`.
///
/// Published with an empty colour; the router fills in each recipient's own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGamePayload {
    pub board: String,

    #[serde(default)]
    pub player_color: String,
}

impl StartGamePayload {
    pub fn for_side(board: impl Into<String>, side: Side) -> Self {
        Self {
            board: board.into(),
            player_color: side.as_str().to_string(),
        }
    }
}

/// Event carried on the cross-process bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusEvent {
    #[serde(rename = "type")]
    pub kind: MessageType,

    pub session_id: String,

    /// Identity whose action produced the event; never delivered back to it
    pub originating_identity: Option<String>,

    /// JSON text of the payload, forwarded to clients as `data`
    pub data: String,
}

impl BusEvent {
    pub fn new<T: Serialize>(
        kind: MessageType,
        session_id: impl Into<String>,
        originating_identity: Option<String>,
        payload: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            kind,
            session_id: session_id.into(),
            originating_identity,
            data: serde_json::to_string(payload)?,
        })
    }
}
