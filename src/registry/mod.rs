//! Connection registry - which players are attached to this process
//!
//! A [`GameShadow`] is a process-local, non-authoritative cache of the
//! connections attached to one session. The shared store record stays the
//! source of truth; a shadow may be empty or hold only one side.

mod subscriptions;

pub use subscriptions::Subscriptions;

use crate::server::ClientConnection;
use crate::store::Side;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Locally attached players of one session
#[derive(Debug, Clone)]
pub struct GameShadow {
    session_id: String,
    position_hint: String,
    white: Option<ClientConnection>,
    black: Option<ClientConnection>,
    started: bool,
}

impl GameShadow {
    pub fn new(session_id: impl Into<String>, position_hint: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            position_hint: position_hint.into(),
            white: None,
            black: None,
            started: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Position known when the shadow was created; may be stale
    pub fn position_hint(&self) -> &str {
        &self.position_hint
    }

    fn slot_mut(&mut self, side: Side) -> &mut Option<ClientConnection> {
        match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        }
    }

    pub fn slot(&self, side: Side) -> Option<&ClientConnection> {
        match side {
            Side::White => self.white.as_ref(),
            Side::Black => self.black.as_ref(),
        }
    }

    /// Occupy the connection's side. An occupied slot is left alone.
    pub fn attach(&mut self, conn: ClientConnection) -> bool {
        let slot = self.slot_mut(conn.side());
        if slot.is_some() {
            return false;
        }
        *slot = Some(conn);
        true
    }

    /// Free a slot, but only if `conn_id` still holds it
    pub fn detach(&mut self, side: Side, conn_id: Uuid) -> bool {
        let slot = self.slot_mut(side);
        if slot.as_ref().is_some_and(|c| c.id() == conn_id) {
            *slot = None;
            return true;
        }
        false
    }

    pub fn both_sides_present(&self) -> bool {
        self.white.is_some() && self.black.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.white.is_none() && self.black.is_none()
    }

    /// Whether the start signal already fired for this shadow
    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn recipients(&self) -> Vec<ClientConnection> {
        self.white.iter().chain(self.black.iter()).cloned().collect()
    }
}

/// What an attach means for the start-of-game signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartSignal {
    /// Still waiting for the other side, or the attach was a no-op
    None,
    /// Both sides are present for the first time: publish `start_game`
    First,
    /// A side came back to an already started game: resync that side only
    Resync,
}

/// Result of [`GameRegistry::attach`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachOutcome {
    pub attached: bool,
    pub start: StartSignal,
}

/// All shadows of this process, behind one lock.
///
/// Methods return snapshots so that callers never hold the lock while
/// sending to queues or talking to the store.
#[derive(Debug, Default)]
pub struct GameRegistry {
    games: RwLock<HashMap<String, GameShadow>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session's shadow, creating it on first use
    pub async fn get_or_create(&self, session_id: &str, position_hint: &str) -> GameShadow {
        let mut games = self.games.write().await;
        games
            .entry(session_id.to_string())
            .or_insert_with(|| GameShadow::new(session_id, position_hint))
            .clone()
    }

    /// Snapshot of a shadow, if this process has one
    pub async fn get(&self, session_id: &str) -> Option<GameShadow> {
        self.games.read().await.get(session_id).cloned()
    }

    /// Attach a connection to its side of the session.
    ///
    /// The shadow must exist (see [`GameRegistry::get_or_create`]); a
    /// missing one is created with an empty position hint.
    pub async fn attach(&self, session_id: &str, conn: ClientConnection) -> AttachOutcome {
        let mut games = self.games.write().await;
        let shadow = games
            .entry(session_id.to_string())
            .or_insert_with(|| GameShadow::new(session_id, ""));

        let side = conn.side();
        let conn_id = conn.id();
        let attached = shadow.attach(conn);
        if !attached {
            tracing::debug!(
                "Slot {} of session {} already occupied, connection {} not attached",
                side,
                session_id,
                conn_id
            );
        }

        let start = match (attached, shadow.both_sides_present(), shadow.started) {
            (true, true, false) => {
                shadow.started = true;
                StartSignal::First
            }
            (true, true, true) => StartSignal::Resync,
            _ => StartSignal::None,
        };

        AttachOutcome { attached, start }
    }

    /// Free the connection's slot; returns whether it was still attached
    pub async fn detach(&self, session_id: &str, side: Side, conn_id: Uuid) -> bool {
        let mut games = self.games.write().await;
        games
            .get_mut(session_id)
            .is_some_and(|shadow| shadow.detach(side, conn_id))
    }

    pub async fn both_sides_present(&self, session_id: &str) -> bool {
        self.games
            .read()
            .await
            .get(session_id)
            .is_some_and(GameShadow::both_sides_present)
    }

    /// Connections currently attached to a session
    pub async fn recipients(&self, session_id: &str) -> Vec<ClientConnection> {
        self.games
            .read()
            .await
            .get(session_id)
            .map(GameShadow::recipients)
            .unwrap_or_default()
    }

    /// Number of sessions this process has seen
    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.games.read().await.is_empty()
    }

    /// Number of attached connections across all sessions
    pub async fn connection_count(&self) -> usize {
        self.games
            .read()
            .await
            .values()
            .map(|g| g.recipients().len())
            .sum()
    }
}
