//! Authoritative session record and partial updates

use super::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two fixed roles in a session. White always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Wire form, `"w"` or `"b"`
    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "w",
            Side::Black => "b",
        }
    }

    /// Parse either the wire form or the full colour name
    pub fn parse(value: &str) -> Option<Side> {
        match value.to_ascii_lowercase().as_str() {
            "w" | "white" => Some(Side::White),
            "b" | "black" => Some(Side::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub identity: String,
    pub side: Side,
}

/// Shared record for one session, stored as JSON under the session id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Assigned at creation, never changes
    pub session_id: String,

    /// At most two, unique by identity and by side
    pub members: Vec<Member>,

    /// Opaque game position, only the rules engine interprets it
    pub position: String,

    pub white_time_ms: u64,
    pub black_time_ms: u64,

    /// Unset until the first accepted move
    #[serde(default)]
    pub last_move_at_ms: Option<i64>,

    pub ended: bool,

    /// Time control chosen at creation, e.g. `"5|3"`
    #[serde(default)]
    pub time_control: String,
}

impl SessionRecord {
    /// A fresh record with no members and untouched clocks
    pub fn new(
        session_id: impl Into<String>,
        position: impl Into<String>,
        time_control: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            members: Vec::new(),
            position: position.into(),
            white_time_ms: 0,
            black_time_ms: 0,
            last_move_at_ms: None,
            ended: false,
            time_control: time_control.into(),
        }
    }

    pub fn member(&self, identity: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.identity == identity)
    }

    pub fn side_of(&self, identity: &str) -> Option<Side> {
        self.member(identity).map(|m| m.side)
    }

    pub fn identity_of(&self, side: Side) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.side == side)
            .map(|m| m.identity.as_str())
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= 2
    }

    pub fn clock(&self, side: Side) -> u64 {
        match side {
            Side::White => self.white_time_ms,
            Side::Black => self.black_time_ms,
        }
    }

    /// Merge a partial update into this record.
    ///
    /// Refuses updates that would break the record's invariants: more than
    /// two members, a side or identity held twice, shrinking membership,
    /// mutating position or clocks after the session ended, or moving
    /// `last_move_at_ms` backwards.
    pub fn apply(&mut self, update: RecordUpdate) -> Result<(), StoreError> {
        if let Some(members) = &update.members {
            validate_members(&self.members, members)?;
        }

        let touches_game = update.position.is_some()
            || update.white_time_ms.is_some()
            || update.black_time_ms.is_some()
            || update.last_move_at_ms.is_some();
        if self.ended && touches_game {
            return Err(StoreError::SessionEnded(self.session_id.clone()));
        }

        if let Some(members) = update.members {
            self.members = members;
        }
        if let Some(position) = update.position {
            self.position = position;
        }
        if let Some(ms) = update.white_time_ms {
            self.white_time_ms = ms;
        }
        if let Some(ms) = update.black_time_ms {
            self.black_time_ms = ms;
        }
        if let Some(at) = update.last_move_at_ms {
            self.last_move_at_ms = Some(self.last_move_at_ms.map_or(at, |prev| prev.max(at)));
        }
        if update.ended == Some(true) {
            self.ended = true;
        }

        Ok(())
    }
}

fn validate_members(current: &[Member], next: &[Member]) -> Result<(), StoreError> {
    if next.len() > 2 {
        return Err(StoreError::Invariant(format!(
            "a session holds at most 2 members, got {}",
            next.len()
        )));
    }
    if next.len() == 2 {
        if next[0].identity == next[1].identity {
            return Err(StoreError::Invariant(format!(
                "identity '{}' joined twice",
                next[0].identity
            )));
        }
        if next[0].side == next[1].side {
            return Err(StoreError::Invariant(format!(
                "side '{}' assigned twice",
                next[0].side
            )));
        }
    }
    if current.iter().any(|m| !next.contains(m)) {
        return Err(StoreError::Invariant(
            "members can only be appended".to_string(),
        ));
    }
    Ok(())
}

/// Fields to merge into an existing record; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    pub members: Option<Vec<Member>>,
    pub position: Option<String>,
    pub white_time_ms: Option<u64>,
    pub black_time_ms: Option<u64>,
    pub last_move_at_ms: Option<i64>,
    pub ended: Option<bool>,
}

impl RecordUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(mut self, members: Vec<Member>) -> Self {
        self.members = Some(members);
        self
    }

    pub fn position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn clock(mut self, side: Side, ms: u64) -> Self {
        match side {
            Side::White => self.white_time_ms = Some(ms),
            Side::Black => self.black_time_ms = Some(ms),
        }
        self
    }

    pub fn clocks(self, white_ms: u64, black_ms: u64) -> Self {
        self.clock(Side::White, white_ms).clock(Side::Black, black_ms)
    }

    pub fn last_move_at(mut self, at_ms: i64) -> Self {
        self.last_move_at_ms = Some(at_ms);
        self
    }

    pub fn ended(mut self, ended: bool) -> Self {
        self.ended = Some(ended);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
