//! Session lifecycle - creating sessions and seating players

use crate::clock::TimeControl;
use crate::rules::RulesEngine;
use crate::store::{Member, RecordUpdate, SessionRecord, Side, StateStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session '{0}' already has two players")]
    Full(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of creating a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedSession {
    pub session_id: String,
    pub creator_side: Side,
    pub invitee_side: Side,
    pub time_control: String,
}

/// Summary of a session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub members: Vec<Member>,
    pub position: String,
    pub white_time_ms: u64,
    pub black_time_ms: u64,
    pub started: bool,
    pub ended: bool,
}

impl From<&SessionRecord> for SessionInfo {
    fn from(record: &SessionRecord) -> Self {
        Self {
            session_id: record.session_id.clone(),
            members: record.members.clone(),
            position: record.position.clone(),
            white_time_ms: record.white_time_ms,
            black_time_ms: record.black_time_ms,
            started: record.last_move_at_ms.is_some(),
            ended: record.ended,
        }
    }
}

/// Creates session records and adds members to them
pub struct SessionManager {
    store: Arc<dyn StateStore>,
    rules: Arc<dyn RulesEngine>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn StateStore>, rules: Arc<dyn RulesEngine>, ttl: Duration) -> Self {
        Self { store, rules, ttl }
    }

    /// Create an empty session at the initial position
    pub async fn create(
        &self,
        creator_side: Side,
        time_control: TimeControl,
    ) -> Result<CreatedSession, SessionError> {
        let session_id = Uuid::new_v4().to_string();
        let record = SessionRecord::new(
            session_id.clone(),
            self.rules.initial_position(),
            time_control.as_str(),
        );
        self.store.set(&session_id, &record, Some(self.ttl)).await?;

        tracing::info!(
            "Created session {} ({}), creator plays {}",
            session_id,
            time_control,
            creator_side
        );

        Ok(CreatedSession {
            session_id,
            creator_side,
            invitee_side: creator_side.opposite(),
            time_control: time_control.as_str().to_string(),
        })
    }

    /// Seat `identity` in the session and return its side.
    ///
    /// Rejoining returns the side already held. The preferred side is used
    /// when free; otherwise the remaining one. When the second player joins,
    /// both clocks are set from the session's time control.
    pub async fn join(
        &self,
        session_id: &str,
        identity: &str,
        preferred: Option<Side>,
    ) -> Result<Side, SessionError> {
        let record = self.store.get(session_id).await?;

        if let Some(side) = record.side_of(identity) {
            return Ok(side);
        }
        if record.is_full() {
            return Err(SessionError::Full(session_id.to_string()));
        }

        let taken = record.members.first().map(|m| m.side);
        let side = match (preferred, taken) {
            (Some(p), Some(t)) if p == t => t.opposite(),
            (Some(p), _) => p,
            (None, Some(t)) => t.opposite(),
            (None, None) => Side::White,
        };

        let mut members = record.members.clone();
        members.push(Member {
            identity: identity.to_string(),
            side,
        });

        let mut update = RecordUpdate::new().members(members);
        if record.members.len() == 1 {
            let initial = TimeControl::parse(&record.time_control).initial_ms();
            update = update.clocks(initial, initial);
        }

        self.store.update(session_id, update).await?;
        tracing::info!("{} joined session {} as {}", identity, session_id, side);
        Ok(side)
    }

    pub async fn info(&self, session_id: &str) -> Result<SessionInfo, SessionError> {
        let record = self.store.get(session_id).await?;
        Ok(SessionInfo::from(&record))
    }
}
