//! Game actions: moves, clock snapshots, and the start signal

use super::ServerContext;
use crate::clock::{self, ClockDecision, Clocks};
use crate::protocol::{
    BusEvent, MessageType, MoveEventPayload, MovePayload, StartGamePayload, TimePayload,
};
use crate::rules::MoveRejected;
use crate::store::{RecordUpdate, SessionRecord, Side};
use anyhow::Result;

/// What happened to a move request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Move applied and published
    Applied { first_move: bool, ended: bool },
    /// Mover ran out of time; the session ended without applying the move
    TimedOut,
    /// Rules engine refused the move; nothing published
    Rejected(MoveRejected),
    /// Request did not apply to the session's current state
    Ignored(&'static str),
}

fn clocks_of(record: &SessionRecord) -> Clocks {
    Clocks::new(record.white_time_ms, record.black_time_ms)
}

/// Run one move request from `identity` through clock arbitration and the
/// rules engine, persist the result and publish it.
pub async fn handle_move(
    ctx: &ServerContext,
    session_id: &str,
    identity: &str,
    payload: &MovePayload,
) -> Result<MoveOutcome> {
    let record = ctx.store.get(session_id).await?;

    if record.ended {
        return Ok(MoveOutcome::Ignored("session has ended"));
    }
    if !record.is_full() {
        return Ok(MoveOutcome::Ignored("waiting for the second player"));
    }
    let Some(mover) = record.side_of(identity) else {
        return Ok(MoveOutcome::Ignored("not a member of this session"));
    };

    let to_move = match ctx.rules.side_to_move(&record.position) {
        Ok(side) => side,
        Err(rejected) => return Ok(MoveOutcome::Rejected(rejected)),
    };
    if mover != to_move {
        return Ok(MoveOutcome::Ignored("not this player's turn"));
    }

    // Clock first: a flagged player's move must never reach the board
    let now = ctx.time.now_ms();
    let decision = clock::arbitrate(clocks_of(&record), record.last_move_at_ms, now, mover);

    let (clocks, last_move_at_ms, first_move) = match decision {
        ClockDecision::FirstMove {
            clocks,
            last_move_at_ms,
        } => (clocks, last_move_at_ms, true),
        ClockDecision::Deducted {
            clocks,
            last_move_at_ms,
        } => (clocks, last_move_at_ms, false),
        ClockDecision::Timeout { clocks } => {
            ctx.store
                .update(
                    session_id,
                    RecordUpdate::new()
                        .clocks(clocks.white_ms, clocks.black_ms)
                        .ended(true),
                )
                .await?;
            tracing::info!("{} ({}) lost on time in session {}", identity, mover, session_id);

            let event = BusEvent::new(
                MessageType::Move,
                session_id,
                None,
                &MoveEventPayload {
                    from_square: payload.from_square.clone(),
                    to_square: payload.to_square.clone(),
                    board: record.position.clone(),
                    white_time_ms: clocks.white_ms,
                    black_time_ms: clocks.black_ms,
                    ended: true,
                },
            )?;
            ctx.bus.publish(&event).await?;
            return Ok(MoveOutcome::TimedOut);
        }
    };

    // Legality is checked before anything is written, so a refused move
    // leaves the clocks and `lastMoveAtMs` untouched.
    let position = match ctx.rules.apply_move(
        &record.position,
        &payload.from_square,
        &payload.to_square,
        payload.promotion.as_deref(),
    ) {
        Ok(position) => position,
        Err(rejected) => {
            tracing::info!(
                "Rejected move {}{} by {} in session {}: {}",
                payload.from_square,
                payload.to_square,
                identity,
                session_id,
                rejected
            );
            return Ok(MoveOutcome::Rejected(rejected));
        }
    };

    // The clock result is recorded before the new position is committed
    ctx.store
        .update(
            session_id,
            RecordUpdate::new()
                .clock(mover, clocks.get(mover))
                .last_move_at(last_move_at_ms),
        )
        .await?;

    let ended = ctx.rules.is_terminal(&position);
    ctx.store
        .update(
            session_id,
            RecordUpdate::new().position(position.clone()).ended(ended),
        )
        .await?;

    let event = BusEvent::new(
        MessageType::Move,
        session_id,
        Some(identity.to_string()),
        &MoveEventPayload {
            from_square: payload.from_square.clone(),
            to_square: payload.to_square.clone(),
            board: position,
            white_time_ms: clocks.white_ms,
            black_time_ms: clocks.black_ms,
            ended,
        },
    )?;
    ctx.bus.publish(&event).await?;

    if first_move {
        let event = BusEvent::new(
            MessageType::StartClock,
            session_id,
            None,
            &TimePayload {
                white_time_ms: clocks.white_ms,
                black_time_ms: clocks.black_ms,
            },
        )?;
        ctx.bus.publish(&event).await?;
    }

    if ended {
        tracing::info!("Session {} finished on the board", session_id);
    }
    Ok(MoveOutcome::Applied { first_move, ended })
}

/// Clocks as of now. The running side has its elapsed time subtracted in
/// the report only; nothing is persisted.
pub async fn time_snapshot(ctx: &ServerContext, session_id: &str) -> Result<TimePayload> {
    let record = ctx.store.get(session_id).await?;
    let mut clocks = clocks_of(&record);

    if !record.ended {
        if let Ok(side) = ctx.rules.side_to_move(&record.position) {
            clocks = clock::live_clocks(clocks, record.last_move_at_ms, ctx.time.now_ms(), side);
        }
    }

    Ok(TimePayload {
        white_time_ms: clocks.white_ms,
        black_time_ms: clocks.black_ms,
    })
}

/// Publish the side-neutral start signal for a session
pub async fn announce_start(ctx: &ServerContext, record: &SessionRecord) -> Result<()> {
    let event = BusEvent::new(
        MessageType::StartGame,
        record.session_id.clone(),
        None,
        &StartGamePayload {
            board: record.position.clone(),
            player_color: String::new(),
        },
    )?;
    ctx.bus.publish(&event).await?;
    tracing::info!("Both players present in session {}", record.session_id);
    Ok(())
}

/// Start payload for one side, used to resync a reconnecting player
pub fn start_payload_for(record: &SessionRecord, side: Side) -> StartGamePayload {
    StartGamePayload::for_side(record.position.clone(), side)
}
