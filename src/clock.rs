//! Clock arbitration - decides per move whether time is deducted or the
//! mover has flagged

use crate::store::Side;
use std::sync::atomic::{AtomicI64, Ordering};

/// Remaining time per side, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clocks {
    pub white_ms: u64,
    pub black_ms: u64,
}

impl Clocks {
    pub fn new(white_ms: u64, black_ms: u64) -> Self {
        Self { white_ms, black_ms }
    }

    pub fn get(&self, side: Side) -> u64 {
        match side {
            Side::White => self.white_ms,
            Side::Black => self.black_ms,
        }
    }

    pub fn set(&mut self, side: Side, ms: u64) {
        match side {
            Side::White => self.white_ms = ms,
            Side::Black => self.black_ms = ms,
        }
    }
}

/// Outcome of arbitrating one move attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDecision {
    /// No move yet: nothing deducted, the clock starts now
    FirstMove { clocks: Clocks, last_move_at_ms: i64 },

    /// Elapsed time deducted from the mover
    Deducted { clocks: Clocks, last_move_at_ms: i64 },

    /// The mover ran out of time; their clock is clamped to zero
    Timeout { clocks: Clocks },
}

impl ClockDecision {
    pub fn clocks(&self) -> Clocks {
        match self {
            ClockDecision::FirstMove { clocks, .. }
            | ClockDecision::Deducted { clocks, .. }
            | ClockDecision::Timeout { clocks } => *clocks,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClockDecision::Timeout { .. })
    }
}

/// Decide what a move attempt at `now_ms` does to the clocks.
///
/// The first move never spends clock time. Afterwards the time since the
/// last accepted move is charged to `side_to_move`; a charge larger than the
/// remaining budget is a loss on time. A wall clock that went backwards
/// counts as zero elapsed.
pub fn arbitrate(
    clocks: Clocks,
    last_move_at_ms: Option<i64>,
    now_ms: i64,
    side_to_move: Side,
) -> ClockDecision {
    let Some(last) = last_move_at_ms else {
        return ClockDecision::FirstMove {
            clocks,
            last_move_at_ms: now_ms,
        };
    };

    let elapsed = u64::try_from(now_ms.saturating_sub(last)).unwrap_or(0);
    let remaining = clocks.get(side_to_move);
    let mut next = clocks;

    if elapsed > remaining {
        next.set(side_to_move, 0);
        return ClockDecision::Timeout { clocks: next };
    }

    next.set(side_to_move, remaining - elapsed);
    ClockDecision::Deducted {
        clocks: next,
        last_move_at_ms: now_ms.max(last),
    }
}

/// Clocks as a client should see them at `now_ms`, without persisting:
/// the side to move has the running time subtracted.
pub fn live_clocks(
    clocks: Clocks,
    last_move_at_ms: Option<i64>,
    now_ms: i64,
    side_to_move: Side,
) -> Clocks {
    arbitrate(clocks, last_move_at_ms, now_ms, side_to_move).clocks()
}

/// Time controls offered when creating a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeControl {
    Classical15,
    Rapid10,
    Blitz5,
}

impl TimeControl {
    pub const DEFAULT: TimeControl = TimeControl::Blitz5;

    /// Parse `"15|10"`, `"10|5"` or `"5|3"`; anything else is the default
    pub fn parse(value: &str) -> TimeControl {
        match value.trim() {
            "15|10" => TimeControl::Classical15,
            "10|5" => TimeControl::Rapid10,
            "5|3" => TimeControl::Blitz5,
            other => {
                tracing::warn!("Unknown time control '{}', using {}", other, Self::DEFAULT);
                Self::DEFAULT
            }
        }
    }

    /// Starting budget per side. Increments are not applied.
    pub fn initial_ms(self) -> u64 {
        let minutes = match self {
            TimeControl::Classical15 => 15,
            TimeControl::Rapid10 => 10,
            TimeControl::Blitz5 => 5,
        };
        minutes * 60 * 1000
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeControl::Classical15 => "15|10",
            TimeControl::Rapid10 => "10|5",
            TimeControl::Blitz5 => "5|3",
        }
    }
}

impl std::fmt::Display for TimeControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of "now" in epoch milliseconds
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualTime {
    now: AtomicI64,
}

impl ManualTime {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
