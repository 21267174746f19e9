//! Rules engine seam - the only place that understands positions
//!
//! The synchronization core treats a position as an opaque string and asks a
//! [`RulesEngine`] to advance it. Swapping the engine reuses the core for any
//! two-player turn-based game.

mod chess;

pub use chess::ChessRules;

use crate::store::Side;
use thiserror::Error;

/// Why the engine refused a move or a position
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveRejected {
    #[error("invalid position: {0}")]
    InvalidPosition(String),

    #[error("unparseable move: {0}")]
    InvalidMove(String),

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("game is already over")]
    GameOver,
}

/// Move legality and outcome capability
pub trait RulesEngine: Send + Sync {
    /// Position a new session starts from
    fn initial_position(&self) -> String;

    /// Validate and apply a move, returning the new position
    fn apply_move(
        &self,
        position: &str,
        from_square: &str,
        to_square: &str,
        promotion: Option<&str>,
    ) -> Result<String, MoveRejected>;

    /// Whether the position ends the game
    fn is_terminal(&self, position: &str) -> bool;

    /// Whose turn it is in `position`
    fn side_to_move(&self, position: &str) -> Result<Side, MoveRejected>;
}
