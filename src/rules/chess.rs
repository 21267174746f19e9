//! Standard chess over FEN positions, backed by shakmaty

use super::{MoveRejected, RulesEngine};
use crate::store::Side;
use shakmaty::{
    fen::Fen, uci::UciMove, CastlingMode, Chess, Color, EnPassantMode, Move, Position,
};

/// Chess rules; moves arrive as from/to squares in coordinate notation
#[derive(Debug, Clone, Copy, Default)]
pub struct ChessRules;

impl ChessRules {
    pub fn new() -> Self {
        Self
    }

    fn parse(position: &str) -> Result<Chess, MoveRejected> {
        let fen: Fen = position
            .parse()
            .map_err(|e| MoveRejected::InvalidPosition(format!("{e}")))?;
        fen.into_position::<Chess>(CastlingMode::Standard)
            .map_err(|e| MoveRejected::InvalidPosition(format!("{e}")))
    }

    fn to_fen(position: Chess) -> String {
        Fen::from_position(position, EnPassantMode::Legal).to_string()
    }

    fn is_over(position: &Chess) -> bool {
        position.is_checkmate() || position.is_stalemate() || position.is_insufficient_material()
    }

    fn resolve(position: &Chess, uci: &str) -> Result<Move, MoveRejected> {
        let parsed: UciMove = uci
            .parse()
            .map_err(|_| MoveRejected::InvalidMove(uci.to_string()))?;
        parsed
            .to_move(position)
            .map_err(|_| MoveRejected::IllegalMove(uci.to_string()))
    }
}

impl RulesEngine for ChessRules {
    fn initial_position(&self) -> String {
        Self::to_fen(Chess::default())
    }

    fn apply_move(
        &self,
        position: &str,
        from_square: &str,
        to_square: &str,
        promotion: Option<&str>,
    ) -> Result<String, MoveRejected> {
        let current = Self::parse(position)?;
        if Self::is_over(&current) {
            return Err(MoveRejected::GameOver);
        }

        let from = from_square.trim().to_ascii_lowercase();
        let to = to_square.trim().to_ascii_lowercase();
        let piece = promotion.map(|p| p.trim().to_ascii_lowercase());

        let m = match piece {
            Some(piece) => Self::resolve(&current, &format!("{from}{to}{piece}"))?,
            // Pawn reaching the last rank without a piece promotes to a queen
            None => {
                let plain = format!("{from}{to}");
                match Self::resolve(&current, &plain) {
                    Ok(m) => m,
                    Err(e) => Self::resolve(&current, &format!("{plain}q")).map_err(|_| e)?,
                }
            }
        };

        let next = current
            .play(&m)
            .map_err(|_| MoveRejected::IllegalMove(format!("{from}{to}")))?;
        Ok(Self::to_fen(next))
    }

    fn is_terminal(&self, position: &str) -> bool {
        Self::parse(position).is_ok_and(|p| Self::is_over(&p))
    }

    fn side_to_move(&self, position: &str) -> Result<Side, MoveRejected> {
        let parsed = Self::parse(position)?;
        Ok(match parsed.turn() {
            Color::White => Side::White,
            Color::Black => Side::Black,
        })
    }
}
