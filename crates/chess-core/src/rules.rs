//! Pluggable move validation.
//!
//! `Standard` enforces full chess legality through shakmaty (check, castling,
//! en passant, promotion to queen). `Permissive` only checks that the mover
//! owns the source piece and is not capturing its own piece.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use shakmaty::{File, Position, Role};

use crate::board::{Board, Piece, Side};
use crate::error::IllegalMove;
use crate::notation::Move;
use crate::position::{from_chess, to_chess, to_sm_square};

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Checkmate { winner: Side },
    Stalemate,
    InsufficientMaterial,
    KingCaptured { winner: Side },
    Abandoned { winner: Side },
}

impl Outcome {
    pub fn winner(&self) -> Option<Side> {
        match self {
            Outcome::Checkmate { winner }
            | Outcome::KingCaptured { winner }
            | Outcome::Abandoned { winner } => Some(*winner),
            Outcome::Stalemate | Outcome::InsufficientMaterial => None,
        }
    }
}

pub trait MoveRules: Send + Sync {
    fn name(&self) -> &'static str;

    /// Validate `mv` played by `side` and return the resulting board.
    /// Must be pure: the same inputs always give the same result.
    fn apply(&self, board: &Board, side: Side, mv: Move) -> Result<Board, IllegalMove>;

    /// The game result if `to_move` has no way to continue.
    fn outcome(&self, board: &Board, to_move: Side) -> Option<Outcome>;
}

/// Configured rule set, selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleSet {
    #[default]
    Standard,
    Permissive,
}

impl RuleSet {
    pub fn build(self) -> Arc<dyn MoveRules> {
        match self {
            RuleSet::Standard => Arc::new(Standard),
            RuleSet::Permissive => Arc::new(Permissive),
        }
    }
}

impl FromStr for RuleSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "full" => Ok(RuleSet::Standard),
            "permissive" | "minimal" => Ok(RuleSet::Permissive),
            other => Err(format!("unknown rule set: {other}")),
        }
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSet::Standard => f.write_str("standard"),
            RuleSet::Permissive => f.write_str("permissive"),
        }
    }
}

/// Checks shared by every rule set.
fn check_ownership(board: &Board, side: Side, mv: Move) -> Result<Piece, IllegalMove> {
    if mv.from == mv.to {
        return Err(IllegalMove::NullMove(mv.from));
    }
    let piece = board
        .piece_at(mv.from)
        .ok_or(IllegalMove::EmptySource(mv.from))?;
    if piece.side != side {
        return Err(IllegalMove::OpponentPiece(mv.from));
    }
    Ok(piece)
}

// ---- Permissive ----

#[derive(Debug, Clone, Copy, Default)]
pub struct Permissive;

impl MoveRules for Permissive {
    fn name(&self) -> &'static str {
        "permissive"
    }

    fn apply(&self, board: &Board, side: Side, mv: Move) -> Result<Board, IllegalMove> {
        check_ownership(board, side, mv)?;
        if board.piece_at(mv.to).is_some_and(|p| p.side == side) {
            return Err(IllegalMove::OwnPieceAtDestination(mv.to));
        }
        Ok(board.relocate(side, mv))
    }

    fn outcome(&self, board: &Board, to_move: Side) -> Option<Outcome> {
        // Kings can be taken here, so a missing king ends the game.
        match board.king_square(to_move) {
            Some(_) => None,
            None => Some(Outcome::KingCaptured {
                winner: to_move.opponent(),
            }),
        }
    }
}

// ---- Standard ----

#[derive(Debug, Clone, Copy, Default)]
pub struct Standard;

impl MoveRules for Standard {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn apply(&self, board: &Board, side: Side, mv: Move) -> Result<Board, IllegalMove> {
        check_ownership(board, side, mv)?;

        let mut pos = to_chess(board, side)?;
        let from = to_sm_square(mv.from);
        let to = to_sm_square(mv.to);

        let legals = pos.legal_moves();
        let legal = legals
            .iter()
            .find(|m| matches_coordinates(m, from, to))
            .cloned()
            .ok_or(IllegalMove::NotLegal(mv))?;

        pos.play_unchecked(&legal);
        Ok(from_chess(&pos))
    }

    fn outcome(&self, board: &Board, to_move: Side) -> Option<Outcome> {
        let pos = to_chess(board, to_move).ok()?;
        if pos.is_checkmate() {
            Some(Outcome::Checkmate {
                winner: to_move.opponent(),
            })
        } else if pos.is_stalemate() {
            Some(Outcome::Stalemate)
        } else if pos.is_insufficient_material() {
            Some(Outcome::InsufficientMaterial)
        } else {
            None
        }
    }
}

/// Whether a shakmaty move is the one the player named by its squares.
/// Castling is accepted both as king-to-destination (`e1-g1`) and
/// king-to-rook (`e1-h1`). Promotions only match the queen.
fn matches_coordinates(m: &shakmaty::Move, from: shakmaty::Square, to: shakmaty::Square) -> bool {
    match m {
        shakmaty::Move::Normal {
            from: f,
            to: t,
            promotion,
            ..
        } => *f == from && *t == to && matches!(promotion, None | Some(Role::Queen)),
        shakmaty::Move::EnPassant { from: f, to: t } => *f == from && *t == to,
        shakmaty::Move::Castle { king, rook } => {
            let king_to_file = if rook.file() > king.file() { 6u32 } else { 2u32 };
            let king_to = shakmaty::Square::from_coords(File::new(king_to_file), king.rank());
            *king == from && (*rook == to || king_to == to)
        }
        _ => false,
    }
}
