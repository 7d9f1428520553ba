//! Error types for parsing and move application.

use thiserror::Error;

use crate::board::Square;
use crate::notation::Move;

/// Why a move was refused by the active rule set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IllegalMove {
    #[error("source and destination are the same square: {0}")]
    NullMove(Square),

    #[error("no piece at {0}")]
    EmptySource(Square),

    #[error("the piece at {0} belongs to the opponent")]
    OpponentPiece(Square),

    #[error("destination {0} is occupied by your own piece")]
    OwnPieceAtDestination(Square),

    #[error("{0} is not a legal move")]
    NotLegal(Move),

    #[error("position cannot be validated: {0}")]
    Position(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("couldn't parse move: {0:?}")]
    Move(String),

    #[error("couldn't parse square: {0:?}")]
    Square(String),
}
