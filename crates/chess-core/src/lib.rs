//! Board representation and move rules for two-player chess sessions.

pub mod board;
pub mod error;
pub mod notation;
mod position;
pub mod rules;

pub use board::{Board, BoardSnapshot, CastlingRights, Kind, MoveClock, Piece, Side, Square};
pub use error::{IllegalMove, ParseError};
pub use notation::Move;
pub use rules::{MoveRules, Outcome, Permissive, RuleSet, Standard};
