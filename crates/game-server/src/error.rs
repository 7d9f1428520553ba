use chess_core::Side;

use crate::session::{PlayerId, SessionId};

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("unknown action: {0:?}")]
    UnknownAction(String),

    #[error("invalid session id: {0}")]
    UnknownSession(SessionId),

    #[error("player {0} is not part of this session")]
    UnknownPlayer(PlayerId),

    #[error("not your turn, {0} to move")]
    NotYourTurn(Side),

    #[error("invalid move: {0}")]
    IllegalMove(#[from] chess_core::IllegalMove),

    #[error("invalid move: {0}")]
    Notation(#[from] chess_core::ParseError),

    #[error("couldn't deliver to {0}: connection closed")]
    Delivery(PlayerId),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("player {0} is already queued")]
    AlreadyQueued(PlayerId),

    #[error("session {0} is over")]
    SessionOver(SessionId),

    #[error("matching was cancelled")]
    Cancelled,
}

impl GameError {
    /// Stable code sent to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::UnknownAction(_) => "UNKNOWN_ACTION",
            GameError::UnknownSession(_) => "UNKNOWN_SESSION",
            GameError::UnknownPlayer(_) => "UNKNOWN_PLAYER",
            GameError::NotYourTurn(_) => "NOT_YOUR_TURN",
            GameError::IllegalMove(_) | GameError::Notation(_) => "ILLEGAL_MOVE",
            GameError::Delivery(_) => "DELIVERY_FAILED",
            GameError::Malformed(_) => "MALFORMED_MESSAGE",
            GameError::AlreadyQueued(_) => "ALREADY_QUEUED",
            GameError::SessionOver(_) => "SESSION_OVER",
            GameError::Cancelled => "CANCELLED",
        }
    }
}

impl From<serde_json::Error> for GameError {
    fn from(e: serde_json::Error) -> Self {
        GameError::Malformed(e.to_string())
    }
}
