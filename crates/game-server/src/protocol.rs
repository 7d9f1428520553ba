//! Wire format.
//!
//! Inbound frames are `{"action": ..., "data": {...}}` envelopes. Outbound
//! frames are either a bare board (an 8x8 array of piece tokens, which is
//! what clients render after every move) or a `type`-tagged event object.

use chess_core::{BoardSnapshot, Outcome, Side};
use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::session::{PlayerId, SessionId, SessionStatus};

// ---- Client → Server ----

#[derive(Debug, Deserialize)]
struct Envelope {
    action: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingRequest {
    #[serde(alias = "player_id")]
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    #[serde(alias = "player_id")]
    pub player_id: PlayerId,
    #[serde(alias = "session_id")]
    pub session_id: String,
    #[serde(rename = "move")]
    pub mv: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Matching(MatchingRequest),
    Move(MoveRequest),
}

impl Request {
    /// Decode one text frame. Unknown actions and missing or mistyped
    /// fields are errors, never silently ignored.
    pub fn decode(text: &str) -> Result<Request, GameError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        let request = match envelope.action.as_str() {
            "matching" => {
                let req: MatchingRequest = serde_json::from_value(envelope.data)?;
                require_non_empty("playerId", &req.player_id)?;
                Request::Matching(req)
            }
            "move" => {
                let req: MoveRequest = serde_json::from_value(envelope.data)?;
                require_non_empty("playerId", &req.player_id)?;
                require_non_empty("sessionId", &req.session_id)?;
                Request::Move(req)
            }
            other => return Err(GameError::UnknownAction(other.to_string())),
        };
        Ok(request)
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), GameError> {
    if value.trim().is_empty() {
        return Err(GameError::Malformed(format!("{field} must not be empty")));
    }
    Ok(())
}

// ---- Server → Client ----

/// Everything a player needs to (re)draw a game.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub side: Side,
    pub opponent_id: PlayerId,
    pub opponent_connected: bool,
    pub status: SessionStatus,
    pub turn: Side,
    pub board: BoardSnapshot,
    pub fen: String,
    pub moves: Vec<String>,
    pub rejoined: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Event {
    Matched(SessionView),
    Error {
        code: &'static str,
        error: String,
    },
    OpponentLeft {
        session_id: SessionId,
        opponent_id: PlayerId,
    },
    OpponentRejoined {
        session_id: SessionId,
        opponent_id: PlayerId,
    },
    GameOver {
        session_id: SessionId,
        #[serde(flatten)]
        outcome: Outcome,
    },
    Timeout {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Board(BoardSnapshot),
    Event(Event),
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<Event> for ServerMessage {
    fn from(event: Event) -> Self {
        ServerMessage::Event(event)
    }
}

impl From<&GameError> for ServerMessage {
    fn from(err: &GameError) -> Self {
        ServerMessage::Event(Event::Error {
            code: err.code(),
            error: err.to_string(),
        })
    }
}
