//! One game between two matched players.

use std::fmt;
use std::sync::Arc;

use chess_core::{Board, BoardSnapshot, Move, MoveRules, Outcome, Side};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::GameError;
use crate::protocol::SessionView;

/// Client-supplied player identifier. Not authenticated.
pub type PlayerId = String;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        SessionId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        SessionId(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Only ever moves forward: WaitingForFirstMove → InProgress → Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    WaitingForFirstMove,
    InProgress,
    Completed,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub player_id: PlayerId,
    pub side: Side,
    pub connected: bool,
    /// Bumped on every disconnect so a stale grace timer can tell it lost
    /// a race with a rejoin.
    pub disconnects: u32,
}

impl Participant {
    fn new(player_id: PlayerId, side: Side) -> Self {
        Self {
            player_id,
            side,
            connected: true,
            disconnects: 0,
        }
    }
}

/// The result of an accepted move: the new board once per participant.
#[derive(Debug, Clone)]
pub struct Applied {
    pub pushes: [(PlayerId, BoardSnapshot); 2],
    pub outcome: Option<Outcome>,
}

pub struct Session {
    id: SessionId,
    white: Participant,
    black: Participant,
    board: Board,
    turn: Side,
    status: SessionStatus,
    outcome: Option<Outcome>,
    moves: Vec<Move>,
    rules: Arc<dyn MoveRules>,
    created_at: DateTime<Utc>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("white", &self.white.player_id)
            .field("black", &self.black.player_id)
            .field("turn", &self.turn)
            .field("status", &self.status)
            .field("rules", &self.rules.name())
            .finish()
    }
}

impl Session {
    pub fn new(id: SessionId, white: PlayerId, black: PlayerId, rules: Arc<dyn MoveRules>) -> Self {
        Self {
            id,
            white: Participant::new(white, Side::White),
            black: Participant::new(black, Side::Black),
            board: Board::standard(),
            turn: Side::White,
            status: SessionStatus::WaitingForFirstMove,
            outcome: None,
            moves: Vec::new(),
            rules,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Side {
        self.turn
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn participants(&self) -> [&Participant; 2] {
        [&self.white, &self.black]
    }

    pub fn participant(&self, player_id: &str) -> Option<&Participant> {
        self.participants()
            .into_iter()
            .find(|p| p.player_id == player_id)
    }

    fn participant_mut(&mut self, player_id: &str) -> Option<&mut Participant> {
        if self.white.player_id == player_id {
            Some(&mut self.white)
        } else if self.black.player_id == player_id {
            Some(&mut self.black)
        } else {
            None
        }
    }

    pub fn opponent_of(&self, player_id: &str) -> Option<&Participant> {
        let side = self.participant(player_id)?.side;
        Some(match side {
            Side::White => &self.black,
            Side::Black => &self.white,
        })
    }

    /// Apply `mv` for `player_id`. On any error the session is left untouched.
    pub fn submit_move(&mut self, player_id: &str, mv: Move) -> Result<Applied, GameError> {
        if self.status == SessionStatus::Completed {
            return Err(GameError::SessionOver(self.id.clone()));
        }
        let side = self
            .participant(player_id)
            .map(|p| p.side)
            .ok_or_else(|| GameError::UnknownPlayer(player_id.to_string()))?;
        if side != self.turn {
            return Err(GameError::NotYourTurn(self.turn));
        }

        let next = self.board.apply_move(side, mv, self.rules.as_ref())?;

        self.board = next;
        self.moves.push(mv);
        self.turn = side.opponent();
        if self.status == SessionStatus::WaitingForFirstMove {
            self.status = SessionStatus::InProgress;
        }
        if let Some(outcome) = self.rules.outcome(&self.board, self.turn) {
            self.complete(outcome);
        }

        let snapshot = self.board.snapshot();
        Ok(Applied {
            pushes: [
                (self.white.player_id.clone(), snapshot.clone()),
                (self.black.player_id.clone(), snapshot),
            ],
            outcome: self.outcome,
        })
    }

    /// Terminal. A second call keeps the first outcome.
    pub fn complete(&mut self, outcome: Outcome) {
        if self.status != SessionStatus::Completed {
            self.status = SessionStatus::Completed;
            self.outcome = Some(outcome);
        }
    }

    /// Returns the new disconnect generation, or `None` if the player is
    /// not part of this session.
    pub fn mark_disconnected(&mut self, player_id: &str) -> Option<u32> {
        let p = self.participant_mut(player_id)?;
        p.connected = false;
        p.disconnects += 1;
        Some(p.disconnects)
    }

    /// Returns whether the player was already connected, or `None` if the
    /// player is not part of this session.
    pub fn mark_connected(&mut self, player_id: &str) -> Option<bool> {
        let p = self.participant_mut(player_id)?;
        Some(std::mem::replace(&mut p.connected, true))
    }

    pub fn all_disconnected(&self) -> bool {
        !self.white.connected && !self.black.connected
    }

    pub fn view_for(&self, player_id: &str, rejoined: bool) -> Result<SessionView, GameError> {
        let me = self
            .participant(player_id)
            .ok_or_else(|| GameError::UnknownPlayer(player_id.to_string()))?;
        let opponent = self
            .opponent_of(player_id)
            .ok_or_else(|| GameError::UnknownPlayer(player_id.to_string()))?;

        Ok(SessionView {
            session_id: self.id.clone(),
            player_id: me.player_id.clone(),
            side: me.side,
            opponent_id: opponent.player_id.clone(),
            opponent_connected: opponent.connected,
            status: self.status,
            turn: self.turn,
            board: self.board.snapshot(),
            fen: self.board.to_fen(self.turn),
            moves: self.moves.iter().map(|m| m.to_string()).collect(),
            rejoined,
        })
    }
}
