//! Directory of live sessions.
//!
//! Lock order: a session's mutex may be held while taking the directory
//! lock or the registry lock, never the other way round.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chess_core::{Move, MoveRules, Outcome};
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::GameError;
use crate::protocol::{Event, ServerMessage, SessionView};
use crate::registry::ConnectionRegistry;
use crate::session::{PlayerId, Session, SessionId, SessionStatus};

#[derive(Default)]
struct Directory {
    sessions: HashMap<SessionId, Arc<Mutex<Session>>>,
    by_player: HashMap<PlayerId, SessionId>,
}

pub struct SessionManager {
    directory: RwLock<Directory>,
    registry: Arc<ConnectionRegistry>,
    rules: Arc<dyn MoveRules>,
    reconnect_grace: Duration,
}

impl SessionManager {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        rules: Arc<dyn MoveRules>,
        reconnect_grace: Duration,
    ) -> Self {
        Self {
            directory: RwLock::new(Directory::default()),
            registry,
            rules,
            reconnect_grace,
        }
    }

    /// Create a session for a freshly paired couple. `white` moves first.
    pub async fn open(&self, white: PlayerId, black: PlayerId) -> SessionId {
        let id = SessionId::generate();
        let session = Session::new(id.clone(), white.clone(), black.clone(), self.rules.clone());

        let mut dir = self.directory.write().await;
        dir.by_player.insert(white.clone(), id.clone());
        dir.by_player.insert(black.clone(), id.clone());
        dir.sessions.insert(id.clone(), Arc::new(Mutex::new(session)));

        info!(session_id = %id, white = %white, black = %black, rules = self.rules.name(), "Session opened");
        id
    }

    async fn lookup(&self, session_id: &SessionId) -> Result<Arc<Mutex<Session>>, GameError> {
        self.directory
            .read()
            .await
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| GameError::UnknownSession(session_id.clone()))
    }

    pub async fn session_of(&self, player_id: &str) -> Option<SessionId> {
        self.directory.read().await.by_player.get(player_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.directory.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn view(&self, session_id: &SessionId, player_id: &str) -> Result<SessionView, GameError> {
        let session = self.lookup(session_id).await?;
        let session = session.lock().await;
        session.view_for(player_id, false)
    }

    /// Apply a move and push the new board to both participants. Errors
    /// go back to the caller only; nothing is broadcast for a rejected move.
    pub async fn route_move(
        &self,
        session_id: &SessionId,
        player_id: &str,
        mv: &str,
    ) -> Result<(), GameError> {
        let session = self.lookup(session_id).await?;
        let mv: Move = mv.parse()?;
        let mut session = session.lock().await;

        let applied = session.submit_move(player_id, mv)?;
        info!(
            session_id = %session_id,
            player_id = %player_id,
            mv = %mv,
            turn = %session.turn(),
            "Move accepted"
        );

        for (recipient, board) in applied.pushes {
            self.deliver(&recipient, ServerMessage::Board(board)).await;
        }

        if let Some(outcome) = applied.outcome {
            self.remove(&session).await;
            self.announce_game_over(&session, outcome).await;
        }
        Ok(())
    }

    /// Re-attach a player to their unfinished session, if any. The opponent
    /// is only told when the player had actually been away.
    pub async fn rejoin(&self, player_id: &str) -> Option<SessionView> {
        let session_id = self.session_of(player_id).await?;
        let session = self.lookup(&session_id).await.ok()?;
        let mut session = session.lock().await;
        if session.status() == SessionStatus::Completed {
            return None;
        }
        let was_connected = session.mark_connected(player_id)?;

        if was_connected {
            debug!(session_id = %session_id, player_id = %player_id, "Session resumed by a connected player");
        } else {
            info!(session_id = %session_id, player_id = %player_id, "Player rejoined session");
            if let Some(opponent) = session.opponent_of(player_id) {
                let opponent_id = opponent.player_id.clone();
                self.deliver(
                    &opponent_id,
                    Event::OpponentRejoined {
                        session_id: session_id.clone(),
                        opponent_id: player_id.to_string(),
                    }
                    .into(),
                )
                .await;
            }
        }
        session.view_for(player_id, true).ok()
    }

    /// A player's connection went away. The session is paused for the
    /// reconnect grace period, then completes as abandoned. If both players
    /// are gone it is dropped at once.
    pub async fn player_left(self: &Arc<Self>, player_id: &str) {
        let Some(session_id) = self.session_of(player_id).await else {
            return;
        };
        let Ok(session) = self.lookup(&session_id).await else {
            return;
        };
        let mut guard = session.lock().await;
        let Some(generation) = guard.mark_disconnected(player_id) else {
            return;
        };

        if guard.all_disconnected() {
            info!(session_id = %session_id, "Both players left, dropping session");
            self.remove(&guard).await;
            return;
        }

        if let Some(opponent) = guard.opponent_of(player_id) {
            let opponent_id = opponent.player_id.clone();
            self.deliver(
                &opponent_id,
                Event::OpponentLeft {
                    session_id: session_id.clone(),
                    opponent_id: player_id.to_string(),
                }
                .into(),
            )
            .await;
        }
        drop(guard);

        info!(
            session_id = %session_id,
            player_id = %player_id,
            grace_secs = self.reconnect_grace.as_secs(),
            "Player disconnected, waiting for rejoin"
        );

        let manager = Arc::clone(self);
        let player_id = player_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(manager.reconnect_grace).await;
            manager.expire(&session_id, &player_id, generation).await;
        });
    }

    async fn expire(&self, session_id: &SessionId, player_id: &str, generation: u32) {
        let Ok(session) = self.lookup(session_id).await else {
            return;
        };
        let mut session = session.lock().await;

        let still_gone = session
            .participant(player_id)
            .is_some_and(|p| !p.connected && p.disconnects == generation);
        if !still_gone || session.status() == SessionStatus::Completed {
            debug!(session_id = %session_id, player_id = %player_id, "Grace timer superseded");
            return;
        }

        let Some(winner) = session.opponent_of(player_id).map(|p| p.side) else {
            return;
        };
        let outcome = Outcome::Abandoned { winner };
        session.complete(outcome);
        info!(session_id = %session_id, player_id = %player_id, "Session abandoned");

        self.remove(&session).await;
        self.announce_game_over(&session, outcome).await;
    }

    async fn announce_game_over(&self, session: &Session, outcome: Outcome) {
        let duration = Utc::now() - session.created_at();
        info!(
            session_id = %session.id(),
            ?outcome,
            duration_secs = duration.num_seconds(),
            "Game over"
        );
        for p in session.participants() {
            if !p.connected {
                continue;
            }
            self.deliver(
                &p.player_id,
                Event::GameOver {
                    session_id: session.id().clone(),
                    outcome,
                }
                .into(),
            )
            .await;
        }
    }

    async fn remove(&self, session: &Session) {
        let mut dir = self.directory.write().await;
        dir.sessions.remove(session.id());
        for p in session.participants() {
            if dir.by_player.get(&p.player_id) == Some(session.id()) {
                dir.by_player.remove(&p.player_id);
            }
        }
    }

    /// Delivery failures are logged and never abort the caller.
    async fn deliver(&self, player_id: &str, msg: ServerMessage) {
        if let Err(e) = self.registry.send(player_id, msg).await {
            warn!(player_id = %player_id, error = %e, "Push failed");
        }
    }

    pub async fn clear(&self) {
        let mut dir = self.directory.write().await;
        let count = dir.sessions.len();
        dir.sessions.clear();
        dir.by_player.clear();
        if count > 0 {
            info!(count, "Dropped sessions on shutdown");
        }
    }
}
