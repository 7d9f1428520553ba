//! FIFO matchmaking queue.
//!
//! Waiters are paired strictly in arrival order. The earlier arrival plays
//! white. A waiter whose connection has gone away is skipped and dropped.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chess_core::Side;
use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::GameError;
use crate::manager::SessionManager;
use crate::session::{PlayerId, SessionId};

/// What a waiter learns once it has been paired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub session_id: SessionId,
    pub side: Side,
    pub opponent_id: PlayerId,
}

/// Resolves when the entry is paired, or with `Cancelled` if it is removed
/// from the queue first.
#[derive(Debug)]
pub struct PendingMatch {
    rx: oneshot::Receiver<Pairing>,
}

impl Future for PendingMatch {
    type Output = Result<Pairing, GameError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.map_err(|_| GameError::Cancelled))
    }
}

struct Waiter {
    player_id: PlayerId,
    conn_id: Uuid,
    enqueued_at: DateTime<Utc>,
    reply: oneshot::Sender<Pairing>,
}

pub struct MatchQueue {
    waiting: Mutex<VecDeque<Waiter>>,
    sessions: Arc<SessionManager>,
}

impl MatchQueue {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            waiting: Mutex::new(VecDeque::new()),
            sessions,
        }
    }

    /// Join the queue. If someone is already waiting the pair is made right
    /// away and the returned future is ready; otherwise it resolves when the
    /// next distinct player arrives.
    pub async fn enqueue(&self, player_id: &str, conn_id: Uuid) -> Result<PendingMatch, GameError> {
        let mut waiting = self.waiting.lock().await;
        waiting.retain(|w| !w.reply.is_closed());

        if waiting.iter().any(|w| w.player_id == player_id) {
            return Err(GameError::AlreadyQueued(player_id.to_string()));
        }

        let (tx, rx) = oneshot::channel();
        let pending = PendingMatch { rx };

        while let Some(opponent) = waiting.pop_front() {
            if opponent.reply.is_closed() {
                continue;
            }

            let session_id = self
                .sessions
                .open(opponent.player_id.clone(), player_id.to_string())
                .await;

            let waited = Utc::now() - opponent.enqueued_at;
            info!(
                session_id = %session_id,
                white = %opponent.player_id,
                black = %player_id,
                waited_ms = waited.num_milliseconds(),
                "Players paired"
            );

            let opponent_id = opponent.player_id.clone();
            let _ = opponent.reply.send(Pairing {
                session_id: session_id.clone(),
                side: Side::White,
                opponent_id: player_id.to_string(),
            });
            let _ = tx.send(Pairing {
                session_id,
                side: Side::Black,
                opponent_id,
            });
            return Ok(pending);
        }

        waiting.push_back(Waiter {
            player_id: player_id.to_string(),
            conn_id,
            enqueued_at: Utc::now(),
            reply: tx,
        });
        debug!(player_id = %player_id, depth = waiting.len(), "Player queued");
        Ok(pending)
    }

    pub async fn is_waiting(&self, player_id: &str) -> bool {
        self.waiting
            .lock()
            .await
            .iter()
            .any(|w| w.player_id == player_id && !w.reply.is_closed())
    }

    /// Remove every entry owned by `conn_id`. Their pending futures resolve
    /// with `Cancelled`.
    pub async fn cancel(&self, conn_id: Uuid) -> usize {
        let mut waiting = self.waiting.lock().await;
        let before = waiting.len();
        waiting.retain(|w| w.conn_id != conn_id);
        let removed = before - waiting.len();
        if removed > 0 {
            debug!(conn_id = %conn_id, removed, "Queue entries cancelled");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.waiting.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn drain(&self) -> usize {
        let mut waiting = self.waiting.lock().await;
        let count = waiting.len();
        waiting.clear();
        count
    }
}
