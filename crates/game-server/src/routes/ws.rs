//! WebSocket gateway.
//!
//! One task per connection. Replies to the connection's own requests and
//! pushes caused by other players share a single outbound channel, so the
//! socket has exactly one writer and messages leave in the order they were
//! produced.

use std::future;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures::stream::SplitSink;
use futures::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::GameError;
use crate::lobby::{Pairing, PendingMatch};
use crate::protocol::{Event, MatchingRequest, MoveRequest, Request, ServerMessage};
use crate::registry::Outbound;
use crate::session::{PlayerId, SessionId};
use crate::state::Services;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(services): Extension<Services>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, services))
}

/// What woke the connection loop up.
enum Step {
    Inbound(Option<Result<Message, axum::Error>>),
    Outbound(Option<ServerMessage>),
    Paired(Result<Pairing, GameError>),
    MatchTimeout,
    Shutdown,
}

struct Connection {
    id: Uuid,
    services: Services,
    tx: Outbound,
    player_id: Option<PlayerId>,
    pending: Option<PendingMatch>,
    deadline: Option<Instant>,
}

async fn handle_socket(socket: WebSocket, services: Services) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut shutdown = services.shutdown_signal();

    let mut conn = Connection {
        id: Uuid::new_v4(),
        services,
        tx,
        player_id: None,
        pending: None,
        deadline: None,
    };
    debug!(conn_id = %conn.id, "Connection opened");

    loop {
        let step = tokio::select! {
            frame = receiver.next() => Step::Inbound(frame),
            msg = rx.recv() => Step::Outbound(msg),
            paired = wait_for_pairing(&mut conn.pending) => Step::Paired(paired),
            _ = sleep_until(conn.deadline) => Step::MatchTimeout,
            _ = shutdown.changed() => Step::Shutdown,
        };

        match step {
            Step::Inbound(Some(Ok(Message::Text(text)))) => conn.on_text(text.as_str()).await,
            Step::Inbound(Some(Ok(Message::Close(_)))) | Step::Inbound(None) => break,
            Step::Inbound(Some(Err(e))) => {
                debug!(conn_id = %conn.id, error = %e, "Receive failed");
                break;
            }
            Step::Inbound(Some(Ok(_))) => {}
            Step::Outbound(Some(msg)) => {
                if let Err(e) = send_msg(&mut sender, &msg).await {
                    debug!(conn_id = %conn.id, error = %e, "Send failed");
                    break;
                }
            }
            Step::Outbound(None) | Step::Shutdown => break,
            Step::Paired(result) => conn.on_paired(result).await,
            Step::MatchTimeout => conn.on_match_timeout().await,
        }
    }

    conn.close().await;
    let _ = sender.close().await;
}

impl Connection {
    fn reply(&self, msg: impl Into<ServerMessage>) {
        // The receiving half lives as long as this connection's loop.
        let _ = self.tx.send(msg.into());
    }

    fn reply_error(&self, err: &GameError) {
        debug!(conn_id = %self.id, code = err.code(), error = %err, "Request rejected");
        self.reply(err);
    }

    async fn on_text(&mut self, text: &str) {
        let result = match Request::decode(text) {
            Ok(Request::Matching(req)) => self.on_matching(req).await,
            Ok(Request::Move(req)) => self.on_move(req).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.reply_error(&e);
        }
    }

    async fn on_matching(&mut self, req: MatchingRequest) -> Result<(), GameError> {
        let player_id = req.player_id;
        if self.pending.is_some() {
            let queued = self.player_id.clone().unwrap_or_else(|| player_id.clone());
            return Err(GameError::AlreadyQueued(queued));
        }

        // A connection speaks for one player at a time.
        if let Some(previous) = self.player_id.clone().filter(|p| *p != player_id) {
            self.release(&previous).await;
            self.player_id = None;
        }

        if self.services.sessions.session_of(&player_id).await.is_some() {
            self.bind(&player_id).await;
            if let Some(view) = self.services.sessions.rejoin(&player_id).await {
                self.reply(Event::Matched(view));
                return Ok(());
            }
        }

        // Another connection may hold the binding for this queued player.
        if self.services.queue.is_waiting(&player_id).await {
            return Err(GameError::AlreadyQueued(player_id));
        }

        // Bound before queueing so a pairing push always finds a channel.
        self.bind(&player_id).await;
        let pending = match self.services.queue.enqueue(&player_id, self.id).await {
            Ok(pending) => pending,
            Err(e) => {
                self.services.registry.unregister(&player_id, self.id).await;
                self.player_id = None;
                return Err(e);
            }
        };
        self.pending = Some(pending);
        self.deadline = self
            .services
            .config
            .matching_timeout
            .map(|timeout| Instant::now() + timeout);
        Ok(())
    }

    async fn on_move(&mut self, req: MoveRequest) -> Result<(), GameError> {
        if self.player_id.as_ref().is_some_and(|bound| *bound != req.player_id) {
            return Err(GameError::UnknownPlayer(req.player_id));
        }
        let session_id = SessionId::from(req.session_id);
        self.services
            .sessions
            .route_move(&session_id, &req.player_id, &req.mv)
            .await
    }

    async fn on_paired(&mut self, result: Result<Pairing, GameError>) {
        self.pending = None;
        self.deadline = None;

        let pairing = match result {
            Ok(p) => p,
            Err(e) => {
                debug!(conn_id = %self.id, error = %e, "Pending match dropped");
                return;
            }
        };
        let Some(player_id) = self.player_id.clone() else {
            return;
        };

        match self.services.sessions.view(&pairing.session_id, &player_id).await {
            Ok(view) => {
                info!(
                    session_id = %pairing.session_id,
                    player_id = %player_id,
                    side = %pairing.side,
                    opponent_id = %pairing.opponent_id,
                    "Match delivered"
                );
                self.reply(Event::Matched(view));
            }
            Err(e) => self.reply_error(&e),
        }
    }

    async fn on_match_timeout(&mut self) {
        self.deadline = None;
        let Some(pending) = self.pending.take() else {
            return;
        };
        self.services.queue.cancel(self.id).await;

        // A pairing may have landed just before the entry was cancelled.
        if let Some(Ok(pairing)) = pending.now_or_never() {
            self.on_paired(Ok(pairing)).await;
            return;
        }
        info!(conn_id = %self.id, player_id = ?self.player_id, "Matching timed out");
        self.reply(Event::Timeout {
            message: "no opponent found, try again".to_string(),
        });
    }

    async fn bind(&mut self, player_id: &str) {
        self.services
            .registry
            .register(player_id, self.id, self.tx.clone())
            .await;
        self.player_id = Some(player_id.to_string());
    }

    /// Drop this connection's claim on `player_id`. Only the connection that
    /// currently owns the binding reports the player as gone.
    async fn release(&self, player_id: &str) {
        if self.services.registry.unregister(player_id, self.id).await {
            self.services.sessions.player_left(player_id).await;
        }
    }

    async fn close(mut self) {
        if self.pending.take().is_some() {
            self.services.queue.cancel(self.id).await;
        }
        if let Some(player_id) = self.player_id.take() {
            self.release(&player_id).await;
        }
        debug!(conn_id = %self.id, "Connection closed");
    }
}

async fn wait_for_pairing(pending: &mut Option<PendingMatch>) -> Result<Pairing, GameError> {
    match pending {
        Some(p) => p.await,
        None => future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => future::pending().await,
    }
}

async fn send_msg(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> anyhow::Result<()> {
    let json = match msg.to_json() {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Dropping unserializable message");
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await?;
    Ok(())
}
