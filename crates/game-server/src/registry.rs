//! Player → live outbound channel.
//!
//! Lets the server push to a player's connection regardless of which
//! connection issued the request that caused the push.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::session::PlayerId;

pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

struct Binding {
    conn_id: Uuid,
    tx: Outbound,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    bindings: RwLock<HashMap<PlayerId, Binding>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `player_id` to a connection. A newer registration replaces an
    /// older one; returns true when an existing binding was superseded.
    pub async fn register(&self, player_id: &str, conn_id: Uuid, tx: Outbound) -> bool {
        let previous = self
            .bindings
            .write()
            .await
            .insert(player_id.to_string(), Binding { conn_id, tx });
        match previous {
            Some(old) if old.conn_id != conn_id => {
                debug!(player_id = %player_id, old_conn = %old.conn_id, new_conn = %conn_id, "Registration superseded");
                true
            }
            _ => false,
        }
    }

    pub async fn send(&self, player_id: &str, msg: ServerMessage) -> Result<(), GameError> {
        let bindings = self.bindings.read().await;
        let binding = bindings
            .get(player_id)
            .ok_or_else(|| GameError::Delivery(player_id.to_string()))?;
        binding
            .tx
            .send(msg)
            .map_err(|_| GameError::Delivery(player_id.to_string()))
    }

    /// Remove the binding only if it still belongs to `conn_id`. Returns
    /// whether anything was removed.
    pub async fn unregister(&self, player_id: &str, conn_id: Uuid) -> bool {
        let mut bindings = self.bindings.write().await;
        match bindings.get(player_id) {
            Some(binding) if binding.conn_id == conn_id => {
                bindings.remove(player_id);
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.bindings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Forget every binding so nothing more is pushed. Each connection loop
    /// holds its own sender and exits on the shutdown signal instead.
    pub async fn close_all(&self) {
        self.bindings.write().await.clear();
    }
}
