use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::config::Config;
use crate::lobby::MatchQueue;
use crate::manager::SessionManager;
use crate::registry::ConnectionRegistry;

/// Shared handles passed to every route through an `Extension` layer.
#[derive(Clone)]
pub struct Services {
    pub config: Config,
    pub registry: Arc<ConnectionRegistry>,
    pub sessions: Arc<SessionManager>,
    pub queue: Arc<MatchQueue>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Services {
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let sessions = Arc::new(SessionManager::new(
            registry.clone(),
            config.rules.build(),
            config.reconnect_grace,
        ));
        let queue = Arc::new(MatchQueue::new(sessions.clone()));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            registry,
            sessions,
            queue,
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Stop accepting work: cancel queued matches, close every connection
    /// and drop all sessions.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let queued = self.queue.drain().await;
        self.registry.close_all().await;
        self.sessions.clear().await;
        info!(queued, "Shutdown complete");
    }
}
