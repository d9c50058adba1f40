//! Shared handler state.

use std::sync::Arc;

use tokio::sync::watch;

use notif_broker::ConsumerState;
use notif_core::{NotificationRepository, SessionConfig, SessionRegistry};

/// State cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn NotificationRepository>,
    pub registry: Arc<SessionRegistry>,
    pub sessions: SessionConfig,
    /// Absent when the server runs without a broker consumer.
    pub consumer_state: Option<watch::Receiver<ConsumerState>>,
}

impl AppState {
    pub fn new(store: Arc<dyn NotificationRepository>, registry: Arc<SessionRegistry>) -> Self {
        Self {
            store,
            registry,
            sessions: SessionConfig::default(),
            consumer_state: None,
        }
    }

    pub fn with_session_config(mut self, sessions: SessionConfig) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_consumer_state(mut self, state: watch::Receiver<ConsumerState>) -> Self {
        self.consumer_state = Some(state);
        self
    }
}
