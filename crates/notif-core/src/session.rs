//! Live end-user sessions and the registry that indexes them.
//!
//! A [`Session`] is transport-agnostic: it owns the sending half of a bounded
//! outbound frame queue and a close signal. The WebSocket endpoint owns the
//! receiving half and runs the single writer task for the socket, so frames
//! queued on one session are written in order and never interleave.
//!
//! The [`SessionRegistry`] holds at most one session per identity. Attaching a
//! second session for the same identity evicts and closes the first.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::defaults;

/// Serialized event payload queued for a session's writer task.
pub type OutboundFrame = Arc<str>;

/// Why a session was closed by the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A newer session for the same identity was attached.
    Replaced,
    /// The outbound queue was full; the recipient is not draining it.
    Unresponsive,
    /// Writing to the socket failed or timed out.
    WriteFailed,
    /// The peer closed the connection or a read failed.
    PeerClosed,
    /// The process is shutting down.
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Replaced => "replaced",
            CloseReason::Unresponsive => "unresponsive",
            CloseReason::WriteFailed => "write_failed",
            CloseReason::PeerClosed => "peer_closed",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

/// Failure to queue a frame on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The outbound queue is at capacity.
    Full,
    /// The session has been closed or its writer is gone.
    Closed,
}

impl DeliveryError {
    /// Close reason the dispatcher records for this failure.
    pub fn close_reason(&self) -> CloseReason {
        match self {
            DeliveryError::Full => CloseReason::Unresponsive,
            DeliveryError::Closed => CloseReason::WriteFailed,
        }
    }
}

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bound of the outbound frame queue.
    pub buffer: usize,
    /// Deadline for a single socket write.
    pub write_timeout: Duration,
    /// Keep-alive ping interval.
    pub ping_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer: defaults::SESSION_BUFFER,
            write_timeout: Duration::from_secs(defaults::SESSION_WRITE_TIMEOUT_SECS),
            ping_interval: Duration::from_secs(defaults::SESSION_PING_SECS),
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SESSION_BUFFER` | `64` | Outbound queue bound per session |
    /// | `SESSION_WRITE_TIMEOUT_SECS` | `5` | Socket write deadline |
    /// | `SESSION_PING_SECS` | `30` | Keep-alive ping interval |
    pub fn from_env() -> Self {
        let buffer = std::env::var("SESSION_BUFFER")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::SESSION_BUFFER)
            .max(1);

        let write_timeout_secs = std::env::var("SESSION_WRITE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::SESSION_WRITE_TIMEOUT_SECS)
            .max(1);

        let ping_secs = std::env::var("SESSION_PING_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::SESSION_PING_SECS)
            .max(1);

        Self {
            buffer,
            write_timeout: Duration::from_secs(write_timeout_secs),
            ping_interval: Duration::from_secs(ping_secs),
        }
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval.max(Duration::from_millis(1));
        self
    }
}

/// A live bidirectional connection to one end-user.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    identity: String,
    created_at: DateTime<Utc>,
    outbound: mpsc::Sender<OutboundFrame>,
    close_tx: watch::Sender<Option<CloseReason>>,
}

impl Session {
    /// Create a session and the receiver its writer task drains.
    pub fn new(
        identity: impl Into<String>,
        buffer: usize,
    ) -> (Arc<Self>, mpsc::Receiver<OutboundFrame>) {
        let (outbound, rx) = mpsc::channel(buffer.max(1));
        let (close_tx, _) = watch::channel(None);
        let session = Arc::new(Self {
            id: Uuid::now_v7(),
            identity: identity.into(),
            created_at: Utc::now(),
            outbound,
            close_tx,
        });
        (session, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Queue a frame without waiting.
    pub fn try_send(&self, frame: OutboundFrame) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Request the connection be closed. The first reason recorded wins.
    pub fn close(&self, reason: CloseReason) {
        let changed = self.close_tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
        if changed {
            debug!(
                session_id = %self.id,
                username = %self.identity,
                reason = reason.as_str(),
                "Session close requested"
            );
        }
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.close_tx.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.close_reason().is_some()
    }

    /// Resolves once [`Session::close`] has been called.
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.close_tx.subscribe();
        loop {
            if let Some(reason) = *rx.borrow_and_update() {
                return reason;
            }
            if rx.changed().await.is_err() {
                return CloseReason::Shutdown;
            }
        }
    }
}

/// Index of live sessions by end-user identity.
///
/// Guarded by a single readers-writer lock. No session I/O happens while the
/// lock is held; evicted sessions are closed after it is released.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` under its identity, evicting and closing any prior
    /// session for that identity. Returns the evicted session.
    pub async fn attach(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        let identity = session.identity().to_string();
        let (prior, count) = {
            let mut sessions = self.sessions.write().await;
            let prior = sessions.insert(identity.clone(), session.clone());
            (prior, sessions.len())
        };

        let evicted = prior.filter(|p| p.id() != session.id());
        if let Some(ref old) = evicted {
            old.close(CloseReason::Replaced);
        }

        info!(
            subsystem = "session",
            component = "registry",
            op = "attach",
            username = %identity,
            session_id = %session.id(),
            replaced = evicted.is_some(),
            sessions = count,
            "Session attached"
        );
        evicted
    }

    /// Remove the mapping for `identity` only if it still points at `session`.
    ///
    /// Returns false when a newer session has already replaced it.
    pub async fn detach(&self, identity: &str, session: &Session) -> bool {
        let (removed, count) = {
            let mut sessions = self.sessions.write().await;
            let matches = sessions
                .get(identity)
                .is_some_and(|current| current.id() == session.id());
            if matches {
                sessions.remove(identity);
            }
            (matches, sessions.len())
        };

        if removed {
            info!(
                subsystem = "session",
                component = "registry",
                op = "detach",
                username = %identity,
                session_id = %session.id(),
                sessions = count,
                "Session detached"
            );
        }
        removed
    }

    pub async fn lookup(&self, identity: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(identity).cloned()
    }

    /// Point-in-time copy of all entries, taken under the read lock.
    pub async fn snapshot(&self) -> Vec<(String, Arc<Session>)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(identity, session)| (identity.clone(), session.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove and close every session. Returns how many were closed.
    pub async fn close_all(&self, reason: CloseReason) -> usize {
        let drained: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, s)| s).collect()
        };
        for session in &drained {
            session.close(reason);
        }
        drained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_attach_then_lookup() {
        let registry = SessionRegistry::new();
        let (s, _rx) = Session::new("alice", 4);
        assert!(registry.attach(s.clone()).await.is_none());

        let found = registry.lookup("alice").await.expect("session registered");
        assert_eq!(found.id(), s.id());
        assert_eq!(found.identity(), "alice");
        assert!(registry.lookup("bob").await.is_none());
    }

    #[tokio::test]
    async fn test_reattach_evicts_and_closes_prior() {
        let registry = SessionRegistry::new();
        let (s1, _rx1) = Session::new("alice", 4);
        let (s2, _rx2) = Session::new("alice", 4);

        registry.attach(s1.clone()).await;
        let evicted = registry.attach(s2.clone()).await.expect("prior evicted");

        assert_eq!(evicted.id(), s1.id());
        assert_eq!(s1.close_reason(), Some(CloseReason::Replaced));
        assert!(!s2.is_closed());
        assert_eq!(registry.lookup("alice").await.unwrap().id(), s2.id());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_attach_same_session_twice_does_not_close_it() {
        let registry = SessionRegistry::new();
        let (s, _rx) = Session::new("alice", 4);
        registry.attach(s.clone()).await;
        assert!(registry.attach(s.clone()).await.is_none());
        assert!(!s.is_closed());
    }

    #[tokio::test]
    async fn test_stale_detach_keeps_newer_session() {
        let registry = SessionRegistry::new();
        let (s1, _rx1) = Session::new("alice", 4);
        let (s2, _rx2) = Session::new("alice", 4);
        registry.attach(s1.clone()).await;
        registry.attach(s2.clone()).await;

        // The evicted session reports its disconnect late.
        assert!(!registry.detach("alice", &s1).await);
        assert_eq!(registry.lookup("alice").await.unwrap().id(), s2.id());

        assert!(registry.detach("alice", &s2).await);
        assert!(registry.lookup("alice").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let registry = SessionRegistry::new();
        let (a, _ra) = Session::new("alice", 4);
        let (b, _rb) = Session::new("bob", 4);
        registry.attach(a.clone()).await;
        registry.attach(b.clone()).await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        for (identity, session) in &snapshot {
            assert_eq!(identity, session.identity());
        }

        // Mutating the registry while holding the snapshot must not deadlock.
        registry.detach("alice", &a).await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_attach_detach_keeps_most_recent() {
        let registry = Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let (s, _rx) = Session::new("alice", 1);
                registry.attach(s.clone()).await;
                registry.detach("alice", &s).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        // Every attach was followed by its own detach.
        assert!(registry.lookup("alice").await.is_none());

        let (last, _rx) = Session::new("alice", 1);
        registry.attach(last.clone()).await;
        assert_eq!(registry.lookup("alice").await.unwrap().id(), last.id());
    }

    #[tokio::test]
    async fn test_try_send_full_and_closed() {
        let (s, mut rx) = Session::new("alice", 1);
        assert!(s.try_send(Arc::from("one")).is_ok());
        assert_eq!(s.try_send(Arc::from("two")), Err(DeliveryError::Full));

        assert_eq!(&*rx.recv().await.unwrap(), "one");
        drop(rx);
        assert_eq!(s.try_send(Arc::from("three")), Err(DeliveryError::Closed));
    }

    #[tokio::test]
    async fn test_try_send_after_close_fails() {
        let (s, _rx) = Session::new("alice", 4);
        s.close(CloseReason::Shutdown);
        assert_eq!(s.try_send(Arc::from("x")), Err(DeliveryError::Closed));
    }

    #[tokio::test]
    async fn test_first_close_reason_wins() {
        let (s, _rx) = Session::new("alice", 4);
        s.close(CloseReason::Replaced);
        s.close(CloseReason::WriteFailed);
        assert_eq!(s.close_reason(), Some(CloseReason::Replaced));
        assert_eq!(s.closed().await, CloseReason::Replaced);
    }

    #[tokio::test]
    async fn test_closed_wakes_waiter() {
        let (s, _rx) = Session::new("alice", 4);
        let waiter = {
            let s = s.clone();
            tokio::spawn(async move { s.closed().await })
        };
        tokio::task::yield_now().await;
        s.close(CloseReason::PeerClosed);
        assert_eq!(waiter.await.unwrap(), CloseReason::PeerClosed);
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = SessionRegistry::new();
        let (a, _ra) = Session::new("alice", 4);
        let (b, _rb) = Session::new("bob", 4);
        registry.attach(a.clone()).await;
        registry.attach(b.clone()).await;

        assert_eq!(registry.close_all(CloseReason::Shutdown).await, 2);
        assert!(registry.is_empty().await);
        assert_eq!(a.close_reason(), Some(CloseReason::Shutdown));
        assert_eq!(b.close_reason(), Some(CloseReason::Shutdown));
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::default()
            .with_buffer(0)
            .with_write_timeout(Duration::from_millis(250))
            .with_ping_interval(Duration::from_secs(10));
        assert_eq!(config.buffer, 1);
        assert_eq!(config.write_timeout, Duration::from_millis(250));
        assert_eq!(config.ping_interval, Duration::from_secs(10));
    }
}
