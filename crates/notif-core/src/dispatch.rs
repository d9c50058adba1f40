//! Event routing to live sessions.
//!
//! Job events are unicast to the session registered for the job's owner.
//! Client events are broadcast to a snapshot of every registered session.
//! Delivery never waits on a socket: frames are queued with `try_send`, and a
//! session whose queue is full or closed is detached and closed on the spot.
//! Iteration continues with the remaining recipients.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::events::Event;
use crate::session::{OutboundFrame, Session, SessionRegistry};

/// Outcome of a single dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Sessions the frame was queued on.
    pub delivered: usize,
    /// Sessions that were dropped because the frame could not be queued.
    pub failed: usize,
}

/// Routes decoded events to the sessions in a [`SessionRegistry`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Deliver `event` to its recipients.
    ///
    /// A job event whose owner has no live session is dropped silently; the
    /// persisted copy is the only record. Only encoding can fail.
    pub async fn dispatch(&self, event: &Event) -> Result<DispatchReport> {
        let frame: OutboundFrame = Arc::from(event.to_frame()?);

        let report = match event.recipient() {
            Some(username) => self.unicast(username, &frame).await,
            None => self.broadcast(&frame).await,
        };

        debug!(
            subsystem = "dispatch",
            event_kind = %event.kind(),
            recipients = report.delivered,
            failed = report.failed,
            "Event dispatched"
        );
        Ok(report)
    }

    async fn unicast(&self, username: &str, frame: &OutboundFrame) -> DispatchReport {
        let mut report = DispatchReport::default();
        match self.registry.lookup(username).await {
            Some(session) => self.deliver(&session, frame, &mut report).await,
            None => {
                debug!(
                    subsystem = "dispatch",
                    username = %username,
                    "No live session for recipient"
                );
            }
        }
        report
    }

    async fn broadcast(&self, frame: &OutboundFrame) -> DispatchReport {
        let mut report = DispatchReport::default();
        for (_, session) in self.registry.snapshot().await {
            self.deliver(&session, frame, &mut report).await;
        }
        report
    }

    async fn deliver(
        &self,
        session: &Arc<Session>,
        frame: &OutboundFrame,
        report: &mut DispatchReport,
    ) {
        match session.try_send(frame.clone()) {
            Ok(()) => {
                trace!(
                    subsystem = "dispatch",
                    username = %session.identity(),
                    session_id = %session.id(),
                    "Frame queued"
                );
                report.delivered += 1;
            }
            Err(e) => {
                warn!(
                    subsystem = "dispatch",
                    username = %session.identity(),
                    session_id = %session.id(),
                    reason = ?e,
                    "Dropping session that cannot accept frames"
                );
                self.registry.detach(session.identity(), session).await;
                session.close(e.close_reason());
                report.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ClientEvent, JobEvent, JobStatus, JobType, Priority};
    use crate::session::CloseReason;

    fn job_for(username: &str, job_id: &str) -> Event {
        Event::Job(JobEvent {
            username: username.to_string(),
            job_id: job_id.to_string(),
            job_status: JobStatus::Completed,
            job_type: JobType::Scrape,
        })
    }

    fn client_event() -> Event {
        Event::Client(ClientEvent {
            client_id: "C1".to_string(),
            client_name: "Acme".to_string(),
            priority: Priority::High,
            title: None,
            source: None,
        })
    }

    #[tokio::test]
    async fn test_job_event_reaches_only_its_owner() {
        let registry = Arc::new(SessionRegistry::new());
        let (alice, mut alice_rx) = Session::new("alice", 4);
        let (bob, mut bob_rx) = Session::new("bob", 4);
        registry.attach(alice).await;
        registry.attach(bob).await;

        let dispatcher = Dispatcher::new(registry);
        let report = dispatcher.dispatch(&job_for("alice", "J1")).await.unwrap();
        assert_eq!(report, DispatchReport { delivered: 1, failed: 0 });

        let frame = alice_rx.try_recv().expect("alice receives frame");
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["job_id"], "J1");
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_job_event_without_session_is_dropped() {
        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = Dispatcher::new(registry);
        let report = dispatcher.dispatch(&job_for("nobody", "J1")).await.unwrap();
        assert_eq!(report, DispatchReport::default());
    }

    #[tokio::test]
    async fn test_client_event_reaches_every_session() {
        let registry = Arc::new(SessionRegistry::new());
        let mut receivers = Vec::new();
        for name in ["alice", "bob", "carol"] {
            let (s, rx) = Session::new(name, 4);
            registry.attach(s).await;
            receivers.push(rx);
        }

        let dispatcher = Dispatcher::new(registry);
        let report = dispatcher.dispatch(&client_event()).await.unwrap();
        assert_eq!(report.delivered, 3);

        for rx in &mut receivers {
            let frame = rx.try_recv().expect("each session receives the broadcast");
            assert!(frame.contains(r#""kind":"client""#));
        }
    }

    #[tokio::test]
    async fn test_broadcast_with_no_sessions_is_noop() {
        let dispatcher = Dispatcher::new(Arc::new(SessionRegistry::new()));
        let report = dispatcher.dispatch(&client_event()).await.unwrap();
        assert_eq!(report, DispatchReport::default());
    }

    #[tokio::test]
    async fn test_stalled_session_is_dropped_without_affecting_others() {
        let registry = Arc::new(SessionRegistry::new());
        let (stalled, _stalled_rx) = Session::new("stalled", 1);
        let (healthy, mut healthy_rx) = Session::new("healthy", 8);
        registry.attach(stalled.clone()).await;
        registry.attach(healthy.clone()).await;

        let dispatcher = Dispatcher::new(registry.clone());
        // First broadcast fills the stalled queue, second overflows it.
        dispatcher.dispatch(&client_event()).await.unwrap();
        let report = dispatcher.dispatch(&client_event()).await.unwrap();

        assert_eq!(report, DispatchReport { delivered: 1, failed: 1 });
        assert_eq!(stalled.close_reason(), Some(CloseReason::Unresponsive));
        assert!(registry.lookup("stalled").await.is_none());
        assert!(registry.lookup("healthy").await.is_some());

        assert!(healthy_rx.try_recv().is_ok());
        assert!(healthy_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_closed_receiver_detaches_session() {
        let registry = Arc::new(SessionRegistry::new());
        let (s, rx) = Session::new("alice", 4);
        registry.attach(s.clone()).await;
        drop(rx);

        let dispatcher = Dispatcher::new(registry.clone());
        let report = dispatcher.dispatch(&job_for("alice", "J1")).await.unwrap();
        assert_eq!(report, DispatchReport { delivered: 0, failed: 1 });
        assert!(registry.is_empty().await);
        assert_eq!(s.close_reason(), Some(CloseReason::WriteFailed));
    }

    #[tokio::test]
    async fn test_frames_arrive_in_dispatch_order() {
        let registry = Arc::new(SessionRegistry::new());
        let (s, mut rx) = Session::new("alice", 16);
        registry.attach(s).await;

        let dispatcher = Dispatcher::new(registry);
        for i in 0..10 {
            dispatcher
                .dispatch(&job_for("alice", &format!("J{i}")))
                .await
                .unwrap();
        }

        for i in 0..10 {
            let frame = rx.recv().await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
            assert_eq!(value["job_id"], format!("J{i}"));
        }
    }
}
