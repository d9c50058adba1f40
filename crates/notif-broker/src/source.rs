//! Broker abstraction.
//!
//! A [`Broker`] turns a queue name into a stream of raw frame bodies. The
//! stream ending, or yielding an error, means the connection was lost; the
//! consumer then reconnects by calling [`Broker::subscribe`] again.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use notif_core::{Error, Result};

/// Frame bodies delivered by a subscription, in queue order.
pub type FrameStream = BoxStream<'static, Result<Vec<u8>>>;

/// A message broker the consumer can subscribe to.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Connect and start consuming `queue` with auto-ack semantics.
    async fn subscribe(&self, queue: &str) -> Result<FrameStream>;
}

#[derive(Debug, Default)]
struct MemoryQueue {
    pending: VecDeque<Vec<u8>>,
    consumer: Option<mpsc::UnboundedSender<Result<Vec<u8>>>>,
}

#[derive(Debug, Default)]
struct MemoryBrokerState {
    queues: HashMap<String, MemoryQueue>,
    fail_connects: usize,
    subscriptions: usize,
}

/// Process-local broker.
///
/// Frames published while no consumer is attached wait in the queue. Only the
/// most recent subscription on a queue receives frames.
#[derive(Debug, Default)]
pub struct MemoryBroker {
    state: Mutex<MemoryBrokerState>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryBrokerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue a frame body on `queue`.
    pub fn publish(&self, queue: &str, body: impl Into<Vec<u8>>) {
        let body = body.into();
        let mut state = self.lock();
        let q = state.queues.entry(queue.to_string()).or_default();
        if let Some(tx) = &q.consumer {
            match tx.send(Ok(body)) {
                Ok(()) => return,
                Err(mpsc::error::SendError(Ok(body))) => {
                    q.consumer = None;
                    q.pending.push_back(body);
                }
                Err(_) => q.consumer = None,
            }
        } else {
            q.pending.push_back(body);
        }
    }

    /// Drop every live subscription as if the connection were reset.
    ///
    /// Each subscriber sees one error and then the end of its stream.
    pub fn disconnect(&self) {
        let mut state = self.lock();
        for q in state.queues.values_mut() {
            if let Some(tx) = q.consumer.take() {
                let _ = tx.send(Err(Error::Broker("connection reset by broker".to_string())));
            }
        }
    }

    /// Make the next `n` subscribe calls fail as unreachable.
    pub fn fail_next_connects(&self, n: usize) {
        self.lock().fail_connects = n;
    }

    /// Number of successful subscriptions so far.
    pub fn subscriptions(&self) -> usize {
        self.lock().subscriptions
    }

    /// Frames waiting on `queue` for a consumer.
    pub fn pending(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.pending.len())
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn subscribe(&self, queue: &str) -> Result<FrameStream> {
        let mut state = self.lock();
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(Error::DependencyDown("broker unreachable".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let q = state.queues.entry(queue.to_string()).or_default();
        while let Some(body) = q.pending.pop_front() {
            let _ = tx.send(Ok(body));
        }
        q.consumer = Some(tx);
        state.subscriptions += 1;

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}
