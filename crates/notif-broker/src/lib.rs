//! # notif-broker
//!
//! Message broker consumer for the notification service.
//!
//! This crate provides:
//! - The [`Broker`] abstraction over a queue subscription
//! - [`AmqpBroker`] for RabbitMQ and [`MemoryBroker`] for tests
//! - The [`Consumer`] task that persists and dispatches each event, with
//!   backoff-and-reconnect when the broker connection drops

pub mod amqp;
pub mod backoff;
pub mod consumer;
pub mod source;

pub use amqp::AmqpBroker;
pub use backoff::Backoff;
pub use consumer::{Consumer, ConsumerConfig, ConsumerHandle, ConsumerState, FrameOutcome};
pub use source::{Broker, FrameStream, MemoryBroker};
