//! # notif-core
//!
//! Core types, traits, and in-memory fan-out for the notification service.
//!
//! This crate provides:
//! - The [`Event`] model shared by the broker consumer, the store and the
//!   WebSocket sessions
//! - The [`NotificationRepository`] trait implemented by `notif-db`
//! - The [`SessionRegistry`] of live end-user sessions
//! - The [`Dispatcher`] that routes events to sessions (unicast for job
//!   events, broadcast for client events)
//!
//! ## Logging
//!
//! Every crate logs through `tracing` with the same structured field names:
//! `subsystem` (`api`, `broker`, `db`, `dispatch`, `session`), `component`,
//! `op`, `username`, `session_id`, `event_kind`, `notification_id`, `queue`,
//! `duration_ms`.
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Malformed broker frame, store unreachable, fatal broker failure |
//! | WARN  | Invalid event dropped, broker reconnecting, session write failure |
//! | INFO  | Lifecycle events (startup, shutdown), session attach/detach |
//! | DEBUG | Routing decisions, persisted notification ids |
//! | TRACE | Per-recipient broadcast writes |

pub mod defaults;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod models;
pub mod session;
pub mod traits;

// Re-export commonly used types at crate root
pub use dispatch::{DispatchReport, Dispatcher};
pub use error::{Error, Result};
pub use events::{ClientEvent, Event, EventKind, JobEvent, JobStatus, JobType, Priority};
pub use models::*;
pub use session::{
    CloseReason, DeliveryError, OutboundFrame, Session, SessionConfig, SessionRegistry,
};
pub use traits::*;
