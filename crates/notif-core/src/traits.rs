//! Core traits for notification storage.
//!
//! The store is injected into the broker consumer and the query endpoints as
//! `Arc<dyn NotificationRepository>`, so the PostgreSQL and in-memory
//! implementations are interchangeable.

use async_trait::async_trait;

use crate::error::Result;
use crate::events::Event;
use crate::models::{ClientNotificationQuery, NotificationPage, UserNotificationQuery};

/// Append-only notification log.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Persist an event and return its surrogate id.
    ///
    /// Fails with `InvalidEvent` if the event violates the model invariants
    /// and with `DependencyDown` if the backing store is unreachable. After
    /// success, a matching query returns the row.
    async fn insert(&self, event: &Event) -> Result<i64>;

    /// Job events owned by `query.username`, newest first (id breaks ties).
    async fn query_user(&self, query: &UserNotificationQuery) -> Result<NotificationPage>;

    /// Client events matching the optional name/priority filters, newest first.
    async fn query_clients(&self, query: &ClientNotificationQuery) -> Result<NotificationPage>;
}
