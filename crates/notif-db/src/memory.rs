//! In-memory notification store.
//!
//! Used by tests and by `STORE_BACKEND=memory` deployments. Rows live in a
//! single vector behind a readers-writer lock; ids are assigned from a
//! counter so they are monotone in insertion order.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use notif_core::{
    ClientNotificationQuery, Error, Event, NotificationPage, NotificationRepository, PageRequest,
    Result, StoredNotification, UserNotificationQuery,
};

/// Process-local notification log.
#[derive(Debug, Default)]
pub struct MemoryNotificationRepository {
    rows: RwLock<Vec<StoredNotification>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl MemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while set, every operation fails with
    /// `DependencyDown`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of persisted rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::DependencyDown(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    /// Newest first; id breaks ties between equal timestamps.
    async fn select<F>(&self, page: PageRequest, filter: F) -> NotificationPage
    where
        F: Fn(&Event) -> bool,
    {
        let rows = self.rows.read().await;
        let mut matching: Vec<&StoredNotification> =
            rows.iter().filter(|row| filter(&row.event)).collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        NotificationPage { items, total }
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn insert(&self, event: &Event) -> Result<i64> {
        self.check_available()?;
        event.validate()?;

        let mut rows = self.rows.write().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        rows.push(StoredNotification {
            id,
            created_at: Utc::now(),
            event: event.clone(),
        });

        debug!(
            subsystem = "db",
            component = "memory",
            op = "insert",
            event_kind = %event.kind(),
            notification_id = id,
            "Notification persisted"
        );
        Ok(id)
    }

    async fn query_user(&self, query: &UserNotificationQuery) -> Result<NotificationPage> {
        self.check_available()?;
        Ok(self
            .select(query.page, |event| match event {
                Event::Job(job) => {
                    job.username == query.username
                        && query.status.map_or(true, |s| job.job_status == s)
                }
                Event::Client(_) => false,
            })
            .await)
    }

    async fn query_clients(&self, query: &ClientNotificationQuery) -> Result<NotificationPage> {
        self.check_available()?;
        let needle = query.name.as_ref().map(|n| n.to_lowercase());
        Ok(self
            .select(query.page, |event| match event {
                Event::Client(client) => {
                    needle
                        .as_ref()
                        .map_or(true, |n| client.client_name.to_lowercase().contains(n.as_str()))
                        && query.priority.map_or(true, |p| client.priority == p)
                }
                Event::Job(_) => false,
            })
            .await)
    }
}
