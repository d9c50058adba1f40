//! Stored notification and query types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::events::{Event, JobStatus, Priority};

/// Persisted form of an [`Event`].
///
/// Serialized flat: `{"id":1,"created_at":"...","kind":"job","username":...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNotification {
    /// Monotone surrogate id assigned by the store.
    pub id: i64,
    /// Insertion timestamp assigned by the store.
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

/// A 1-based page window.
///
/// Construct with [`PageRequest::clamped`] at the request boundary; the store
/// trusts the values it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: defaults::FIRST_PAGE,
            page_size: defaults::PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Apply pagination defaults and clamps.
    ///
    /// - `page` absent or `< 1` resolves to 1.
    /// - `page_size` absent or outside `[1, 100]` resolves to 20.
    pub fn clamped(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = match page {
            Some(p) if p >= 1 => u32::try_from(p).unwrap_or(u32::MAX),
            _ => defaults::FIRST_PAGE,
        };
        let page_size = match page_size {
            Some(s) if (1..=i64::from(defaults::PAGE_SIZE_MAX)).contains(&s) => s as u32,
            _ => defaults::PAGE_SIZE,
        };
        Self { page, page_size }
    }

    /// Row offset of the first item on this page.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

/// Filter for the by-user query shape (job events only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotificationQuery {
    pub username: String,
    pub status: Option<JobStatus>,
    pub page: PageRequest,
}

impl UserNotificationQuery {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            status: None,
            page: PageRequest::default(),
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}

/// Filter for the fleet-wide query shape (client events only).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientNotificationQuery {
    /// Case-insensitive substring of `client_name`.
    pub name: Option<String>,
    pub priority: Option<Priority>,
    pub page: PageRequest,
}

impl ClientNotificationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}

/// One page of query results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPage {
    pub items: Vec<StoredNotification>,
    pub total: i64,
}

impl NotificationPage {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{JobEvent, JobType};

    #[test]
    fn test_page_request_defaults_when_absent() {
        assert_eq!(
            PageRequest::clamped(None, None),
            PageRequest {
                page: 1,
                page_size: 20
            }
        );
    }

    #[test]
    fn test_page_request_clamps_out_of_range_size() {
        assert_eq!(PageRequest::clamped(Some(1), Some(0)).page_size, 20);
        assert_eq!(PageRequest::clamped(Some(1), Some(-5)).page_size, 20);
        assert_eq!(PageRequest::clamped(Some(1), Some(101)).page_size, 20);
        assert_eq!(PageRequest::clamped(Some(1), Some(1)).page_size, 1);
        assert_eq!(PageRequest::clamped(Some(1), Some(100)).page_size, 100);
    }

    #[test]
    fn test_page_request_clamps_page_below_one() {
        assert_eq!(PageRequest::clamped(Some(0), None).page, 1);
        assert_eq!(PageRequest::clamped(Some(-3), None).page, 1);
        assert_eq!(PageRequest::clamped(Some(4), None).page, 4);
    }

    #[test]
    fn test_page_request_offset() {
        let page = PageRequest::clamped(Some(2), Some(3));
        assert_eq!(page.offset(), 3);
        assert_eq!(page.limit(), 3);
        assert_eq!(PageRequest::default().offset(), 0);
    }

    #[test]
    fn test_stored_notification_serializes_flat() {
        let stored = StoredNotification {
            id: 7,
            created_at: Utc::now(),
            event: Event::Job(JobEvent {
                username: "alice".to_string(),
                job_id: "J1".to_string(),
                job_status: JobStatus::Pending,
                job_type: JobType::Match,
            }),
        };
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["kind"], "job");
        assert_eq!(value["username"], "alice");
        assert!(value.get("event").is_none());

        let back: StoredNotification = serde_json::from_value(value).unwrap();
        assert_eq!(back, stored);
    }

    #[test]
    fn test_query_builders() {
        let q = UserNotificationQuery::new("alice").with_status(JobStatus::Failed);
        assert_eq!(q.status, Some(JobStatus::Failed));
        assert_eq!(q.page, PageRequest::default());

        let c = ClientNotificationQuery::new()
            .with_name("acme")
            .with_priority(Priority::High);
        assert_eq!(c.name.as_deref(), Some("acme"));
        assert_eq!(c.priority, Some(Priority::High));
    }
}
