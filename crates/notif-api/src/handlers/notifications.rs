//! Notification history queries.
//!
//! Pagination defaults and clamps are applied here; the store trusts the
//! window it is given. An unknown `status` or `priority` value matches no
//! stored row, so it yields an empty page without touching the store.

use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use tracing::debug;

use notif_core::{
    ClientNotificationQuery, JobStatus, NotificationPage, PageRequest, Priority,
    StoredNotification, UserNotificationQuery,
};

use crate::error::ApiError;
use crate::query_types::{non_blank, ClientNotificationsParams, UserNotificationsParams};
use crate::state::AppState;

pub const USERNAME_REQUIRED: &str = "username query param is required";

/// One page of notification history.
#[derive(Debug, Serialize)]
pub struct NotificationPageResponse {
    pub items: Vec<StoredNotification>,
    pub page: u32,
    pub page_size: u32,
    /// Number of rows matching the filter across all pages.
    pub total: i64,
}

impl NotificationPageResponse {
    fn new(page: NotificationPage, window: PageRequest) -> Self {
        Self {
            items: page.items,
            page: window.page,
            page_size: window.page_size,
            total: page.total,
        }
    }
}

/// `GET /api/v1/notifications?username=&status=&page=&pageSize=`
pub async fn list_user_notifications(
    State(state): State<AppState>,
    Query(params): Query<UserNotificationsParams>,
) -> Result<Json<NotificationPageResponse>, ApiError> {
    let Some(username) = non_blank(params.username) else {
        if non_blank(params.user_id).is_some() {
            return Err(ApiError::BadRequest(format!(
                "{USERNAME_REQUIRED} (userId is not supported)"
            )));
        }
        return Err(ApiError::BadRequest(USERNAME_REQUIRED.to_string()));
    };

    let window = PageRequest::clamped(params.page.get(), params.page_size.get());
    let mut query = UserNotificationQuery::new(username).with_page(window);

    if let Some(status) = non_blank(params.status) {
        match status.parse::<JobStatus>() {
            Ok(status) => query = query.with_status(status),
            Err(_) => {
                debug!(subsystem = "api", status = %status, "Unknown job status filter");
                return Ok(Json(NotificationPageResponse::new(
                    NotificationPage::empty(),
                    window,
                )));
            }
        }
    }

    let page = state.store.query_user(&query).await?;
    Ok(Json(NotificationPageResponse::new(page, window)))
}

/// `GET /api/v1/notifications/client?name=&priority=&page=&pageSize=`
pub async fn list_client_notifications(
    State(state): State<AppState>,
    Query(params): Query<ClientNotificationsParams>,
) -> Result<Json<NotificationPageResponse>, ApiError> {
    let window = PageRequest::clamped(params.page.get(), params.page_size.get());
    let mut query = ClientNotificationQuery::new().with_page(window);

    if let Some(name) = non_blank(params.name) {
        query = query.with_name(name);
    }
    if let Some(priority) = non_blank(params.priority) {
        match priority.parse::<Priority>() {
            Ok(priority) => query = query.with_priority(priority),
            Err(_) => {
                debug!(subsystem = "api", priority = %priority, "Unknown priority filter");
                return Ok(Json(NotificationPageResponse::new(
                    NotificationPage::empty(),
                    window,
                )));
            }
        }
    }

    let page = state.store.query_clients(&query).await?;
    Ok(Json(NotificationPageResponse::new(page, window)))
}
