//! HTTP and WebSocket handlers for notif-api.

pub mod health;
pub mod notifications;
pub mod ws;

pub use health::health_check;
pub use notifications::{list_client_notifications, list_user_notifications, NotificationPageResponse};
pub use ws::ws_handler;
