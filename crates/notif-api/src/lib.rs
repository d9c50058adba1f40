//! # notif-api
//!
//! HTTP and WebSocket surface of the notification service.
//!
//! - `GET /api/v1/health`
//! - `GET /api/v1/notifications` (job history for one user)
//! - `GET /api/v1/notifications/client` (fleet-wide client history)
//! - `GET /ws` (live session, upgrade)
//!
//! The older `/api/v1/notif/jobs` and `/api/v1/notif/clients` paths are kept
//! as aliases of the two query routes.

pub mod config;
pub mod error;
pub mod handlers;
pub mod query_types;
pub mod state;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub use config::{cors_layer, parse_allowed_origins, ServerConfig, StoreBackend};
pub use error::ApiError;
pub use state::AppState;

/// UUIDv7 request ids: time-ordered, so they sort with the logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router.
pub fn router(state: AppState, allowed_origins: Vec<HeaderValue>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .route("/api/v1/notifications", get(handlers::list_user_notifications))
        .route(
            "/api/v1/notifications/client",
            get(handlers::list_client_notifications),
        )
        // Paths used by the first front-end release
        .route("/api/v1/notif/jobs", get(handlers::list_user_notifications))
        .route("/api/v1/notif/clients", get(handlers::list_client_notifications))
        .route("/ws", get(handlers::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}
