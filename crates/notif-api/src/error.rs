//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Handler error, rendered as `{"error": "<message>"}`.
#[derive(Debug)]
pub enum ApiError {
    /// A store or internal failure (500).
    Internal(notif_core::Error),
    BadRequest(String),
    /// The request needs a WebSocket upgrade it did not ask for.
    UpgradeRequired(String),
}

impl From<notif_core::Error> for ApiError {
    fn from(err: notif_core::Error) -> Self {
        match err {
            notif_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Internal(err) => {
                tracing::error!(subsystem = "api", error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::UpgradeRequired(msg) => (StatusCode::UPGRADE_REQUIRED, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_is_500() {
        let err: ApiError = notif_core::Error::DependencyDown("db down".into()).into();
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_input_is_400() {
        let err: ApiError = notif_core::Error::InvalidInput("bad".into()).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
