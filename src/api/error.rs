//! Error responses of the HTTP boundary.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// `check_join` called with the wrong shared secret.
    #[error("forbidden")]
    Forbidden,

    /// Webhook secret header missing or wrong.
    #[error("invalid webhook secret")]
    Unauthorized,

    /// The update router could not be built at startup.
    #[error("bot is not ready")]
    NotReady,
}

impl ApiError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotReady => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            Self::Forbidden => json!({ "detail": "forbidden" }),
            Self::Unauthorized => json!({ "message": "Invalid API Secret" }),
            Self::NotReady => json!({ "detail": "bot_not_ready" }),
        };
        (status, Json(body)).into_response()
    }
}
