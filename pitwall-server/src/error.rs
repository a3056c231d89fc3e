//! API error type

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pitwall_core::error::{ParseCarIdError, SessionError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<ParseCarIdError> for ApiError {
    fn from(e: ParseCarIdError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Session(SessionError::UnknownCar(_)) => StatusCode::NOT_FOUND,
            ApiError::Session(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
