//! Maps the core's [`LaloError`] taxonomy onto HTTP responses (spec §6/§7:
//! "the Handler maps them to HTTP status codes per §6 and to a stable
//! `{kind, message}` payload").

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lalo_kernel::error::LaloError;
use serde_json::json;

/// Thin wrapper so `LaloError` (defined in `lalo-kernel`, which knows
/// nothing about HTTP) can implement axum's `IntoResponse` here at the
/// boundary. Most handlers build one via `From<LaloError>`; a few facade
/// concerns (e.g. `POST /ai/feedback`'s unknown `response_id`) have no
/// corresponding [`LaloError`] variant and construct one directly with
/// [`ApiError::not_found`].
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    kind: String,
    message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: "not_found".to_string(),
            message: message.into(),
        }
    }
}

impl From<LaloError> for ApiError {
    fn from(err: LaloError) -> Self {
        Self {
            status: StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "kind": self.kind,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
