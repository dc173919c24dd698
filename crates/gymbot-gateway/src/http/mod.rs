pub mod health;
pub mod login;
pub mod reservations;

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;

use crate::app::AppState;

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Resolve the calling user from the bearer token, or fail with 401.
pub fn require_user(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    crate::auth::bearer(headers)
        .and_then(|token| state.auth.verify(token))
        .ok_or_else(|| {
            api_error(
                StatusCode::UNAUTHORIZED,
                "Unauthorized. Set 'Authorization: Bearer <your-token>' header.",
            )
        })
}
