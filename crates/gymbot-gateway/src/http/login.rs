//! Login — POST /api/v1/login
//!
//! Credentials are the user's own account at the booking provider; there is
//! no separate gymbot password. A new or changed password is verified against
//! the provider before it overwrites the sealed copy, so a typo can't brick
//! the weekly fires.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::http::{api_error, ApiError};
use gymbot_store::StoreError;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub access_token: String,
    pub token_type: String,
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // Fast path: known user, unchanged password — no provider round-trip.
    let credential_current = match state.store.user(&req.username) {
        Ok(user) => state
            .vault
            .decrypt(&user.password_cipher)
            .is_ok_and(|stored| stored == req.password),
        Err(StoreError::UserNotFound { .. }) => false,
        Err(e) => return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    };

    if !credential_current {
        state
            .provider
            .authenticate(&req.username, &req.password)
            .await
            .map_err(|e| {
                api_error(
                    StatusCode::BAD_REQUEST,
                    format!("could not authenticate with the booking provider: {e}"),
                )
            })?;

        let cipher = state
            .vault
            .encrypt(&req.password)
            .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        state
            .store
            .upsert_user(&req.username, &cipher)
            .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        info!(user_id = %req.username, "provider credential verified and sealed");
    }

    Ok(Json(LoginResponse {
        message: "authentication successful".to_string(),
        access_token: state.auth.issue(&req.username),
        token_type: "bearer".to_string(),
    }))
}
