//! Reservation CRUD — /api/v1/reservations
//!
//! Validation of the closed enumerations (weekday, time format, center,
//! class) happens here at the edge; everything past this file trusts the
//! stored values.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::http::{api_error, require_user, ApiError};
use gymbot_core::{catalog, ClassTime, Weekday};
use gymbot_store::{NewReservation, Reservation, StoreError};

#[derive(Deserialize)]
pub struct CreateReservationRequest {
    pub weekday: String,
    /// "HH:MM"
    pub time: String,
    /// Public center name, e.g. "platero".
    pub center: String,
    pub class_name: String,
}

#[derive(Serialize)]
pub struct ReservationView {
    pub id: String,
    pub weekday: String,
    pub time: String,
    pub center: String,
    pub class_name: String,
    pub active: bool,
    pub confirmed: bool,
    pub confirmed_at: Option<String>,
}

impl ReservationView {
    fn from(reservation: &Reservation) -> Self {
        Self {
            id: reservation.id.clone(),
            weekday: reservation.weekday.to_string(),
            time: reservation.time.to_string(),
            center: reservation.center.clone(),
            class_name: reservation.class_name.clone(),
            active: reservation.active,
            confirmed: reservation.is_confirmed(Utc::now()),
            confirmed_at: reservation.confirmed_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

#[derive(Serialize)]
pub struct CreateReservationResponse {
    pub message: String,
    pub reservation: ReservationView,
    /// When the standing weekly trigger fires next.
    pub next_fire: String,
}

#[derive(Serialize)]
pub struct ReservationListResponse {
    pub reservations: Vec<ReservationView>,
}

#[derive(Deserialize)]
pub struct UpdateReservationRequest {
    pub active: bool,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Load a reservation and check it belongs to the caller.
fn owned_reservation(
    state: &AppState,
    user_id: &str,
    reservation_id: &str,
) -> Result<Reservation, ApiError> {
    let reservation = match state.store.reservation(reservation_id) {
        Ok(r) => r,
        Err(StoreError::ReservationNotFound { .. }) => {
            return Err(api_error(StatusCode::NOT_FOUND, "reservation not found"))
        }
        Err(e) => return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    };
    if reservation.user_id != user_id {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "reservation belongs to another user",
        ));
    }
    Ok(reservation)
}

/// POST /api/v1/reservations — create a slot and wire up its scheduling.
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateReservationRequest>,
) -> Result<Json<CreateReservationResponse>, ApiError> {
    let user_id = require_user(&state, &headers)?;

    let weekday: Weekday = req
        .weekday
        .parse()
        .map_err(|e: gymbot_core::CoreError| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let time: ClassTime = req
        .time
        .parse()
        .map_err(|e: gymbot_core::CoreError| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let center = catalog::resolve_center(&req.center)
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    catalog::validate_class(&req.class_name)
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let reservation = state
        .store
        .create_reservation(&NewReservation {
            user_id: user_id.clone(),
            weekday,
            time,
            center: center.to_string(),
            class_name: req.class_name.clone(),
        })
        .map_err(|e| match e {
            StoreError::DuplicateReservation => api_error(StatusCode::CONFLICT, e.to_string()),
            other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        })?;

    let summary = state
        .lifecycle
        .on_create(&reservation)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    info!(reservation_id = %reservation.id, user_id = %user_id, "reservation created");
    // Re-read: the immediate path may already have confirmed the first class.
    let reservation = state
        .store
        .reservation(&reservation.id)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(CreateReservationResponse {
        message: "reservation created".to_string(),
        reservation: ReservationView::from(&reservation),
        next_fire: summary.next_fire.to_rfc3339(),
    }))
}

/// GET /api/v1/reservations — the caller's reservations.
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ReservationListResponse>, ApiError> {
    let user_id = require_user(&state, &headers)?;
    let reservations = state
        .store
        .reservations_for_user(&user_id)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(ReservationListResponse {
        reservations: reservations.iter().map(ReservationView::from).collect(),
    }))
}

/// PUT /api/v1/reservations/{id} — pause or resume.
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateReservationRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = require_user(&state, &headers)?;
    owned_reservation(&state, &user_id, &id)?;

    state
        .lifecycle
        .on_toggle_active(&id, req.active)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(MessageResponse {
        message: "reservation updated".to_string(),
    }))
}

#[derive(Serialize)]
pub struct LogView {
    pub reservation_id: Option<String>,
    pub message: String,
    pub created_at: String,
}

/// GET /api/v1/logs — the caller's booking audit trail, oldest first.
pub async fn logs_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<LogView>>, ApiError> {
    let user_id = require_user(&state, &headers)?;
    let logs = state
        .store
        .logs_for_user(&user_id)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(
        logs.into_iter()
            .map(|entry| LogView {
                reservation_id: entry.reservation_id,
                message: entry.message,
                created_at: entry.created_at,
            })
            .collect(),
    ))
}

/// DELETE /api/v1/reservations/{id} — remove the trigger, the upstream
/// booking (best-effort) and the row.
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = require_user(&state, &headers)?;
    owned_reservation(&state, &user_id, &id)?;

    state
        .lifecycle
        .on_delete(&id)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(MessageResponse {
        message: "reservation deleted".to_string(),
    }))
}
