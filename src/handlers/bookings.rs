use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::services::lifecycle::{self, CancelRequest, CancellationQuote, NewBooking};
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking =
        lifecycle::create_booking(&state.store, state.events.as_ref(), request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(lifecycle::get_booking(&state.store, &id)?))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
}

// POST /api/bookings/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = lifecycle::update_status(
        &state.store,
        state.events.as_ref(),
        &id,
        request.status,
        Utc::now(),
    )
    .await?;
    Ok(Json(booking))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking =
        lifecycle::cancel_booking(&state.store, state.events.as_ref(), &id, request, Utc::now())
            .await?;
    Ok(Json(booking))
}

#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub scheduled_at: DateTime<Utc>,
}

// POST /api/bookings/:id/reschedule
pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = lifecycle::reschedule_booking(
        &state.store,
        state.events.as_ref(),
        &id,
        request.scheduled_at,
        Utc::now(),
    )
    .await?;
    Ok(Json(booking))
}

// GET /api/bookings/:id/cancellation-quote
pub async fn cancellation_quote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CancellationQuote>, AppError> {
    Ok(Json(lifecycle::cancellation_quote(
        &state.store,
        &id,
        Utc::now(),
    )?))
}
