use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::slots::{compute_available_slots, Slot, SlotQuery};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SlotParams {
    pub date: NaiveDate,
    pub service_id: String,
    pub step: Option<u32>,
}

// GET /api/professionals/:id/slots
pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<String>,
    Query(params): Query<SlotParams>,
) -> Result<Json<Vec<Slot>>, AppError> {
    let query = SlotQuery {
        professional_id,
        date: params.date,
        service_id: params.service_id,
        step_minutes: params.step,
        not_before: Some(Utc::now()),
    };

    let slots = compute_available_slots(&state.store, &query)?;
    Ok(Json(slots))
}
