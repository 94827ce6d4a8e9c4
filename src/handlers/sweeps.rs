use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::errors::AppError;
use crate::services::no_show::{run_sweep, SweepReport};
use crate::state::AppState;

// POST /api/sweeps
pub async fn trigger_sweep(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepReport>, AppError> {
    let report = run_sweep(&state.store, state.events.as_ref(), Utc::now()).await?;
    Ok(Json(report))
}
