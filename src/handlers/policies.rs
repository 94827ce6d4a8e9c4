use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

use crate::errors::AppError;
use crate::models::CancellationPolicy;
use crate::services::lifecycle::{self, PolicyDraft};
use crate::state::AppState;

// POST /api/salons/:id/policies
pub async fn publish_policy(
    State(state): State<Arc<AppState>>,
    Path(salon_id): Path<String>,
    Json(draft): Json<PolicyDraft>,
) -> Result<(StatusCode, Json<CancellationPolicy>), AppError> {
    let policy = lifecycle::publish_policy(&state.store, &salon_id, draft, Utc::now())?;
    Ok((StatusCode::CREATED, Json(policy)))
}
