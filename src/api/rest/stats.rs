//! Statistics and settings endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::{ApiError, ApiResponse};
use crate::api::state::AppState;
use crate::stats::GranularitySpec;
use crate::types::Bucket;

/// Response for POST /api/settings/reset
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub server_label: String,
}

/// GET /api/granularities - Configured granularity definitions
pub async fn list_granularities(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<GranularitySpec>>> {
    let specs = state.pipeline.granularities().to_vec();
    Json(ApiResponse::new(specs, state.current_sequence_id()))
}

/// GET /api/stats/:granularity - Current bucket for one granularity
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(granularity): Path<String>,
) -> Result<Json<ApiResponse<Bucket>>, ApiError> {
    let bucket = state
        .pipeline
        .series(&granularity)
        .map_err(|e| ApiError::not_found(e.to_string()))?;

    Ok(Json(ApiResponse::new(
        Bucket::clone(&bucket),
        state.current_sequence_id(),
    )))
}

/// POST /api/settings/reset - Restore configured settings
///
/// Publishes `settings_reset`, which forces every cached bucket to recompute.
pub async fn reset_settings(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ResetResponse>> {
    let sequence_id = state.pipeline.reset_settings();
    Json(ApiResponse::new(
        ResetResponse {
            server_label: state.pipeline.server_label(),
        },
        sequence_id,
    ))
}
