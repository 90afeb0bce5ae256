//! Record endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::{ApiError, ApiResponse, PaginationParams};
use crate::api::state::AppState;
use crate::error::{StoreError, StoreResult};
use crate::pipeline::QueryLogPipeline;
use crate::types::{Record, RowId, UserOverrideStatus};

/// Request body for PATCH /api/records/:row_id
#[derive(Debug, Deserialize)]
pub struct UpdateRecordBody {
    pub user_status: UserOverrideStatus,
}

/// Response for mutations that touch one row
#[derive(Debug, Serialize)]
pub struct RowChange {
    pub row_id: RowId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_status: Option<UserOverrideStatus>,
}

fn store_failure(e: StoreError) -> ApiError {
    error!(error = %e, "query log operation failed");
    ApiError::internal(e.to_string())
}

/// Run a store mutation on the blocking pool
async fn blocking<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&QueryLogPipeline) -> StoreResult<T> + Send + 'static,
{
    let pipeline = state.pipeline.clone();
    tokio::task::spawn_blocking(move || op(&pipeline))
        .await
        .map_err(|e| {
            error!(error = %e, "query log worker failed");
            ApiError::internal(e.to_string())
        })?
        .map_err(store_failure)
}

/// GET /api/records - Stored records, newest first
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<Vec<Record>>>, ApiError> {
    let records = state.pipeline.records().map_err(store_failure)?;
    let total = records.len();

    let page: Vec<Record> = records
        .into_iter()
        .rev()
        .skip(params.offset)
        .take(params.normalized_limit())
        .collect();

    Ok(Json(ApiResponse::with_total(
        page,
        state.current_sequence_id(),
        total,
    )))
}

/// DELETE /api/records - Remove every stored record
pub async fn clear_records(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    blocking(&state, |pipeline| pipeline.clear_log()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/records/:row_id - Set one row's user override
pub async fn update_record(
    State(state): State<Arc<AppState>>,
    Path(row_id): Path<u64>,
    Json(body): Json<UpdateRecordBody>,
) -> Result<impl IntoResponse, ApiError> {
    let row_id = RowId(row_id);
    let status = body.user_status;
    let found = blocking(&state, move |pipeline| {
        pipeline.set_user_status(row_id, status)
    })
    .await?;

    if !found {
        return Err(ApiError::not_found(format!("Record '{}' not found", row_id)));
    }

    Ok(Json(ApiResponse::new(
        RowChange {
            row_id,
            user_status: Some(body.user_status),
        },
        state.current_sequence_id(),
    )))
}

/// DELETE /api/records/:row_id - Delete one row
pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path(row_id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let row_id = RowId(row_id);
    let found = blocking(&state, move |pipeline| pipeline.delete_record(row_id)).await?;

    if !found {
        return Err(ApiError::not_found(format!("Record '{}' not found", row_id)));
    }

    Ok(Json(ApiResponse::new(
        RowChange {
            row_id,
            user_status: None,
        },
        state.current_sequence_id(),
    )))
}
