//! HTTP handlers for production batch endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::production::{
    BatchQuery, CompleteBatchInput, CreateBatchInput, ProductionBatch, ProductionService,
};
use crate::AppState;

/// Plan a production batch
pub async fn create_production_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateBatchInput>,
) -> AppResult<Json<ProductionBatch>> {
    current_user.0.require("production", "create")?;
    let service = ProductionService::new(state.db, &state.config.inventory);
    let batch = service.create_batch(current_user.0.user_id, input).await?;
    Ok(Json(batch))
}

/// Complete a batch
pub async fn complete_production_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
    Json(input): Json<CompleteBatchInput>,
) -> AppResult<Json<ProductionBatch>> {
    current_user.0.require("production", "complete")?;
    let service = ProductionService::new(state.db, &state.config.inventory);
    let batch = service
        .complete_batch(current_user.0.user_id, batch_id, input)
        .await?;
    Ok(Json(batch))
}

/// Get a batch
pub async fn get_production_batch(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<ProductionBatch>> {
    let service = ProductionService::new(state.db, &state.config.inventory);
    let batch = service.get_batch(batch_id).await?;
    Ok(Json(batch))
}

/// List batches
pub async fn list_production_batches(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<BatchQuery>,
) -> AppResult<Json<Vec<ProductionBatch>>> {
    let service = ProductionService::new(state.db, &state.config.inventory);
    let batches = service.list_batches(query).await?;
    Ok(Json(batches))
}
