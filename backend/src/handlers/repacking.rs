//! HTTP handlers for repacking endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::repacking::{
    AllocationPreview, CreateRepackingInput, RepackingAvailability, RepackingQuery,
    RepackingRecord, RepackingService,
};
use crate::AppState;

/// Record a repack
pub async fn create_repacking(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateRepackingInput>,
) -> AppResult<Json<RepackingRecord>> {
    current_user.0.require("repacking", "create")?;
    let service = RepackingService::new(state.db, &state.config.inventory);
    let record = service.create(current_user.0.user_id, input).await?;
    Ok(Json(record))
}

/// List repacking records
pub async fn list_repacking(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<RepackingQuery>,
) -> AppResult<Json<Vec<RepackingRecord>>> {
    let service = RepackingService::new(state.db, &state.config.inventory);
    let records = service.list(query).await?;
    Ok(Json(records))
}

/// Get a repacking record
pub async fn get_repacking(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(repacking_id): Path<Uuid>,
) -> AppResult<Json<RepackingRecord>> {
    let service = RepackingService::new(state.db, &state.config.inventory);
    let record = service.get(repacking_id).await?;
    Ok(Json(record))
}

/// Query parameters for repacked stock lookups
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub quantity: Option<Decimal>,
}

/// Unconsumed repacked stock for an item at a location
pub async fn get_repacking_availability(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<RepackingAvailability>> {
    let service = RepackingService::new(state.db, &state.config.inventory);
    let availability = service.availability(query.item_id, query.location_id).await?;
    Ok(Json(availability))
}

/// Which records a consumption would draw from
pub async fn preview_repacking_allocation(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<AllocationPreview>> {
    let service = RepackingService::new(state.db, &state.config.inventory);
    let preview = service
        .preview_allocation(
            query.item_id,
            query.location_id,
            query.quantity.unwrap_or(Decimal::ZERO),
        )
        .await?;
    Ok(Json(preview))
}

/// Delete an untouched repacking record
pub async fn delete_repacking(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(repacking_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require("repacking", "delete")?;
    let service = RepackingService::new(state.db, &state.config.inventory);
    service.delete(current_user.0.user_id, repacking_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
