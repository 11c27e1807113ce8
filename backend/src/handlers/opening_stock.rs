//! HTTP handlers for opening stock endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::opening_stock::{
    CreateOpeningStockInput, OpeningStock, OpeningStockQuery, OpeningStockService,
};
use crate::AppState;

/// Record opening stock
pub async fn create_opening_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateOpeningStockInput>,
) -> AppResult<Json<OpeningStock>> {
    current_user.0.require("opening_stock", "create")?;
    let service = OpeningStockService::new(state.db, &state.config.inventory);
    let opening = service.create(current_user.0.user_id, input).await?;
    Ok(Json(opening))
}

/// List opening stock
pub async fn list_opening_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<OpeningStockQuery>,
) -> AppResult<Json<Vec<OpeningStock>>> {
    let service = OpeningStockService::new(state.db, &state.config.inventory);
    let records = service.list(query).await?;
    Ok(Json(records))
}

/// Delete opening stock
pub async fn delete_opening_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(opening_stock_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require("opening_stock", "delete")?;
    let service = OpeningStockService::new(state.db, &state.config.inventory);
    service
        .delete(current_user.0.user_id, opening_stock_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
