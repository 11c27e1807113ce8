//! HTTP handlers for goods received note endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::grn::{CreateGrnInput, Grn, GrnDetail, GrnQuery, GrnService, LastPurchase};
use crate::AppState;

/// Receive goods
pub async fn create_grn(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateGrnInput>,
) -> AppResult<Json<GrnDetail>> {
    current_user.0.require("grn", "create")?;
    let service = GrnService::new(state.db, &state.config.inventory);
    let grn = service.create(current_user.0.user_id, input).await?;
    Ok(Json(grn))
}

/// Get a GRN with its lines
pub async fn get_grn(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(grn_id): Path<Uuid>,
) -> AppResult<Json<GrnDetail>> {
    let service = GrnService::new(state.db, &state.config.inventory);
    let grn = service.get(grn_id).await?;
    Ok(Json(grn))
}

/// List GRNs
pub async fn list_grns(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<GrnQuery>,
) -> AppResult<Json<Vec<Grn>>> {
    let service = GrnService::new(state.db, &state.config.inventory);
    let grns = service.list(query).await?;
    Ok(Json(grns))
}

/// Last purchase cost of an item
pub async fn get_last_purchase(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<LastPurchase>> {
    let service = GrnService::new(state.db, &state.config.inventory);
    let purchase = service.last_purchase(item_id).await?;
    Ok(Json(purchase))
}
