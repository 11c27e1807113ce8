//! HTTP handlers for bill of materials endpoints

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
use crate::services::bom::{BomLine, BomService, MaterialPlan, SetBomInput};
use crate::AppState;

/// Replace the BOM of a finished item
pub async fn set_bom(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<SetBomInput>,
) -> AppResult<Json<Vec<BomLine>>> {
    current_user.0.require("bom", "update")?;
    let service = BomService::new(state.db);
    let lines = service.set_components(item_id, input).await?;
    Ok(Json(lines))
}

/// Get the BOM of a finished item
pub async fn get_bom(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Vec<BomLine>>> {
    let service = BomService::new(state.db);
    let lines = service.get(item_id).await?;
    Ok(Json(lines))
}

#[derive(Debug, Deserialize)]
pub struct RequirementsQuery {
    pub units: Decimal,
}

/// Materials needed for a production quantity
pub async fn get_bom_requirements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Query(query): Query<RequirementsQuery>,
) -> AppResult<Json<MaterialPlan>> {
    let service = BomService::new(state.db);
    let plan = service.requirements(item_id, query.units).await?;
    Ok(Json(plan))
}

/// Remove a component from a BOM
pub async fn remove_bom_component(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((item_id, component_item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    current_user.0.require("bom", "update")?;
    let service = BomService::new(state.db);
    service.remove_component(item_id, component_item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
