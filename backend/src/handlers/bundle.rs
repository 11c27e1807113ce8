//! HTTP handlers for bundle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::bundle::{Bundle, BundleDetail, BundleQuery, BundleService, CreateBundleInput};
use crate::AppState;

/// Create bundles
pub async fn create_bundle(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateBundleInput>,
) -> AppResult<Json<BundleDetail>> {
    current_user.0.require("bundles", "create")?;
    let service = BundleService::new(state.db, &state.config.inventory);
    let bundle = service.create(current_user.0.user_id, input).await?;
    Ok(Json(bundle))
}

/// List bundles
pub async fn list_bundles(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<BundleQuery>,
) -> AppResult<Json<Vec<Bundle>>> {
    let service = BundleService::new(state.db, &state.config.inventory);
    let bundles = service.list(query).await?;
    Ok(Json(bundles))
}

/// Get a bundle with its materials
pub async fn get_bundle(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(bundle_id): Path<Uuid>,
) -> AppResult<Json<BundleDetail>> {
    let service = BundleService::new(state.db, &state.config.inventory);
    let bundle = service.get(bundle_id).await?;
    Ok(Json(bundle))
}

/// Delete a bundle and give its source packs back
pub async fn delete_bundle(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bundle_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require("bundles", "delete")?;
    let service = BundleService::new(state.db, &state.config.inventory);
    service.delete(current_user.0.user_id, bundle_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
