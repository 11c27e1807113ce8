//! HTTP handlers for stock ledger endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::ledger::{
    LedgerQuery, LedgerService, LocationBalance, StockBalance, StockCacheDrift, StockCountInput,
    StockCountResult, StockLedgerEntry,
};
use crate::AppState;

/// Balance of an item at a location
pub async fn get_stock_balance(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((item_id, location_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<StockBalance>> {
    let service = LedgerService::new(state.db, &state.config.inventory);
    let balance = service.get_balance(item_id, location_id).await?;
    Ok(Json(balance))
}

/// Balances of an item at every location
pub async fn get_item_balances(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Vec<LocationBalance>>> {
    let service = LedgerService::new(state.db, &state.config.inventory);
    let balances = service.balances_by_location(item_id).await?;
    Ok(Json(balances))
}

/// Ledger movement history
pub async fn list_ledger_entries(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<LedgerQuery>,
) -> AppResult<Json<Vec<StockLedgerEntry>>> {
    let service = LedgerService::new(state.db, &state.config.inventory);
    let entries = service.history(query).await?;
    Ok(Json(entries))
}

/// Record a physical stock count
pub async fn record_stock_count(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<StockCountInput>,
) -> AppResult<Json<StockCountResult>> {
    current_user.0.require("ledger", "adjust")?;
    let service = LedgerService::new(state.db, &state.config.inventory);
    let result = service.record_stock_count(current_user.0.user_id, input).await?;
    Ok(Json(result))
}

/// Items whose cached stock differs from the ledger
pub async fn get_cache_drift(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<StockCacheDrift>>> {
    let service = LedgerService::new(state.db, &state.config.inventory);
    let drift = service.cache_drift_report().await?;
    Ok(Json(drift))
}

#[derive(Serialize)]
pub struct RefreshCacheResponse {
    pub items_corrected: u64,
}

/// Recompute the stock cache from the ledger
pub async fn refresh_stock_cache(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<RefreshCacheResponse>> {
    current_user.0.require("ledger", "reconcile")?;
    let service = LedgerService::new(state.db, &state.config.inventory);
    let items_corrected = service.refresh_stock_cache().await?;
    Ok(Json(RefreshCacheResponse { items_corrected }))
}
