//! HTTP handlers for price list endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::price_list::{
    CreatePriceListInput, PriceList, PriceListDetail, PriceListItem, PriceListService,
    PriceLookup, SetPriceInput,
};
use crate::AppState;

/// Create a price list
pub async fn create_price_list(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePriceListInput>,
) -> AppResult<Json<PriceList>> {
    current_user.0.require("price_lists", "update")?;
    let service = PriceListService::new(state.db);
    let list = service.create(input).await?;
    Ok(Json(list))
}

/// List price lists
pub async fn list_price_lists(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<PriceList>>> {
    let service = PriceListService::new(state.db);
    let lists = service.list().await?;
    Ok(Json(lists))
}

/// Get a price list with its prices
pub async fn get_price_list(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(price_list_id): Path<Uuid>,
) -> AppResult<Json<PriceListDetail>> {
    let service = PriceListService::new(state.db);
    let list = service.get(price_list_id).await?;
    Ok(Json(list))
}

/// Set an item's price on a list
pub async fn set_item_price(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(price_list_id): Path<Uuid>,
    Json(input): Json<SetPriceInput>,
) -> AppResult<Json<PriceListItem>> {
    current_user.0.require("price_lists", "update")?;
    let service = PriceListService::new(state.db);
    let price = service.set_price(price_list_id, input).await?;
    Ok(Json(price))
}

/// Remove an item's price from a list
pub async fn remove_item_price(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((price_list_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    current_user.0.require("price_lists", "update")?;
    let service = PriceListService::new(state.db);
    service.remove_price(price_list_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct PriceLookupQuery {
    pub item_id: Uuid,
    pub price_list_id: Option<Uuid>,
}

/// Look up an item's price
pub async fn lookup_price(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<PriceLookupQuery>,
) -> AppResult<Json<PriceLookup>> {
    let service = PriceListService::new(state.db);
    let price = service.lookup(query.item_id, query.price_list_id).await?;
    Ok(Json(price))
}
