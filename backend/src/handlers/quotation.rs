//! HTTP handlers for quotation endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::quotation::{
    CreateQuotationInput, Quotation, QuotationDetail, QuotationQuery, QuotationService,
    UpdateQuotationStatusInput,
};
use crate::AppState;

/// Create a quotation
pub async fn create_quotation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateQuotationInput>,
) -> AppResult<Json<QuotationDetail>> {
    current_user.0.require("quotations", "create")?;
    let service = QuotationService::new(state.db);
    let quotation = service.create(current_user.0.user_id, input).await?;
    Ok(Json(quotation))
}

/// Get a quotation
pub async fn get_quotation(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(quotation_id): Path<Uuid>,
) -> AppResult<Json<QuotationDetail>> {
    let service = QuotationService::new(state.db);
    let quotation = service.get(quotation_id).await?;
    Ok(Json(quotation))
}

/// List quotations
pub async fn list_quotations(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<QuotationQuery>,
) -> AppResult<Json<Vec<Quotation>>> {
    let service = QuotationService::new(state.db);
    let quotations = service.list(query).await?;
    Ok(Json(quotations))
}

/// Move a quotation through its workflow
pub async fn update_quotation_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(quotation_id): Path<Uuid>,
    Json(input): Json<UpdateQuotationStatusInput>,
) -> AppResult<Json<Quotation>> {
    current_user.0.require("quotations", "update")?;
    let service = QuotationService::new(state.db);
    let quotation = service.update_status(quotation_id, input).await?;
    Ok(Json(quotation))
}
