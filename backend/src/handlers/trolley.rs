//! HTTP handlers for trolley transfer endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::TrolleyStatus;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::trolley::{
    CreateMovementInput, CreateTrolleyInput, MovementQuery, Trolley, TrolleyMovement,
    TrolleyService, VerificationResult, VerifyMovementInput,
};
use crate::AppState;

/// Register a trolley
pub async fn create_trolley(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateTrolleyInput>,
) -> AppResult<Json<Trolley>> {
    current_user.0.require("trolleys", "create")?;
    let service = TrolleyService::new(state.db, &state.config.inventory);
    let trolley = service.create_trolley(input).await?;
    Ok(Json(trolley))
}

#[derive(Debug, Deserialize)]
pub struct TrolleyListQuery {
    pub status: Option<TrolleyStatus>,
}

/// List trolleys
pub async fn list_trolleys(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<TrolleyListQuery>,
) -> AppResult<Json<Vec<Trolley>>> {
    let service = TrolleyService::new(state.db, &state.config.inventory);
    let trolleys = service.list_trolleys(query.status).await?;
    Ok(Json(trolleys))
}

/// Load a trolley from a completed batch
pub async fn create_trolley_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateMovementInput>,
) -> AppResult<Json<TrolleyMovement>> {
    current_user.0.require("trolleys", "load")?;
    let service = TrolleyService::new(state.db, &state.config.inventory);
    let movement = service
        .create_movement(current_user.0.user_id, input)
        .await?;
    Ok(Json(movement))
}

/// Weigh and count a trolley at the store
pub async fn verify_trolley_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
    Json(input): Json<VerifyMovementInput>,
) -> AppResult<Json<VerificationResult>> {
    current_user.0.require("trolleys", "verify")?;
    let service = TrolleyService::new(state.db, &state.config.inventory);
    let result = service
        .verify_movement(current_user.0.user_id, movement_id, input)
        .await?;
    Ok(Json(result))
}

/// Return a rejected movement to pending
pub async fn reset_trolley_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<TrolleyMovement>> {
    current_user.0.require("trolleys", "verify")?;
    let service = TrolleyService::new(state.db, &state.config.inventory);
    let movement = service.reset_movement(movement_id).await?;
    Ok(Json(movement))
}

/// Get a movement
pub async fn get_trolley_movement(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<TrolleyMovement>> {
    let service = TrolleyService::new(state.db, &state.config.inventory);
    let movement = service.get_movement(movement_id).await?;
    Ok(Json(movement))
}

/// List movements
pub async fn list_trolley_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<MovementQuery>,
) -> AppResult<Json<Vec<TrolleyMovement>>> {
    let service = TrolleyService::new(state.db, &state.config.inventory);
    let movements = service.list_movements(query).await?;
    Ok(Json(movements))
}
