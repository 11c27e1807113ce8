//! Trolley transfer service
//!
//! Finished goods travel from the production floor to the store on trolleys.
//! Each movement is weighed and counted on arrival; only a movement that
//! passes the verification gate moves stock.
//!
//! ```text
//! pending ──pass──▶ verified ──transfer──▶ completed
//!    ▲  └──fail──▶ rejected
//!    └───reset────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    evaluate_weigh_in, expected_weight, validate_code, BatchStatus, LedgerDelta,
    LedgerTransactionType, MovementStatus, ReferenceType, TrolleyStatus, VerificationOutcome,
    WeighIn,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::items::{ensure_location, fetch_active_item};
use super::ledger::{LedgerPosting, LedgerWriter};
use super::next_document_number;
use crate::config::InventoryConfig;
use crate::error::{ensure, AppError, AppResult};

/// Trolley service
#[derive(Clone)]
pub struct TrolleyService {
    db: PgPool,
    writer: LedgerWriter,
    default_tolerance: Decimal,
}

/// Trolley record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Trolley {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trolley movement record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrolleyMovement {
    pub id: Uuid,
    pub movement_no: String,
    pub trolley_id: Uuid,
    pub production_batch_id: Uuid,
    pub item_id: Uuid,
    pub from_location_id: Uuid,
    pub to_location_id: Uuid,
    pub expected_units: i32,
    pub actual_units: Option<i32>,
    pub expected_weight: Decimal,
    pub actual_weight: Option<Decimal>,
    pub unit_variance: Option<i32>,
    pub weight_variance: Option<Decimal>,
    pub weight_variance_percent: Option<Decimal>,
    pub tolerance_percent: Decimal,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl TrolleyMovement {
    pub fn status(&self) -> AppResult<MovementStatus> {
        MovementStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown movement status {}", self.status)))
    }
}

/// Input for registering a trolley
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTrolleyInput {
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
}

/// Input for loading a trolley from a completed batch
#[derive(Debug, Deserialize)]
pub struct CreateMovementInput {
    pub trolley_id: Uuid,
    pub production_batch_id: Uuid,
    pub to_location_id: Uuid,
    pub expected_units: i32,
}

/// Weigh-in captured at the store
#[derive(Debug, Deserialize)]
pub struct VerifyMovementInput {
    pub actual_units: i32,
    pub actual_weight: Decimal,
}

/// Movement list filter
#[derive(Debug, Deserialize)]
pub struct MovementQuery {
    pub status: Option<MovementStatus>,
    pub trolley_id: Option<Uuid>,
    pub production_batch_id: Option<Uuid>,
}

/// Movement after verification with the gate's findings
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub movement: TrolleyMovement,
    pub outcome: VerificationOutcome,
}

const MOVEMENT_COLUMNS: &str = "id, movement_no, trolley_id, production_batch_id, item_id, \
     from_location_id, to_location_id, expected_units, actual_units, expected_weight, actual_weight, \
     unit_variance, weight_variance, weight_variance_percent, tolerance_percent, status, \
     rejection_reason, verified_by, verified_at, completed_at, created_at, created_by";

async fn lock_trolley(conn: &mut PgConnection, trolley_id: Uuid) -> AppResult<Trolley> {
    sqlx::query_as::<_, Trolley>(
        "SELECT id, code, name, status, created_at, updated_at FROM trolleys WHERE id = $1 FOR UPDATE",
    )
    .bind(trolley_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Trolley".to_string()))
}

async fn set_trolley_status(
    conn: &mut PgConnection,
    trolley_id: Uuid,
    status: TrolleyStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE trolleys SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(trolley_id)
        .bind(status.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

async fn lock_movement(conn: &mut PgConnection, movement_id: Uuid) -> AppResult<TrolleyMovement> {
    sqlx::query_as::<_, TrolleyMovement>(&format!(
        "SELECT {MOVEMENT_COLUMNS} FROM trolley_movements WHERE id = $1 FOR UPDATE"
    ))
    .bind(movement_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Trolley movement".to_string()))
}

impl TrolleyService {
    /// Create a new TrolleyService instance
    pub fn new(db: PgPool, settings: &InventoryConfig) -> Self {
        Self {
            db,
            writer: LedgerWriter::new(settings),
            default_tolerance: settings.default_weight_tolerance_percent,
        }
    }

    /// Register a trolley
    pub async fn create_trolley(&self, input: CreateTrolleyInput) -> AppResult<Trolley> {
        input.validate()?;
        ensure("code", validate_code(&input.code))?;

        let trolley = sqlx::query_as::<_, Trolley>(
            r#"
            INSERT INTO trolleys (code, name, status)
            VALUES ($1, $2, $3)
            RETURNING id, code, name, status, created_at, updated_at
            "#,
        )
        .bind(&input.code)
        .bind(&input.name)
        .bind(TrolleyStatus::Available.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::from_unique(e, "code"))?;

        Ok(trolley)
    }

    /// List trolleys
    pub async fn list_trolleys(&self, status: Option<TrolleyStatus>) -> AppResult<Vec<Trolley>> {
        let trolleys = sqlx::query_as::<_, Trolley>(
            r#"
            SELECT id, code, name, status, created_at, updated_at
            FROM trolleys
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY code
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        Ok(trolleys)
    }

    /// Load a trolley with output from a completed batch
    pub async fn create_movement(
        &self,
        user_id: Uuid,
        input: CreateMovementInput,
    ) -> AppResult<TrolleyMovement> {
        if input.expected_units <= 0 {
            return Err(AppError::validation("expected_units", "Expected units must be positive"));
        }

        let mut tx = self.db.begin().await?;

        let trolley = lock_trolley(&mut tx, input.trolley_id).await?;
        if trolley.status != TrolleyStatus::Available.as_str() {
            return Err(AppError::conflict(
                "trolley",
                format!("Trolley {} is already in use", trolley.code),
            ));
        }

        let (item_id, from_location_id, status, produced_quantity) =
            sqlx::query_as::<_, (Uuid, Uuid, String, Option<Decimal>)>(
                r#"
                SELECT item_id, location_id, status, produced_quantity
                FROM production_batches
                WHERE id = $1
                FOR UPDATE
                "#,
            )
            .bind(input.production_batch_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Production batch".to_string()))?;

        if BatchStatus::from_str(&status) != Some(BatchStatus::Completed) {
            return Err(AppError::InvalidStateTransition(
                "Only completed batches can be loaded onto a trolley".to_string(),
            ));
        }
        if input.to_location_id == from_location_id {
            return Err(AppError::validation(
                "to_location_id",
                "Destination must differ from the production location",
            ));
        }
        ensure_location(&mut tx, input.to_location_id).await?;

        let already_loaded = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(expected_units), 0)::bigint
            FROM trolley_movements
            WHERE production_batch_id = $1
            "#,
        )
        .bind(input.production_batch_id)
        .fetch_one(&mut *tx)
        .await?;
        let produced = produced_quantity.unwrap_or(Decimal::ZERO);
        if Decimal::from(already_loaded + i64::from(input.expected_units)) > produced {
            return Err(AppError::InsufficientInventory(format!(
                "Batch produced {}, {} units already loaded",
                produced, already_loaded
            )));
        }

        let item = fetch_active_item(&mut tx, item_id).await?;
        let unit_weight = item.unit_weight.ok_or_else(|| {
            AppError::validation(
                "item_id",
                format!("Item {} has no unit weight for verification", item.code),
            )
        })?;
        let tolerance = item
            .weight_tolerance_percent
            .unwrap_or(self.default_tolerance);

        let movement_no = next_document_number(
            &mut tx,
            "trolley_movements",
            "movement_no",
            "TRM",
            Utc::now().date_naive(),
        )
        .await?;

        let movement = sqlx::query_as::<_, TrolleyMovement>(&format!(
            r#"
            INSERT INTO trolley_movements (
                movement_no, trolley_id, production_batch_id, item_id, from_location_id,
                to_location_id, expected_units, expected_weight, tolerance_percent, status, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {MOVEMENT_COLUMNS}
            "#
        ))
        .bind(&movement_no)
        .bind(input.trolley_id)
        .bind(input.production_batch_id)
        .bind(item_id)
        .bind(from_location_id)
        .bind(input.to_location_id)
        .bind(input.expected_units)
        .bind(expected_weight(input.expected_units, unit_weight))
        .bind(tolerance)
        .bind(MovementStatus::Pending.as_str())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "movement_no"))?;

        set_trolley_status(&mut tx, input.trolley_id, TrolleyStatus::InUse).await?;

        tx.commit().await?;

        tracing::info!(
            movement_id = %movement.id,
            movement_no = %movement.movement_no,
            trolley = %trolley.code,
            units = movement.expected_units,
            "Trolley loaded"
        );

        Ok(movement)
    }

    /// Run the verification gate on a pending movement
    ///
    /// Pass: stock moves from the production floor to the destination and the
    /// movement completes. Fail: the movement is rejected and no stock moves.
    /// Either way the trolley is released.
    pub async fn verify_movement(
        &self,
        user_id: Uuid,
        movement_id: Uuid,
        input: VerifyMovementInput,
    ) -> AppResult<VerificationResult> {
        if input.actual_units < 0 {
            return Err(AppError::validation("actual_units", "Actual units cannot be negative"));
        }
        if input.actual_weight < Decimal::ZERO {
            return Err(AppError::validation("actual_weight", "Actual weight cannot be negative"));
        }

        let mut tx = self.db.begin().await?;

        let movement = lock_movement(&mut tx, movement_id).await?;
        let current = movement.status()?;

        let outcome = evaluate_weigh_in(&WeighIn {
            expected_units: movement.expected_units,
            actual_units: input.actual_units,
            expected_weight: movement.expected_weight,
            actual_weight: input.actual_weight,
            tolerance_percent: movement.tolerance_percent,
        });

        let next = if outcome.passed {
            let verified = current.transition(MovementStatus::Verified)?;

            let quantity = Decimal::from(movement.expected_units);
            let cost_price = sqlx::query_scalar::<_, Decimal>("SELECT cost_price FROM items WHERE id = $1")
                .bind(movement.item_id)
                .fetch_one(&mut *tx)
                .await?;

            let transfer_out = LedgerPosting::new(
                movement.item_id,
                movement.from_location_id,
                LedgerTransactionType::TransferOut,
                ReferenceType::TrolleyMovement,
                movement.id,
                LedgerDelta::outbound(quantity),
            )
            .unit_cost(cost_price)
            .created_by(user_id);
            self.writer.post(&mut tx, transfer_out).await?;

            let transfer_in = LedgerPosting::new(
                movement.item_id,
                movement.to_location_id,
                LedgerTransactionType::TransferIn,
                ReferenceType::TrolleyMovement,
                movement.id,
                LedgerDelta::inbound(quantity),
            )
            .unit_cost(cost_price)
            .created_by(user_id);
            self.writer.post(&mut tx, transfer_in).await?;

            verified.transition(MovementStatus::Completed)?
        } else {
            current.transition(MovementStatus::Rejected)?
        };

        let movement = sqlx::query_as::<_, TrolleyMovement>(&format!(
            r#"
            UPDATE trolley_movements
            SET actual_units = $2,
                actual_weight = $3,
                unit_variance = $4,
                weight_variance = $5,
                weight_variance_percent = $6,
                rejection_reason = $7,
                status = $8,
                verified_by = $9,
                verified_at = NOW(),
                completed_at = CASE WHEN $8::text = 'completed' THEN NOW() ELSE NULL END
            WHERE id = $1
            RETURNING {MOVEMENT_COLUMNS}
            "#
        ))
        .bind(movement_id)
        .bind(input.actual_units)
        .bind(input.actual_weight)
        .bind(outcome.unit_variance)
        .bind(outcome.weight_variance)
        .bind(outcome.weight_variance_percent)
        .bind(&outcome.rejection_reason)
        .bind(next.as_str())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        set_trolley_status(&mut tx, movement.trolley_id, TrolleyStatus::Available).await?;

        tx.commit().await?;

        if outcome.passed {
            tracing::info!(
                movement_id = %movement.id,
                movement_no = %movement.movement_no,
                weight_variance = %outcome.weight_variance,
                "Trolley movement verified and completed"
            );
        } else {
            tracing::info!(
                movement_id = %movement.id,
                movement_no = %movement.movement_no,
                reason = outcome.rejection_reason.as_deref().unwrap_or_default(),
                "Trolley movement rejected"
            );
        }

        Ok(VerificationResult { movement, outcome })
    }

    /// Send a rejected movement back to pending for another weigh-in
    pub async fn reset_movement(&self, movement_id: Uuid) -> AppResult<TrolleyMovement> {
        let mut tx = self.db.begin().await?;

        let movement = lock_movement(&mut tx, movement_id).await?;
        let next = movement.status()?.transition(MovementStatus::Pending)?;

        let trolley = lock_trolley(&mut tx, movement.trolley_id).await?;
        if trolley.status != TrolleyStatus::Available.as_str() {
            return Err(AppError::conflict(
                "trolley",
                format!("Trolley {} is already in use", trolley.code),
            ));
        }

        let movement = sqlx::query_as::<_, TrolleyMovement>(&format!(
            r#"
            UPDATE trolley_movements
            SET status = $2,
                actual_units = NULL,
                actual_weight = NULL,
                unit_variance = NULL,
                weight_variance = NULL,
                weight_variance_percent = NULL,
                rejection_reason = NULL,
                verified_by = NULL,
                verified_at = NULL
            WHERE id = $1
            RETURNING {MOVEMENT_COLUMNS}
            "#
        ))
        .bind(movement_id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await?;

        set_trolley_status(&mut tx, movement.trolley_id, TrolleyStatus::InUse).await?;

        tx.commit().await?;

        tracing::info!(movement_id = %movement.id, movement_no = %movement.movement_no, "Trolley movement reset");

        Ok(movement)
    }

    /// Get a movement by ID
    pub async fn get_movement(&self, movement_id: Uuid) -> AppResult<TrolleyMovement> {
        sqlx::query_as::<_, TrolleyMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM trolley_movements WHERE id = $1"
        ))
        .bind(movement_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Trolley movement".to_string()))
    }

    /// List movements, newest first
    pub async fn list_movements(&self, query: MovementQuery) -> AppResult<Vec<TrolleyMovement>> {
        let movements = sqlx::query_as::<_, TrolleyMovement>(&format!(
            r#"
            SELECT {MOVEMENT_COLUMNS}
            FROM trolley_movements
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR trolley_id = $2)
              AND ($3::uuid IS NULL OR production_batch_id = $3)
            ORDER BY created_at DESC
            "#
        ))
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.trolley_id)
        .bind(query.production_batch_id)
        .fetch_all(&self.db)
        .await?;

        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use shared::{ItemType, LocationType, MovementStatus};

    use super::*;
    use crate::services::bom::{BomComponentInput, BomService, SetBomInput};
    use crate::services::opening_stock::{CreateOpeningStockInput, OpeningStockService};
    use crate::services::production::{CompleteBatchInput, CreateBatchInput, ProductionService};
    use crate::test_support::{
        create_item, create_location, ledger_rows, settings, test_db, unique_code, unique_date,
        user,
    };

    /// A pending movement of 10 finished units weighing 0.5 each
    async fn loaded_trolley(db: &PgPool) -> (TrolleyService, TrolleyMovement) {
        let finished = create_item(db, ItemType::Finished, Some(Decimal::from_str("0.5").unwrap())).await;
        let flour = create_item(db, ItemType::Raw, None).await;
        let floor = create_location(db, LocationType::Production).await;
        let store = create_location(db, LocationType::Store).await;
        let date = unique_date();

        OpeningStockService::new(db.clone(), &settings())
            .create(
                user(),
                CreateOpeningStockInput {
                    item_id: flour.id,
                    location_id: floor.id,
                    quantity: Decimal::from(100),
                    unit_cost: Some(Decimal::from(2)),
                    opening_date: date,
                    notes: None,
                },
            )
            .await
            .unwrap();
        BomService::new(db.clone())
            .set_components(
                finished.id,
                SetBomInput {
                    components: vec![BomComponentInput {
                        component_item_id: flour.id,
                        quantity_per_unit: Decimal::from(2),
                    }],
                },
            )
            .await
            .unwrap();

        let production = ProductionService::new(db.clone(), &settings());
        let batch = production
            .create_batch(
                user(),
                CreateBatchInput {
                    item_id: finished.id,
                    location_id: floor.id,
                    planned_quantity: Decimal::from(10),
                    production_date: date,
                    notes: None,
                },
            )
            .await
            .unwrap();
        production
            .complete_batch(
                user(),
                batch.id,
                CompleteBatchInput {
                    produced_quantity: Decimal::from(10),
                },
            )
            .await
            .unwrap();

        let service = TrolleyService::new(db.clone(), &settings());
        let trolley = service
            .create_trolley(CreateTrolleyInput {
                code: unique_code("TR"),
                name: "Test trolley".to_string(),
            })
            .await
            .unwrap();
        let movement = service
            .create_movement(
                user(),
                CreateMovementInput {
                    trolley_id: trolley.id,
                    production_batch_id: batch.id,
                    to_location_id: store.id,
                    expected_units: 10,
                },
            )
            .await
            .unwrap();

        (service, movement)
    }

    #[tokio::test]
    async fn test_rejected_weigh_in_writes_no_ledger_rows() {
        let Some(db) = test_db().await else { return };
        let (service, movement) = loaded_trolley(&db).await;

        let result = service
            .verify_movement(
                user(),
                movement.id,
                VerifyMovementInput {
                    actual_units: 10,
                    actual_weight: Decimal::from(4),
                },
            )
            .await
            .unwrap();

        assert!(!result.outcome.passed);
        assert_eq!(result.movement.status, MovementStatus::Rejected.as_str());
        assert!(ledger_rows(&db, movement.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_passing_weigh_in_after_reset_transfers_stock() {
        let Some(db) = test_db().await else { return };
        let (service, movement) = loaded_trolley(&db).await;

        service
            .verify_movement(
                user(),
                movement.id,
                VerifyMovementInput {
                    actual_units: 9,
                    actual_weight: Decimal::from_str("4.5").unwrap(),
                },
            )
            .await
            .unwrap();
        let reset = service.reset_movement(movement.id).await.unwrap();
        assert_eq!(reset.status, MovementStatus::Pending.as_str());
        assert!(reset.actual_weight.is_none());

        let result = service
            .verify_movement(
                user(),
                movement.id,
                VerifyMovementInput {
                    actual_units: 10,
                    actual_weight: Decimal::from_str("5.05").unwrap(),
                },
            )
            .await
            .unwrap();

        assert!(result.outcome.passed);
        assert_eq!(result.movement.status, MovementStatus::Completed.as_str());
        let ten = Decimal::from(10);
        assert_eq!(
            ledger_rows(&db, movement.id).await,
            vec![
                ("transfer_in".to_string(), ten, Decimal::ZERO),
                ("transfer_out".to_string(), Decimal::ZERO, ten),
            ]
        );
    }

    #[tokio::test]
    async fn test_completed_movement_cannot_be_verified_again() {
        let Some(db) = test_db().await else { return };
        let (service, movement) = loaded_trolley(&db).await;
        let weigh_in = || VerifyMovementInput {
            actual_units: 10,
            actual_weight: Decimal::from(5),
        };

        service.verify_movement(user(), movement.id, weigh_in()).await.unwrap();
        let err = service
            .verify_movement(user(), movement.id, weigh_in())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidStateTransition(_)));
        assert_eq!(ledger_rows(&db, movement.id).await.len(), 2);
    }
}
