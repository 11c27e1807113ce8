//! Production batch service
//!
//! Completing a batch consumes its bill of materials at the production
//! location and receives the produced quantity there. Trolley movements then
//! carry the output to the store.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    material_requirements, validate_positive_quantity, BatchStatus, ItemType, LedgerDelta,
    LedgerTransactionType, ReferenceType,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::bom::load_components;
use super::items::{apply_receipt_cost, ensure_location, fetch_active_item};
use super::ledger::{LedgerPosting, LedgerWriter};
use super::next_document_number;
use crate::config::InventoryConfig;
use crate::error::{ensure, AppError, AppResult};

/// Production service
#[derive(Clone)]
pub struct ProductionService {
    db: PgPool,
    writer: LedgerWriter,
}

/// Production batch record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductionBatch {
    pub id: Uuid,
    pub batch_no: String,
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub planned_quantity: Decimal,
    pub produced_quantity: Option<Decimal>,
    pub status: String,
    pub production_date: NaiveDate,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl ProductionBatch {
    pub fn status(&self) -> AppResult<BatchStatus> {
        BatchStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown batch status {}", self.status)))
    }
}

/// Input for planning a batch
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchInput {
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub planned_quantity: Decimal,
    pub production_date: NaiveDate,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// Input for completing a batch
#[derive(Debug, Deserialize)]
pub struct CompleteBatchInput {
    pub produced_quantity: Decimal,
}

/// Batch list filter
#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    pub item_id: Option<Uuid>,
    pub status: Option<BatchStatus>,
}

const BATCH_COLUMNS: &str = "id, batch_no, item_id, location_id, planned_quantity, produced_quantity, \
     status, production_date, completed_at, notes, created_at, created_by";

impl ProductionService {
    /// Create a new ProductionService instance
    pub fn new(db: PgPool, settings: &InventoryConfig) -> Self {
        Self {
            db,
            writer: LedgerWriter::new(settings),
        }
    }

    /// Plan a production batch
    pub async fn create_batch(
        &self,
        user_id: Uuid,
        input: CreateBatchInput,
    ) -> AppResult<ProductionBatch> {
        input.validate()?;
        ensure("planned_quantity", validate_positive_quantity(input.planned_quantity))?;

        let mut tx = self.db.begin().await?;

        let item = fetch_active_item(&mut tx, input.item_id).await?;
        if item.item_type()? == ItemType::Raw {
            return Err(AppError::validation("item_id", "Raw materials cannot be produced"));
        }
        ensure_location(&mut tx, input.location_id).await?;

        let batch_no = next_document_number(
            &mut tx,
            "production_batches",
            "batch_no",
            "PRD",
            input.production_date,
        )
        .await?;

        let batch = sqlx::query_as::<_, ProductionBatch>(&format!(
            r#"
            INSERT INTO production_batches (
                batch_no, item_id, location_id, planned_quantity, status, production_date, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {BATCH_COLUMNS}
            "#
        ))
        .bind(&batch_no)
        .bind(input.item_id)
        .bind(input.location_id)
        .bind(input.planned_quantity)
        .bind(BatchStatus::Planned.as_str())
        .bind(input.production_date)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "batch_no"))?;

        tx.commit().await?;

        tracing::info!(batch_id = %batch.id, batch_no = %batch.batch_no, "Production batch planned");

        Ok(batch)
    }

    /// Complete a batch: BOM components out, produced quantity in
    pub async fn complete_batch(
        &self,
        user_id: Uuid,
        batch_id: Uuid,
        input: CompleteBatchInput,
    ) -> AppResult<ProductionBatch> {
        ensure("produced_quantity", validate_positive_quantity(input.produced_quantity))?;

        let mut tx = self.db.begin().await?;

        let batch = sqlx::query_as::<_, ProductionBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM production_batches WHERE id = $1 FOR UPDATE"
        ))
        .bind(batch_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Production batch".to_string()))?;

        if batch.status()? != BatchStatus::Planned {
            return Err(AppError::InvalidStateTransition(format!(
                "Batch {} is already {}",
                batch.batch_no, batch.status
            )));
        }

        let components = load_components(&mut tx, batch.item_id).await?;
        if components.is_empty() {
            return Err(AppError::conflict(
                "bom",
                "The batch item has no bill of materials",
            ));
        }

        let mut material_cost = Decimal::ZERO;
        for requirement in material_requirements(&components, input.produced_quantity) {
            let component = fetch_active_item(&mut tx, requirement.component_item_id).await?;
            material_cost += component.cost_price * requirement.required_quantity;

            let posting = LedgerPosting::new(
                requirement.component_item_id,
                batch.location_id,
                LedgerTransactionType::ProductionConsumption,
                ReferenceType::ProductionBatch,
                batch.id,
                LedgerDelta::outbound(requirement.required_quantity),
            )
            .unit_cost(component.cost_price)
            .created_by(user_id);
            self.writer.post(&mut tx, posting).await?;
        }

        let unit_cost = (material_cost / input.produced_quantity).round_dp(4);
        apply_receipt_cost(&mut tx, batch.item_id, input.produced_quantity, unit_cost).await?;

        let output = LedgerPosting::new(
            batch.item_id,
            batch.location_id,
            LedgerTransactionType::ProductionOutput,
            ReferenceType::ProductionBatch,
            batch.id,
            LedgerDelta::inbound(input.produced_quantity),
        )
        .unit_cost(unit_cost)
        .created_by(user_id);
        self.writer.post(&mut tx, output).await?;

        let batch = sqlx::query_as::<_, ProductionBatch>(&format!(
            r#"
            UPDATE production_batches
            SET status = $2, produced_quantity = $3, completed_at = NOW()
            WHERE id = $1
            RETURNING {BATCH_COLUMNS}
            "#
        ))
        .bind(batch_id)
        .bind(BatchStatus::Completed.as_str())
        .bind(input.produced_quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            batch_id = %batch.id,
            batch_no = %batch.batch_no,
            produced = %input.produced_quantity,
            unit_cost = %unit_cost,
            "Production batch completed"
        );

        Ok(batch)
    }

    /// Get a batch by ID
    pub async fn get_batch(&self, batch_id: Uuid) -> AppResult<ProductionBatch> {
        sqlx::query_as::<_, ProductionBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM production_batches WHERE id = $1"
        ))
        .bind(batch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Production batch".to_string()))
    }

    /// List batches, newest first
    pub async fn list_batches(&self, query: BatchQuery) -> AppResult<Vec<ProductionBatch>> {
        let batches = sqlx::query_as::<_, ProductionBatch>(&format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM production_batches
            WHERE ($1::uuid IS NULL OR item_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY production_date DESC, created_at DESC
            "#
        ))
        .bind(query.item_id)
        .bind(query.status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        Ok(batches)
    }
}
