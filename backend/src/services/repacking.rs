//! Repacking service
//!
//! A repacking record turns a bulk source item into packs of the repacked
//! item. Its `remaining_qty` is the pool that bundling draws from: oldest
//! records are consumed first and deletions restore the newest first.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    available_quantity, plan_fifo_consumption, plan_lifo_restoration, validate_positive_quantity,
    Allocation, LedgerDelta, LedgerTransactionType, ReferenceType, RepackingLot, RestorationPlan,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::items::{ensure_location, fetch_active_item};
use super::ledger::{LedgerPosting, LedgerWriter};
use super::next_document_number;
use crate::config::InventoryConfig;
use crate::error::{ensure, AppError, AppResult};

/// Repacking service for recording repacks and drawing on them FIFO
#[derive(Clone)]
pub struct RepackingService {
    db: PgPool,
    writer: LedgerWriter,
}

/// Repacking record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RepackingRecord {
    pub id: Uuid,
    pub repack_no: String,
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub source_item_id: Option<Uuid>,
    pub source_quantity: Option<Decimal>,
    pub repack_date: NaiveDate,
    pub repack_quantity: Decimal,
    pub remaining_qty: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl RepackingRecord {
    fn output_posting(&self) -> LedgerPosting<'_> {
        LedgerPosting::new(
            self.item_id,
            self.location_id,
            LedgerTransactionType::RepackOutput,
            ReferenceType::Repacking,
            self.id,
            LedgerDelta::inbound(self.repack_quantity),
        )
    }

    fn source_posting(&self) -> Option<LedgerPosting<'_>> {
        match (self.source_item_id, self.source_quantity) {
            (Some(source_item_id), Some(quantity)) => Some(LedgerPosting::new(
                source_item_id,
                self.location_id,
                LedgerTransactionType::RepackSource,
                ReferenceType::Repacking,
                self.id,
                LedgerDelta::outbound(quantity),
            )),
            _ => None,
        }
    }
}

/// Input for recording a repack
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRepackingInput {
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub source_item_id: Option<Uuid>,
    pub source_quantity: Option<Decimal>,
    pub repack_date: NaiveDate,
    pub repack_quantity: Decimal,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// Repacking list filter
#[derive(Debug, Deserialize)]
pub struct RepackingQuery {
    pub item_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    #[serde(default)]
    pub available_only: bool,
}

/// Unconsumed repacked stock for an item at a location
#[derive(Debug, Clone, Serialize)]
pub struct RepackingAvailability {
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub record_count: usize,
    pub open_record_count: usize,
    pub total_repacked: Decimal,
    pub available_quantity: Decimal,
}

/// Which records a consumption would draw from
#[derive(Debug, Clone, Serialize)]
pub struct AllocationPreview {
    pub requested: Decimal,
    pub available: Decimal,
    pub allocations: Vec<Allocation>,
}

const REPACKING_COLUMNS: &str = "id, repack_no, item_id, location_id, source_item_id, source_quantity, \
     repack_date, repack_quantity, remaining_qty, notes, created_at, created_by";

impl RepackingService {
    /// Create a new RepackingService instance
    pub fn new(db: PgPool, settings: &InventoryConfig) -> Self {
        Self {
            db,
            writer: LedgerWriter::new(settings),
        }
    }

    /// Record a repack: source out (when given), repacked item in, remaining = repacked
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateRepackingInput,
    ) -> AppResult<RepackingRecord> {
        input.validate()?;
        ensure("repack_quantity", validate_positive_quantity(input.repack_quantity))?;
        match (input.source_item_id, input.source_quantity) {
            (Some(source_item_id), Some(quantity)) => {
                ensure("source_quantity", validate_positive_quantity(quantity))?;
                if source_item_id == input.item_id {
                    return Err(AppError::validation(
                        "source_item_id",
                        "Source item must differ from the repacked item",
                    ));
                }
            }
            (None, None) => {}
            _ => {
                return Err(AppError::validation(
                    "source_quantity",
                    "Source item and source quantity must be given together",
                ))
            }
        }

        let mut tx = self.db.begin().await?;

        fetch_active_item(&mut tx, input.item_id).await?;
        ensure_location(&mut tx, input.location_id).await?;
        if let Some(source_item_id) = input.source_item_id {
            fetch_active_item(&mut tx, source_item_id).await?;
        }

        let repack_no =
            next_document_number(&mut tx, "repacking", "repack_no", "RPK", input.repack_date)
                .await?;

        let record = sqlx::query_as::<_, RepackingRecord>(&format!(
            r#"
            INSERT INTO repacking (
                repack_no, item_id, location_id, source_item_id, source_quantity,
                repack_date, repack_quantity, remaining_qty, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8, $9)
            RETURNING {REPACKING_COLUMNS}
            "#
        ))
        .bind(&repack_no)
        .bind(input.item_id)
        .bind(input.location_id)
        .bind(input.source_item_id)
        .bind(input.source_quantity)
        .bind(input.repack_date)
        .bind(input.repack_quantity)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "repack_no"))?;

        if let Some(posting) = record.source_posting() {
            self.writer.post(&mut tx, posting.created_by(user_id)).await?;
        }
        self.writer
            .post(&mut tx, record.output_posting().created_by(user_id))
            .await?;

        tx.commit().await?;

        tracing::info!(
            repacking_id = %record.id,
            repack_no = %record.repack_no,
            quantity = %record.repack_quantity,
            "Repacking recorded"
        );

        Ok(record)
    }

    /// List repacking records, oldest first
    pub async fn list(&self, query: RepackingQuery) -> AppResult<Vec<RepackingRecord>> {
        let records = sqlx::query_as::<_, RepackingRecord>(&format!(
            r#"
            SELECT {REPACKING_COLUMNS}
            FROM repacking
            WHERE ($1::uuid IS NULL OR item_id = $1)
              AND ($2::uuid IS NULL OR location_id = $2)
              AND (NOT $3 OR remaining_qty > 0)
            ORDER BY repack_date, created_at, id
            "#
        ))
        .bind(query.item_id)
        .bind(query.location_id)
        .bind(query.available_only)
        .fetch_all(&self.db)
        .await?;

        Ok(records)
    }

    /// Get a repacking record by ID
    pub async fn get(&self, repacking_id: Uuid) -> AppResult<RepackingRecord> {
        sqlx::query_as::<_, RepackingRecord>(&format!(
            "SELECT {REPACKING_COLUMNS} FROM repacking WHERE id = $1"
        ))
        .bind(repacking_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Repacking record".to_string()))
    }

    /// Unconsumed repacked quantity for an item at a location
    pub async fn availability(
        &self,
        item_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<RepackingAvailability> {
        let mut conn = self.db.acquire().await?;
        let lots = load_lots(&mut conn, item_id, location_id, false).await?;

        Ok(RepackingAvailability {
            item_id,
            location_id,
            record_count: lots.len(),
            open_record_count: lots.iter().filter(|l| l.remaining_qty > Decimal::ZERO).count(),
            total_repacked: lots.iter().map(|l| l.repack_quantity).sum(),
            available_quantity: available_quantity(&lots),
        })
    }

    /// Show which records a consumption of `requested` would draw from, without writing
    pub async fn preview_allocation(
        &self,
        item_id: Uuid,
        location_id: Uuid,
        requested: Decimal,
    ) -> AppResult<AllocationPreview> {
        let mut conn = self.db.acquire().await?;
        let lots = load_lots(&mut conn, item_id, location_id, false).await?;
        let allocations = plan_fifo_consumption(&lots, requested)?;

        Ok(AllocationPreview {
            requested,
            available: available_quantity(&lots),
            allocations,
        })
    }

    /// Delete a record that nothing has drawn from yet, reversing its ledger entries
    pub async fn delete(&self, user_id: Uuid, repacking_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let record = sqlx::query_as::<_, RepackingRecord>(&format!(
            "SELECT {REPACKING_COLUMNS} FROM repacking WHERE id = $1 FOR UPDATE"
        ))
        .bind(repacking_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Repacking record".to_string()))?;

        if record.remaining_qty != record.repack_quantity {
            return Err(AppError::conflict(
                "repacking",
                format!(
                    "Repacking {} has been partly consumed ({} of {} remaining)",
                    record.repack_no, record.remaining_qty, record.repack_quantity
                ),
            ));
        }

        self.writer
            .reverse(&mut tx, &record.output_posting(), user_id)
            .await?;
        if let Some(posting) = record.source_posting() {
            self.writer.reverse(&mut tx, &posting, user_id).await?;
        }

        sqlx::query("DELETE FROM repacking WHERE id = $1")
            .bind(repacking_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(repacking_id = %repacking_id, repack_no = %record.repack_no, "Repacking deleted");

        Ok(())
    }
}

/// Load repacking records for (item, location), optionally locking them
async fn load_lots(
    conn: &mut PgConnection,
    item_id: Uuid,
    location_id: Uuid,
    for_update: bool,
) -> AppResult<Vec<RepackingLot>> {
    let sql = format!(
        r#"
        SELECT id, repack_date, created_at, repack_quantity, remaining_qty
        FROM repacking
        WHERE item_id = $1 AND location_id = $2
        ORDER BY repack_date, created_at, id
        {}
        "#,
        if for_update { "FOR UPDATE" } else { "" }
    );

    let rows = sqlx::query_as::<_, (Uuid, NaiveDate, DateTime<Utc>, Decimal, Decimal)>(&sql)
        .bind(item_id)
        .bind(location_id)
        .fetch_all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(
            |(id, repack_date, created_at, repack_quantity, remaining_qty)| RepackingLot {
                id,
                repack_date,
                created_at,
                repack_quantity,
                remaining_qty,
            },
        )
        .collect())
}

/// Consume `quantity` oldest-first, all or nothing
pub(crate) async fn consume_fifo(
    conn: &mut PgConnection,
    item_id: Uuid,
    location_id: Uuid,
    quantity: Decimal,
) -> AppResult<Vec<Allocation>> {
    let lots = load_lots(&mut *conn, item_id, location_id, true).await?;
    let allocations = plan_fifo_consumption(&lots, quantity)?;

    for allocation in &allocations {
        let updated = sqlx::query(
            r#"
            UPDATE repacking
            SET remaining_qty = remaining_qty - $2
            WHERE id = $1 AND remaining_qty >= $2
            "#,
        )
        .bind(allocation.lot_id)
        .bind(allocation.quantity)
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() != 1 {
            return Err(AppError::Internal(format!(
                "Repacking record {} changed during allocation",
                allocation.lot_id
            )));
        }
    }

    tracing::debug!(
        item_id = %item_id,
        location_id = %location_id,
        quantity = %quantity,
        records = allocations.len(),
        "FIFO consumption applied"
    );

    Ok(allocations)
}

/// Give `quantity` back newest-first, tolerating records that cannot absorb it all
pub(crate) async fn restore_lifo(
    conn: &mut PgConnection,
    item_id: Uuid,
    location_id: Uuid,
    quantity: Decimal,
) -> AppResult<RestorationPlan> {
    let lots = load_lots(&mut *conn, item_id, location_id, true).await?;
    let plan = plan_lifo_restoration(&lots, quantity)?;

    for allocation in &plan.allocations {
        sqlx::query(
            r#"
            UPDATE repacking
            SET remaining_qty = LEAST(repack_quantity, remaining_qty + $2)
            WHERE id = $1
            "#,
        )
        .bind(allocation.lot_id)
        .bind(allocation.quantity)
        .execute(&mut *conn)
        .await?;
    }

    if !plan.is_complete() {
        tracing::warn!(
            item_id = %item_id,
            location_id = %location_id,
            requested = %quantity,
            restored = %plan.restored,
            unrestored = %plan.unrestored,
            "Repacking restoration incomplete; records predate consumption tracking"
        );
    }

    Ok(plan)
}
