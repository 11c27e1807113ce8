//! Opening stock service

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    validate_non_negative_amount, validate_positive_quantity, LedgerDelta, LedgerTransactionType,
    ReferenceType,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::items::{apply_receipt_cost, ensure_location, fetch_active_item};
use super::ledger::{location_balance, LedgerPosting, LedgerWriter};
use crate::config::InventoryConfig;
use crate::error::{ensure, AppError, AppResult};

/// Opening stock service
#[derive(Clone)]
pub struct OpeningStockService {
    db: PgPool,
    writer: LedgerWriter,
}

/// Opening stock record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OpeningStock {
    pub id: Uuid,
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub opening_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl OpeningStock {
    fn posting(&self) -> LedgerPosting<'_> {
        LedgerPosting::new(
            self.item_id,
            self.location_id,
            LedgerTransactionType::OpeningStock,
            ReferenceType::OpeningStock,
            self.id,
            LedgerDelta::inbound(self.quantity),
        )
        .unit_cost(self.unit_cost)
    }
}

/// Input for recording opening stock
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOpeningStockInput {
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub opening_date: NaiveDate,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// Opening stock list filter
#[derive(Debug, Deserialize)]
pub struct OpeningStockQuery {
    pub item_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}

const OPENING_COLUMNS: &str =
    "id, item_id, location_id, quantity, unit_cost, opening_date, notes, created_at, created_by";

impl OpeningStockService {
    /// Create a new OpeningStockService instance
    pub fn new(db: PgPool, settings: &InventoryConfig) -> Self {
        Self {
            db,
            writer: LedgerWriter::new(settings),
        }
    }

    /// Record opening stock for an item at a location (once per pair)
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateOpeningStockInput,
    ) -> AppResult<OpeningStock> {
        input.validate()?;
        ensure("quantity", validate_positive_quantity(input.quantity))?;
        let unit_cost = input.unit_cost.unwrap_or(Decimal::ZERO);
        ensure("unit_cost", validate_non_negative_amount(unit_cost))?;

        let mut tx = self.db.begin().await?;

        fetch_active_item(&mut tx, input.item_id).await?;
        ensure_location(&mut tx, input.location_id).await?;

        let opening = sqlx::query_as::<_, OpeningStock>(&format!(
            r#"
            INSERT INTO opening_stock (item_id, location_id, quantity, unit_cost, opening_date, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {OPENING_COLUMNS}
            "#
        ))
        .bind(input.item_id)
        .bind(input.location_id)
        .bind(input.quantity)
        .bind(unit_cost)
        .bind(input.opening_date)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "item_id and location_id"))?;

        apply_receipt_cost(&mut tx, opening.item_id, opening.quantity, opening.unit_cost).await?;
        self.writer
            .post(
                &mut tx,
                opening.posting().notes(opening.notes.as_deref()).created_by(user_id),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            opening_stock_id = %opening.id,
            item_id = %opening.item_id,
            quantity = %opening.quantity,
            "Opening stock recorded"
        );

        Ok(opening)
    }

    /// List opening stock records
    pub async fn list(&self, query: OpeningStockQuery) -> AppResult<Vec<OpeningStock>> {
        let records = sqlx::query_as::<_, OpeningStock>(&format!(
            r#"
            SELECT {OPENING_COLUMNS}
            FROM opening_stock
            WHERE ($1::uuid IS NULL OR item_id = $1)
              AND ($2::uuid IS NULL OR location_id = $2)
            ORDER BY opening_date DESC, created_at DESC
            "#
        ))
        .bind(query.item_id)
        .bind(query.location_id)
        .fetch_all(&self.db)
        .await?;

        Ok(records)
    }

    /// Delete opening stock, reversing its ledger entry
    ///
    /// Refused once the location balance has dropped below the opening quantity.
    pub async fn delete(&self, user_id: Uuid, opening_stock_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let opening = sqlx::query_as::<_, OpeningStock>(&format!(
            "SELECT {OPENING_COLUMNS} FROM opening_stock WHERE id = $1 FOR UPDATE"
        ))
        .bind(opening_stock_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Opening stock".to_string()))?;

        // item row lock first so the balance cannot move under the check
        sqlx::query("SELECT id FROM items WHERE id = $1 FOR UPDATE")
            .bind(opening.item_id)
            .execute(&mut *tx)
            .await?;
        let balance = location_balance(&mut tx, opening.item_id, opening.location_id).await?;
        if balance < opening.quantity {
            return Err(AppError::conflict(
                "opening_stock",
                format!(
                    "Stock already consumed: balance {} is below the opening quantity {}",
                    balance, opening.quantity
                ),
            ));
        }

        self.writer
            .reverse(&mut tx, &opening.posting(), user_id)
            .await?;

        sqlx::query("DELETE FROM opening_stock WHERE id = $1")
            .bind(opening_stock_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(opening_stock_id = %opening_stock_id, "Opening stock deleted");

        Ok(())
    }
}
