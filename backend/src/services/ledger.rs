//! Stock ledger service
//!
//! [`LedgerWriter`] is the only code that inserts into `stock_ledger`. Every
//! posting runs on the caller's transaction, locks the item row so that
//! concurrent postings for the same item serialize, sums the prior rows for
//! (item, location) and inserts the new row with its running balance. The
//! `items.current_stock` cache is recomputed from the ledger in the same
//! transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    cache_drift, count_adjustment, next_balance, LedgerDelta, LedgerTransactionType, Pagination,
    ReferenceType,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};

/// A stock ledger row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockLedgerEntry {
    pub id: Uuid,
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub transaction_type: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub quantity_in: Decimal,
    pub quantity_out: Decimal,
    pub balance: Decimal,
    pub unit_cost: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

/// A movement to append to the ledger
#[derive(Debug, Clone)]
pub struct LedgerPosting<'a> {
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub transaction_type: LedgerTransactionType,
    pub reference_type: ReferenceType,
    pub reference_id: Option<Uuid>,
    pub delta: LedgerDelta,
    pub unit_cost: Option<Decimal>,
    pub notes: Option<&'a str>,
    pub created_by: Option<Uuid>,
}

impl<'a> LedgerPosting<'a> {
    pub fn new(
        item_id: Uuid,
        location_id: Uuid,
        transaction_type: LedgerTransactionType,
        reference_type: ReferenceType,
        reference_id: Uuid,
        delta: LedgerDelta,
    ) -> Self {
        Self {
            item_id,
            location_id,
            transaction_type,
            reference_type,
            reference_id: Some(reference_id),
            delta,
            unit_cost: None,
            notes: None,
            created_by: None,
        }
    }

    pub fn unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    pub fn notes(mut self, notes: Option<&'a str>) -> Self {
        self.notes = notes;
        self
    }

    pub fn created_by(mut self, user_id: Uuid) -> Self {
        self.created_by = Some(user_id);
        self
    }
}

/// Appends ledger rows inside an open transaction
#[derive(Debug, Clone, Copy)]
pub struct LedgerWriter {
    allow_negative: bool,
}

impl LedgerWriter {
    pub fn new(settings: &InventoryConfig) -> Self {
        Self {
            allow_negative: settings.allow_negative_stock,
        }
    }

    /// Append one movement and refresh the item's stock cache
    pub async fn post(
        &self,
        conn: &mut PgConnection,
        posting: LedgerPosting<'_>,
    ) -> AppResult<StockLedgerEntry> {
        // serializes concurrent sum-then-insert for the item
        let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM items WHERE id = $1 FOR UPDATE")
            .bind(posting.item_id)
            .fetch_optional(&mut *conn)
            .await?;
        if locked.is_none() {
            return Err(AppError::NotFound("Item".to_string()));
        }

        let prior = location_balance(&mut *conn, posting.item_id, posting.location_id).await?;
        let balance = next_balance(prior, &posting.delta, self.allow_negative)?;

        let entry = sqlx::query_as::<_, StockLedgerEntry>(
            r#"
            INSERT INTO stock_ledger (
                item_id, location_id, transaction_type, reference_type, reference_id,
                quantity_in, quantity_out, balance, unit_cost, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, item_id, location_id, transaction_type, reference_type, reference_id,
                      quantity_in, quantity_out, balance, unit_cost, notes, created_at, created_by
            "#,
        )
        .bind(posting.item_id)
        .bind(posting.location_id)
        .bind(posting.transaction_type.as_str())
        .bind(posting.reference_type.as_str())
        .bind(posting.reference_id)
        .bind(posting.delta.quantity_in)
        .bind(posting.delta.quantity_out)
        .bind(balance)
        .bind(posting.unit_cost)
        .bind(posting.notes)
        .bind(posting.created_by)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_foreign_key_violation() {
                    return AppError::NotFound("Location".to_string());
                }
            }
            AppError::DatabaseError(e)
        })?;

        refresh_item_stock(&mut *conn, posting.item_id).await?;

        tracing::debug!(
            item_id = %entry.item_id,
            location_id = %entry.location_id,
            transaction_type = %entry.transaction_type,
            balance = %entry.balance,
            "Ledger entry posted"
        );

        Ok(entry)
    }

    /// Post the reversing entry for `original` as a `reversal` row
    pub async fn reverse(
        &self,
        conn: &mut PgConnection,
        original: &LedgerPosting<'_>,
        created_by: Uuid,
    ) -> AppResult<StockLedgerEntry> {
        let mut posting = original.clone();
        posting.transaction_type = LedgerTransactionType::Reversal;
        posting.delta = original.delta.reversed();
        posting.created_by = Some(created_by);
        self.post(conn, posting).await
    }
}

/// Sum of signed movements for (item, location)
pub async fn location_balance(
    conn: &mut PgConnection,
    item_id: Uuid,
    location_id: Uuid,
) -> AppResult<Decimal> {
    let balance = sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT COALESCE(SUM(quantity_in - quantity_out), 0)
        FROM stock_ledger
        WHERE item_id = $1 AND location_id = $2
        "#,
    )
    .bind(item_id)
    .bind(location_id)
    .fetch_one(conn)
    .await?;

    Ok(balance)
}

async fn refresh_item_stock(conn: &mut PgConnection, item_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE items
        SET current_stock = (
                SELECT COALESCE(SUM(quantity_in - quantity_out), 0)
                FROM stock_ledger WHERE item_id = $1
            ),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(item_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Ledger service for balance queries, history and reconciliation
#[derive(Clone)]
pub struct LedgerService {
    db: PgPool,
    writer: LedgerWriter,
}

/// Balance of one item at one location
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockBalance {
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub balance: Decimal,
}

/// Balance of an item at each location it has moved through
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LocationBalance {
    pub location_id: Uuid,
    pub location_code: String,
    pub location_name: String,
    pub balance: Decimal,
}

/// Ledger history filter
#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub item_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub transaction_type: Option<LedgerTransactionType>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Input for a physical stock count
#[derive(Debug, Deserialize, Validate)]
pub struct StockCountInput {
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub counted_quantity: Decimal,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// Outcome of a stock count
#[derive(Debug, Clone, Serialize)]
pub struct StockCountResult {
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub previous_balance: Decimal,
    pub counted_quantity: Decimal,
    pub adjustment: Option<StockLedgerEntry>,
}

/// Item whose cached stock disagrees with its ledger
#[derive(Debug, Clone, Serialize)]
pub struct StockCacheDrift {
    pub item_id: Uuid,
    pub code: String,
    pub name: String,
    pub cached_stock: Decimal,
    pub ledger_stock: Decimal,
    pub drift: Decimal,
}

#[derive(Debug, FromRow)]
struct CacheRow {
    id: Uuid,
    code: String,
    name: String,
    current_stock: Decimal,
    ledger_stock: Decimal,
}

impl LedgerService {
    /// Create a new LedgerService instance
    pub fn new(db: PgPool, settings: &InventoryConfig) -> Self {
        Self {
            db,
            writer: LedgerWriter::new(settings),
        }
    }

    /// Balance for one item at one location
    pub async fn get_balance(&self, item_id: Uuid, location_id: Uuid) -> AppResult<StockBalance> {
        let balance = sqlx::query_as::<_, StockBalance>(
            r#"
            SELECT $1::uuid AS item_id, $2::uuid AS location_id,
                   COALESCE(SUM(quantity_in), 0) AS total_in,
                   COALESCE(SUM(quantity_out), 0) AS total_out,
                   COALESCE(SUM(quantity_in - quantity_out), 0) AS balance
            FROM stock_ledger
            WHERE item_id = $1 AND location_id = $2
            "#,
        )
        .bind(item_id)
        .bind(location_id)
        .fetch_one(&self.db)
        .await?;

        Ok(balance)
    }

    /// Balances of an item across locations
    pub async fn balances_by_location(&self, item_id: Uuid) -> AppResult<Vec<LocationBalance>> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM items WHERE id = $1)")
            .bind(item_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound("Item".to_string()));
        }

        let balances = sqlx::query_as::<_, LocationBalance>(
            r#"
            SELECT l.id AS location_id, l.code AS location_code, l.name AS location_name,
                   SUM(sl.quantity_in - sl.quantity_out) AS balance
            FROM stock_ledger sl
            JOIN locations l ON l.id = sl.location_id
            WHERE sl.item_id = $1
            GROUP BY l.id, l.code, l.name
            ORDER BY l.code
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        Ok(balances)
    }

    /// Ledger rows, newest first
    pub async fn history(&self, query: LedgerQuery) -> AppResult<Vec<StockLedgerEntry>> {
        let pagination = Pagination {
            page: query.page.unwrap_or(1),
            per_page: query.per_page.unwrap_or(Pagination::default().per_page),
        };

        let entries = sqlx::query_as::<_, StockLedgerEntry>(
            r#"
            SELECT id, item_id, location_id, transaction_type, reference_type, reference_id,
                   quantity_in, quantity_out, balance, unit_cost, notes, created_at, created_by
            FROM stock_ledger
            WHERE ($1::uuid IS NULL OR item_id = $1)
              AND ($2::uuid IS NULL OR location_id = $2)
              AND ($3::text IS NULL OR transaction_type = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(query.item_id)
        .bind(query.location_id)
        .bind(query.transaction_type.map(|t| t.as_str()))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    /// Bring the ledger in line with a physical count via an adjustment entry
    pub async fn record_stock_count(
        &self,
        user_id: Uuid,
        input: StockCountInput,
    ) -> AppResult<StockCountResult> {
        input.validate()?;
        if input.counted_quantity < Decimal::ZERO {
            return Err(AppError::validation(
                "counted_quantity",
                "Counted quantity cannot be negative",
            ));
        }

        let mut tx = self.db.begin().await?;

        // lock before reading so the adjustment is computed against a stable balance
        sqlx::query("SELECT id FROM items WHERE id = $1 FOR UPDATE")
            .bind(input.item_id)
            .execute(&mut *tx)
            .await?;
        let previous_balance = location_balance(&mut tx, input.item_id, input.location_id).await?;

        let adjustment = match count_adjustment(previous_balance, input.counted_quantity) {
            Some(delta) => {
                let count_id = Uuid::new_v4();
                let posting = LedgerPosting::new(
                    input.item_id,
                    input.location_id,
                    LedgerTransactionType::Adjustment,
                    ReferenceType::StockCount,
                    count_id,
                    delta,
                )
                .notes(input.notes.as_deref())
                .created_by(user_id);

                Some(self.writer.post(&mut tx, posting).await?)
            }
            None => None,
        };

        tx.commit().await?;

        tracing::info!(
            item_id = %input.item_id,
            location_id = %input.location_id,
            previous = %previous_balance,
            counted = %input.counted_quantity,
            "Stock count recorded"
        );

        Ok(StockCountResult {
            item_id: input.item_id,
            location_id: input.location_id,
            previous_balance,
            counted_quantity: input.counted_quantity,
            adjustment,
        })
    }

    /// Items whose cached `current_stock` differs from the ledger sum
    pub async fn cache_drift_report(&self) -> AppResult<Vec<StockCacheDrift>> {
        let rows = sqlx::query_as::<_, CacheRow>(
            r#"
            SELECT i.id, i.code, i.name, i.current_stock,
                   COALESCE(SUM(sl.quantity_in - sl.quantity_out), 0) AS ledger_stock
            FROM items i
            LEFT JOIN stock_ledger sl ON sl.item_id = i.id
            GROUP BY i.id, i.code, i.name, i.current_stock
            ORDER BY i.code
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let drift = cache_drift(r.current_stock, r.ledger_stock);
                if drift.is_zero() {
                    None
                } else {
                    Some(StockCacheDrift {
                        item_id: r.id,
                        code: r.code,
                        name: r.name,
                        cached_stock: r.current_stock,
                        ledger_stock: r.ledger_stock,
                        drift,
                    })
                }
            })
            .collect())
    }

    /// Recompute every item's cached stock from the ledger
    pub async fn refresh_stock_cache(&self) -> AppResult<u64> {
        let drifted = self.cache_drift_report().await?;
        for d in &drifted {
            tracing::warn!(
                item_id = %d.item_id,
                code = %d.code,
                cached = %d.cached_stock,
                ledger = %d.ledger_stock,
                "Stock cache drift corrected"
            );
        }

        let result = sqlx::query(
            r#"
            UPDATE items i
            SET current_stock = COALESCE(
                    (SELECT SUM(quantity_in - quantity_out) FROM stock_ledger WHERE item_id = i.id),
                    0
                ),
                updated_at = NOW()
            WHERE i.current_stock <> COALESCE(
                    (SELECT SUM(quantity_in - quantity_out) FROM stock_ledger WHERE item_id = i.id),
                    0
                )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}
