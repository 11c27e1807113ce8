//! Goods received note service

use std::collections::HashSet;

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
use super::ledger::{LedgerPosting, LedgerWriter};
use super::next_document_number;
use crate::config::InventoryConfig;
use crate::error::{ensure, AppError, AppResult};

/// GRN service
#[derive(Clone)]
pub struct GrnService {
    db: PgPool,
    writer: LedgerWriter,
}

/// GRN header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Grn {
    pub id: Uuid,
    pub grn_no: String,
    pub supplier_id: Uuid,
    pub location_id: Uuid,
    pub received_date: NaiveDate,
    pub reference_no: Option<String>,
    pub total_value: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

/// GRN line
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GrnItem {
    pub id: Uuid,
    pub grn_id: Uuid,
    pub item_id: Uuid,
    pub item_code: String,
    pub item_name: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub line_total: Decimal,
}

/// GRN with its lines
#[derive(Debug, Clone, Serialize)]
pub struct GrnDetail {
    #[serde(flatten)]
    pub grn: Grn,
    pub supplier_name: String,
    pub items: Vec<GrnItem>,
}

/// Line on a receipt
#[derive(Debug, Deserialize, Serialize)]
pub struct GrnLineInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

/// Input for receiving goods
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGrnInput {
    pub supplier_id: Uuid,
    pub location_id: Uuid,
    pub received_date: NaiveDate,
    #[validate(length(max = 100, message = "Reference must be at most 100 characters"))]
    pub reference_no: Option<String>,
    #[validate(length(min = 1, message = "At least one line is required"))]
    pub items: Vec<GrnLineInput>,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// GRN list filter
#[derive(Debug, Deserialize)]
pub struct GrnQuery {
    pub supplier_id: Option<Uuid>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Most recent purchase of an item
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LastPurchase {
    pub item_id: Uuid,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub grn_no: String,
    pub received_date: NaiveDate,
    pub unit_cost: Decimal,
}

const GRN_COLUMNS: &str = "id, grn_no, supplier_id, location_id, received_date, reference_no, \
     total_value, notes, created_at, created_by";

impl GrnService {
    /// Create a new GrnService instance
    pub fn new(db: PgPool, settings: &InventoryConfig) -> Self {
        Self {
            db,
            writer: LedgerWriter::new(settings),
        }
    }

    /// Receive goods: one ledger receipt per line, cost price re-averaged
    pub async fn create(&self, user_id: Uuid, input: CreateGrnInput) -> AppResult<GrnDetail> {
        input.validate()?;
        let mut seen = HashSet::new();
        for line in &input.items {
            ensure("quantity", validate_positive_quantity(line.quantity))?;
            ensure("unit_cost", validate_non_negative_amount(line.unit_cost))?;
            if !seen.insert(line.item_id) {
                return Err(AppError::validation("items", "Each item may appear only once"));
            }
        }

        let mut tx = self.db.begin().await?;

        let (supplier_name, supplier_active) = sqlx::query_as::<_, (String, bool)>(
            "SELECT name, is_active FROM suppliers WHERE id = $1",
        )
        .bind(input.supplier_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))?;
        if !supplier_active {
            return Err(AppError::validation("supplier_id", "Supplier is inactive"));
        }
        ensure_location(&mut tx, input.location_id).await?;

        let grn_no = next_document_number(&mut tx, "grn", "grn_no", "GRN", input.received_date).await?;
        let total_value: Decimal = input
            .items
            .iter()
            .map(|l| (l.quantity * l.unit_cost).round_dp(2))
            .sum();

        let grn = sqlx::query_as::<_, Grn>(&format!(
            r#"
            INSERT INTO grn (grn_no, supplier_id, location_id, received_date, reference_no, total_value, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {GRN_COLUMNS}
            "#
        ))
        .bind(&grn_no)
        .bind(input.supplier_id)
        .bind(input.location_id)
        .bind(input.received_date)
        .bind(&input.reference_no)
        .bind(total_value)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "grn_no"))?;

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let item = fetch_active_item(&mut tx, line.item_id).await?;

            let grn_item = sqlx::query_as::<_, GrnItem>(
                r#"
                INSERT INTO grn_items (grn_id, item_id, quantity, unit_cost, line_total)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, grn_id, item_id, $6::text AS item_code, $7::text AS item_name,
                          quantity, unit_cost, line_total
                "#,
            )
            .bind(grn.id)
            .bind(line.item_id)
            .bind(line.quantity)
            .bind(line.unit_cost)
            .bind((line.quantity * line.unit_cost).round_dp(2))
            .bind(&item.code)
            .bind(&item.name)
            .fetch_one(&mut *tx)
            .await?;

            apply_receipt_cost(&mut tx, line.item_id, line.quantity, line.unit_cost).await?;

            let posting = LedgerPosting::new(
                line.item_id,
                grn.location_id,
                LedgerTransactionType::GrnReceipt,
                ReferenceType::Grn,
                grn.id,
                LedgerDelta::inbound(line.quantity),
            )
            .unit_cost(line.unit_cost)
            .created_by(user_id);
            self.writer.post(&mut tx, posting).await?;

            items.push(grn_item);
        }

        tx.commit().await?;

        tracing::info!(
            grn_id = %grn.id,
            grn_no = %grn.grn_no,
            lines = items.len(),
            total_value = %grn.total_value,
            "Goods received"
        );

        Ok(GrnDetail {
            grn,
            supplier_name,
            items,
        })
    }

    /// Get a GRN with its lines
    pub async fn get(&self, grn_id: Uuid) -> AppResult<GrnDetail> {
        let grn = sqlx::query_as::<_, Grn>(&format!("SELECT {GRN_COLUMNS} FROM grn WHERE id = $1"))
            .bind(grn_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("GRN".to_string()))?;

        let supplier_name = sqlx::query_scalar::<_, String>("SELECT name FROM suppliers WHERE id = $1")
            .bind(grn.supplier_id)
            .fetch_one(&self.db)
            .await?;

        let items = sqlx::query_as::<_, GrnItem>(
            r#"
            SELECT gi.id, gi.grn_id, gi.item_id, i.code AS item_code, i.name AS item_name,
                   gi.quantity, gi.unit_cost, gi.line_total
            FROM grn_items gi
            JOIN items i ON i.id = gi.item_id
            WHERE gi.grn_id = $1
            ORDER BY i.code
            "#,
        )
        .bind(grn_id)
        .fetch_all(&self.db)
        .await?;

        Ok(GrnDetail {
            grn,
            supplier_name,
            items,
        })
    }

    /// List GRNs, newest first
    pub async fn list(&self, query: GrnQuery) -> AppResult<Vec<Grn>> {
        let grns = sqlx::query_as::<_, Grn>(&format!(
            r#"
            SELECT {GRN_COLUMNS}
            FROM grn
            WHERE ($1::uuid IS NULL OR supplier_id = $1)
              AND ($2::date IS NULL OR received_date >= $2)
              AND ($3::date IS NULL OR received_date <= $3)
            ORDER BY received_date DESC, created_at DESC
            "#
        ))
        .bind(query.supplier_id)
        .bind(query.from_date)
        .bind(query.to_date)
        .fetch_all(&self.db)
        .await?;

        Ok(grns)
    }

    /// Last price paid for an item, for pre-filling purchase lines
    pub async fn last_purchase(&self, item_id: Uuid) -> AppResult<LastPurchase> {
        sqlx::query_as::<_, LastPurchase>(
            r#"
            SELECT gi.item_id, g.supplier_id, s.name AS supplier_name, g.grn_no,
                   g.received_date, gi.unit_cost
            FROM grn_items gi
            JOIN grn g ON g.id = gi.grn_id
            JOIN suppliers s ON s.id = g.supplier_id
            WHERE gi.item_id = $1
            ORDER BY g.received_date DESC, g.created_at DESC
            LIMIT 1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase history".to_string()))
    }
}
