//! Quotation service

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    quotation_totals, validate_non_negative_amount, validate_percent, validate_positive_quantity,
    QuotationLine, QuotationStatus,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::customer::lock_active_customer;
use super::items::fetch_active_item;
use super::next_document_number;
use super::price_list::resolve_price;
use crate::error::{ensure, AppError, AppResult};

/// Quotation service
#[derive(Clone)]
pub struct QuotationService {
    db: PgPool,
}

/// Quotation header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Quotation {
    pub id: Uuid,
    pub quotation_no: String,
    pub customer_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_contact: Option<String>,
    pub price_list_id: Option<Uuid>,
    pub quotation_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub discount_percent: Decimal,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl Quotation {
    pub fn status(&self) -> AppResult<QuotationStatus> {
        QuotationStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown quotation status {}", self.status)))
    }
}

/// Quotation line
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QuotationItem {
    pub id: Uuid,
    pub quotation_id: Uuid,
    pub item_id: Uuid,
    pub item_code: String,
    pub item_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Quotation with its lines
#[derive(Debug, Clone, Serialize)]
pub struct QuotationDetail {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub items: Vec<QuotationItem>,
}

/// Line on a quotation request; price falls back to the price list
#[derive(Debug, Deserialize, Serialize)]
pub struct QuotationLineInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
}

/// Input for creating a quotation
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuotationInput {
    /// Registered customer; its name and price list are used when not given
    pub customer_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Customer name must be 1-200 characters"))]
    pub customer_name: Option<String>,
    #[validate(length(max = 200))]
    pub customer_contact: Option<String>,
    pub price_list_id: Option<Uuid>,
    pub quotation_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub discount_percent: Option<Decimal>,
    #[validate(length(min = 1, message = "At least one line is required"))]
    pub items: Vec<QuotationLineInput>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Input for moving a quotation through its workflow
#[derive(Debug, Deserialize)]
pub struct UpdateQuotationStatusInput {
    pub status: QuotationStatus,
}

/// Quotation list filter
#[derive(Debug, Deserialize)]
pub struct QuotationQuery {
    pub status: Option<QuotationStatus>,
    pub customer_id: Option<Uuid>,
    pub customer: Option<String>,
}

const QUOTATION_COLUMNS: &str = "id, quotation_no, customer_id, customer_name, customer_contact, price_list_id, \
     quotation_date, valid_until, discount_percent, subtotal, discount_amount, total, status, notes, \
     created_at, created_by";

impl QuotationService {
    /// Create a new QuotationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a draft quotation with computed totals
    pub async fn create(&self, user_id: Uuid, input: CreateQuotationInput) -> AppResult<QuotationDetail> {
        input.validate()?;
        let discount_percent = input.discount_percent.unwrap_or(Decimal::ZERO);
        ensure("discount_percent", validate_percent(discount_percent))?;
        if let Some(valid_until) = input.valid_until {
            if valid_until < input.quotation_date {
                return Err(AppError::validation(
                    "valid_until",
                    "Validity date cannot precede the quotation date",
                ));
            }
        }
        for line in &input.items {
            ensure("quantity", validate_positive_quantity(line.quantity))?;
            if let Some(price) = line.unit_price {
                ensure("unit_price", validate_non_negative_amount(price))?;
            }
        }

        let mut tx = self.db.begin().await?;

        let (customer_name, price_list_id) = match input.customer_id {
            Some(customer_id) => {
                let customer = lock_active_customer(&mut tx, customer_id).await?;
                (
                    input.customer_name.clone().unwrap_or(customer.name),
                    input.price_list_id.or(customer.price_list_id),
                )
            }
            None => (
                input.customer_name.clone().ok_or_else(|| {
                    AppError::validation("customer_name", "Customer or customer name is required")
                })?,
                input.price_list_id,
            ),
        };

        // resolve every price before writing anything
        let mut priced = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let item = fetch_active_item(&mut tx, line.item_id).await?;
            let unit_price = match line.unit_price {
                Some(price) => price,
                None => resolve_price(&mut tx, line.item_id, price_list_id)
                    .await?
                    .map(|p| p.unit_price)
                    .ok_or_else(|| {
                        AppError::validation(
                            "unit_price",
                            format!("No price for item {} on the price list", item.code),
                        )
                    })?,
            };
            priced.push((
                item,
                QuotationLine {
                    quantity: line.quantity,
                    unit_price: unit_price.round_dp(2),
                },
            ));
        }

        let lines: Vec<QuotationLine> = priced.iter().map(|(_, line)| line.clone()).collect();
        let totals = quotation_totals(&lines, discount_percent);

        let quotation_no = next_document_number(
            &mut tx,
            "quotations",
            "quotation_no",
            "QTN",
            input.quotation_date,
        )
        .await?;

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            r#"
            INSERT INTO quotations (
                quotation_no, customer_id, customer_name, customer_contact, price_list_id, quotation_date,
                valid_until, discount_percent, subtotal, discount_amount, total, status, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {QUOTATION_COLUMNS}
            "#
        ))
        .bind(&quotation_no)
        .bind(input.customer_id)
        .bind(&customer_name)
        .bind(&input.customer_contact)
        .bind(price_list_id)
        .bind(input.quotation_date)
        .bind(input.valid_until)
        .bind(discount_percent)
        .bind(totals.subtotal)
        .bind(totals.discount_amount)
        .bind(totals.total)
        .bind(QuotationStatus::Draft.as_str())
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_foreign_key_violation() => AppError::NotFound("Price list".to_string()),
            _ => AppError::from_unique(e, "quotation_no"),
        })?;

        let mut items = Vec::with_capacity(priced.len());
        for (item, line) in &priced {
            let row = sqlx::query_as::<_, QuotationItem>(
                r#"
                INSERT INTO quotation_items (quotation_id, item_id, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, quotation_id, item_id, $6::text AS item_code, $7::text AS item_name,
                          quantity, unit_price, line_total
                "#,
            )
            .bind(quotation.id)
            .bind(item.id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.line_total())
            .bind(&item.code)
            .bind(&item.name)
            .fetch_one(&mut *tx)
            .await?;
            items.push(row);
        }

        tx.commit().await?;

        tracing::info!(
            quotation_id = %quotation.id,
            quotation_no = %quotation.quotation_no,
            total = %quotation.total,
            "Quotation created"
        );

        Ok(QuotationDetail { quotation, items })
    }

    /// Get a quotation with its lines
    pub async fn get(&self, quotation_id: Uuid) -> AppResult<QuotationDetail> {
        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = $1"
        ))
        .bind(quotation_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Quotation".to_string()))?;

        let items = sqlx::query_as::<_, QuotationItem>(
            r#"
            SELECT qi.id, qi.quotation_id, qi.item_id, i.code AS item_code, i.name AS item_name,
                   qi.quantity, qi.unit_price, qi.line_total
            FROM quotation_items qi
            JOIN items i ON i.id = qi.item_id
            WHERE qi.quotation_id = $1
            "#,
        )
        .bind(quotation_id)
        .fetch_all(&self.db)
        .await?;

        Ok(QuotationDetail { quotation, items })
    }

    /// List quotations, newest first
    pub async fn list(&self, query: QuotationQuery) -> AppResult<Vec<Quotation>> {
        let customer = query.customer.map(|c| format!("%{}%", c.to_lowercase()));

        let quotations = sqlx::query_as::<_, Quotation>(&format!(
            r#"
            SELECT {QUOTATION_COLUMNS}
            FROM quotations
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR LOWER(customer_name) LIKE $2)
              AND ($3::uuid IS NULL OR customer_id = $3)
            ORDER BY quotation_date DESC, created_at DESC
            "#
        ))
        .bind(query.status.map(|s| s.as_str()))
        .bind(customer)
        .bind(query.customer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(quotations)
    }

    /// Move a quotation along draft -> sent -> accepted/rejected
    pub async fn update_status(
        &self,
        quotation_id: Uuid,
        input: UpdateQuotationStatusInput,
    ) -> AppResult<Quotation> {
        let mut tx = self.db.begin().await?;

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = $1 FOR UPDATE"
        ))
        .bind(quotation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Quotation".to_string()))?;

        let current = quotation.status()?;
        if !current.can_transition_to(input.status) {
            return Err(AppError::InvalidStateTransition(format!(
                "Cannot move quotation {} from {} to {}",
                quotation.quotation_no,
                current.as_str(),
                input.status.as_str()
            )));
        }

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            "UPDATE quotations SET status = $2 WHERE id = $1 RETURNING {QUOTATION_COLUMNS}"
        ))
        .bind(quotation_id)
        .bind(input.status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            quotation_id = %quotation.id,
            status = %quotation.status,
            "Quotation status updated"
        );

        Ok(quotation)
    }
}
