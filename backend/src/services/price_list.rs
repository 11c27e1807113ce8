//! Price list service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::validate_non_negative_amount;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure, AppError, AppResult};

/// Price list service
#[derive(Clone)]
pub struct PriceListService {
    db: PgPool,
}

/// Price list header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PriceList {
    pub id: Uuid,
    pub name: String,
    pub currency: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Price of one item on a list
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PriceListItem {
    pub id: Uuid,
    pub price_list_id: Uuid,
    pub item_id: Uuid,
    pub item_code: String,
    pub item_name: String,
    pub unit_price: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Price list with its prices
#[derive(Debug, Clone, Serialize)]
pub struct PriceListDetail {
    #[serde(flatten)]
    pub price_list: PriceList,
    pub items: Vec<PriceListItem>,
}

/// Input for creating a price list
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePriceListInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Input for setting an item's price
#[derive(Debug, Deserialize)]
pub struct SetPriceInput {
    pub item_id: Uuid,
    pub unit_price: Decimal,
}

/// Resolved price for an item
#[derive(Debug, Clone, Serialize)]
pub struct PriceLookup {
    pub item_id: Uuid,
    pub price_list_id: Uuid,
    pub unit_price: Decimal,
}

impl PriceListService {
    /// Create a new PriceListService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a price list. A new default list takes over from the previous one.
    pub async fn create(&self, input: CreatePriceListInput) -> AppResult<PriceList> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        if input.is_default {
            sqlx::query("UPDATE price_lists SET is_default = FALSE WHERE is_default")
                .execute(&mut *tx)
                .await?;
        }

        let price_list = sqlx::query_as::<_, PriceList>(
            r#"
            INSERT INTO price_lists (name, currency, is_default)
            VALUES ($1, COALESCE($2, 'LKR'), $3)
            RETURNING id, name, currency, is_default, created_at
            "#,
        )
        .bind(&input.name)
        .bind(input.currency.as_ref().map(|c| c.to_uppercase()))
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "name"))?;

        tx.commit().await?;

        Ok(price_list)
    }

    /// List price lists
    pub async fn list(&self) -> AppResult<Vec<PriceList>> {
        let lists = sqlx::query_as::<_, PriceList>(
            "SELECT id, name, currency, is_default, created_at FROM price_lists ORDER BY is_default DESC, name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(lists)
    }

    /// Get a price list with its prices
    pub async fn get(&self, price_list_id: Uuid) -> AppResult<PriceListDetail> {
        let price_list = sqlx::query_as::<_, PriceList>(
            "SELECT id, name, currency, is_default, created_at FROM price_lists WHERE id = $1",
        )
        .bind(price_list_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Price list".to_string()))?;

        let items = sqlx::query_as::<_, PriceListItem>(
            r#"
            SELECT pli.id, pli.price_list_id, pli.item_id, i.code AS item_code, i.name AS item_name,
                   pli.unit_price, pli.updated_at
            FROM price_list_items pli
            JOIN items i ON i.id = pli.item_id
            WHERE pli.price_list_id = $1
            ORDER BY i.code
            "#,
        )
        .bind(price_list_id)
        .fetch_all(&self.db)
        .await?;

        Ok(PriceListDetail { price_list, items })
    }

    /// Insert or replace an item's price on a list
    pub async fn set_price(&self, price_list_id: Uuid, input: SetPriceInput) -> AppResult<PriceListItem> {
        ensure("unit_price", validate_non_negative_amount(input.unit_price))?;

        let item = sqlx::query_as::<_, PriceListItem>(
            r#"
            WITH upserted AS (
                INSERT INTO price_list_items (price_list_id, item_id, unit_price)
                VALUES ($1, $2, $3)
                ON CONFLICT (price_list_id, item_id)
                DO UPDATE SET unit_price = EXCLUDED.unit_price, updated_at = NOW()
                RETURNING id, price_list_id, item_id, unit_price, updated_at
            )
            SELECT u.id, u.price_list_id, u.item_id, i.code AS item_code, i.name AS item_name,
                   u.unit_price, u.updated_at
            FROM upserted u
            JOIN items i ON i.id = u.item_id
            "#,
        )
        .bind(price_list_id)
        .bind(input.item_id)
        .bind(input.unit_price.round_dp(2))
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_foreign_key_violation() => {
                AppError::NotFound("Price list or item".to_string())
            }
            _ => AppError::DatabaseError(e),
        })?;

        Ok(item)
    }

    /// Remove an item's price from a list
    pub async fn remove_price(&self, price_list_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM price_list_items WHERE price_list_id = $1 AND item_id = $2")
            .bind(price_list_id)
            .bind(item_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Price".to_string()));
        }
        Ok(())
    }

    /// Price of an item on the given list, or on the default list
    pub async fn lookup(&self, item_id: Uuid, price_list_id: Option<Uuid>) -> AppResult<PriceLookup> {
        let mut conn = self.db.acquire().await?;
        resolve_price(&mut conn, item_id, price_list_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Price".to_string()))
    }
}

/// Resolve an item's price from a list (the default list when none is given)
pub(crate) async fn resolve_price(
    conn: &mut PgConnection,
    item_id: Uuid,
    price_list_id: Option<Uuid>,
) -> AppResult<Option<PriceLookup>> {
    let row = sqlx::query_as::<_, (Uuid, Decimal)>(
        r#"
        SELECT pl.id, pli.unit_price
        FROM price_list_items pli
        JOIN price_lists pl ON pl.id = pli.price_list_id
        WHERE pli.item_id = $1
          AND (($2::uuid IS NOT NULL AND pl.id = $2) OR ($2::uuid IS NULL AND pl.is_default))
        "#,
    )
    .bind(item_id)
    .bind(price_list_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|(price_list_id, unit_price)| PriceLookup {
        item_id,
        price_list_id,
        unit_price,
    }))
}
