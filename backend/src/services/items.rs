//! Item master and location service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    validate_code, validate_non_negative_amount, validate_percent, weighted_average_cost,
    ItemType, LocationType,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure, AppError, AppResult};

/// Item service for the item master and stock locations
#[derive(Clone)]
pub struct ItemService {
    db: PgPool,
}

/// Item record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Item {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub item_type: String,
    pub unit: String,
    pub category: Option<String>,
    pub current_stock: Decimal,
    pub cost_price: Decimal,
    pub unit_weight: Option<Decimal>,
    pub weight_tolerance_percent: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn item_type(&self) -> AppResult<ItemType> {
        ItemType::from_str(&self.item_type)
            .ok_or_else(|| AppError::Internal(format!("Unknown item type {}", self.item_type)))
    }
}

/// Location record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Location {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub location_type: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an item
#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemInput {
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    pub item_type: ItemType,
    #[validate(length(min = 1, max = 20, message = "Unit must be 1-20 characters"))]
    pub unit: String,
    #[validate(length(max = 100, message = "Category must be at most 100 characters"))]
    pub category: Option<String>,
    pub cost_price: Option<Decimal>,
    pub unit_weight: Option<Decimal>,
    pub weight_tolerance_percent: Option<Decimal>,
}

/// Input for updating an item
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 20, message = "Unit must be 1-20 characters"))]
    pub unit: Option<String>,
    #[validate(length(max = 100, message = "Category must be at most 100 characters"))]
    pub category: Option<String>,
    pub unit_weight: Option<Decimal>,
    pub weight_tolerance_percent: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Item list filter
#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub item_type: Option<ItemType>,
    pub category: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

/// Input for creating a location
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLocationInput {
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    pub location_type: LocationType,
}

const ITEM_COLUMNS: &str = "id, code, name, item_type, unit, category, current_stock, cost_price, \
     unit_weight, weight_tolerance_percent, is_active, created_at, updated_at";

fn check_weight_settings(
    unit_weight: Option<Decimal>,
    tolerance: Option<Decimal>,
) -> AppResult<()> {
    if let Some(weight) = unit_weight {
        if weight <= Decimal::ZERO {
            return Err(AppError::validation("unit_weight", "Unit weight must be positive"));
        }
    }
    if let Some(tolerance) = tolerance {
        ensure("weight_tolerance_percent", validate_percent(tolerance))?;
    }
    Ok(())
}

impl ItemService {
    /// Create a new ItemService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an item. Stock starts at zero and only moves through the ledger.
    pub async fn create_item(&self, input: CreateItemInput) -> AppResult<Item> {
        input.validate()?;
        ensure("code", validate_code(&input.code))?;
        check_weight_settings(input.unit_weight, input.weight_tolerance_percent)?;
        let cost_price = input.cost_price.unwrap_or(Decimal::ZERO);
        ensure("cost_price", validate_non_negative_amount(cost_price))?;

        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO items (code, name, item_type, unit, category, cost_price, unit_weight, weight_tolerance_percent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(&input.code)
        .bind(&input.name)
        .bind(input.item_type.as_str())
        .bind(&input.unit)
        .bind(&input.category)
        .bind(cost_price)
        .bind(input.unit_weight)
        .bind(input.weight_tolerance_percent)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::from_unique(e, "code"))?;

        tracing::info!(item_id = %item.id, code = %item.code, "Item created");

        Ok(item)
    }

    /// List items
    pub async fn list_items(&self, query: ItemQuery) -> AppResult<Vec<Item>> {
        let search = query.search.map(|s| format!("%{}%", s.to_lowercase()));

        let items = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE ($1::text IS NULL OR item_type = $1)
              AND ($2::text IS NULL OR category = $2)
              AND ($3::text IS NULL OR LOWER(code) LIKE $3 OR LOWER(name) LIKE $3)
              AND ($4 OR is_active)
            ORDER BY code
            "#
        ))
        .bind(query.item_type.map(|t| t.as_str()))
        .bind(query.category)
        .bind(search)
        .bind(query.include_inactive)
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    /// Get an item by ID
    pub async fn get_item(&self, item_id: Uuid) -> AppResult<Item> {
        sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(item_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Item".to_string()))
    }

    /// Update descriptive fields. Stock and cost are never edited directly.
    pub async fn update_item(&self, item_id: Uuid, input: UpdateItemInput) -> AppResult<Item> {
        input.validate()?;
        check_weight_settings(input.unit_weight, input.weight_tolerance_percent)?;

        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            UPDATE items
            SET name = COALESCE($2, name),
                unit = COALESCE($3, unit),
                category = COALESCE($4, category),
                unit_weight = COALESCE($5, unit_weight),
                weight_tolerance_percent = COALESCE($6, weight_tolerance_percent),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item_id)
        .bind(&input.name)
        .bind(&input.unit)
        .bind(&input.category)
        .bind(input.unit_weight)
        .bind(input.weight_tolerance_percent)
        .bind(input.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        Ok(item)
    }

    /// Create a stock location
    pub async fn create_location(&self, input: CreateLocationInput) -> AppResult<Location> {
        input.validate()?;
        ensure("code", validate_code(&input.code))?;

        let location = sqlx::query_as::<_, Location>(
            r#"
            INSERT INTO locations (code, name, location_type)
            VALUES ($1, $2, $3)
            RETURNING id, code, name, location_type, created_at
            "#,
        )
        .bind(&input.code)
        .bind(&input.name)
        .bind(input.location_type.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::from_unique(e, "code"))?;

        Ok(location)
    }

    /// List stock locations
    pub async fn list_locations(&self) -> AppResult<Vec<Location>> {
        let locations = sqlx::query_as::<_, Location>(
            "SELECT id, code, name, location_type, created_at FROM locations ORDER BY code",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(locations)
    }
}

/// Load an active item inside a transaction
pub(crate) async fn fetch_active_item(conn: &mut PgConnection, item_id: Uuid) -> AppResult<Item> {
    let item = sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
        .bind(item_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

    if !item.is_active {
        return Err(AppError::validation("item_id", format!("Item {} is inactive", item.code)));
    }
    Ok(item)
}

/// Fail with `NotFound` unless the location exists
pub(crate) async fn ensure_location(conn: &mut PgConnection, location_id: Uuid) -> AppResult<()> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM locations WHERE id = $1)")
            .bind(location_id)
            .fetch_one(conn)
            .await?;
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound("Location".to_string()))
    }
}

/// Re-average the item's cost price for an incoming receipt
///
/// Must run before the receipt's ledger entry so `current_stock` still holds
/// the pre-receipt quantity.
pub(crate) async fn apply_receipt_cost(
    conn: &mut PgConnection,
    item_id: Uuid,
    quantity: Decimal,
    unit_cost: Decimal,
) -> AppResult<Decimal> {
    let (current_stock, cost_price) = sqlx::query_as::<_, (Decimal, Decimal)>(
        "SELECT current_stock, cost_price FROM items WHERE id = $1 FOR UPDATE",
    )
    .bind(item_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

    let averaged = weighted_average_cost(current_stock, cost_price, quantity, unit_cost);

    sqlx::query("UPDATE items SET cost_price = $2, updated_at = NOW() WHERE id = $1")
        .bind(item_id)
        .bind(averaged)
        .execute(&mut *conn)
        .await?;

    tracing::debug!(item_id = %item_id, previous = %cost_price, averaged = %averaged, "Cost price re-averaged");

    Ok(averaged)
}
