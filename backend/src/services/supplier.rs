//! Supplier service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::validate_code;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure, AppError, AppResult};

/// Supplier service
#[derive(Clone)]
pub struct SupplierService {
    db: PgPool,
}

/// Supplier record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Supplier {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a supplier
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSupplierInput {
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    #[validate(length(max = 200))]
    pub contact_person: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Input for updating a supplier
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSupplierInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub contact_person: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Supplier list filter
#[derive(Debug, Deserialize)]
pub struct SupplierQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

const SUPPLIER_COLUMNS: &str =
    "id, code, name, contact_person, phone, email, address, is_active, created_at, updated_at";

impl SupplierService {
    /// Create a new SupplierService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a supplier
    pub async fn create(&self, input: CreateSupplierInput) -> AppResult<Supplier> {
        input.validate()?;
        ensure("code", validate_code(&input.code))?;

        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            r#"
            INSERT INTO suppliers (code, name, contact_person, phone, email, address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.contact_person)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::from_unique(e, "code"))?;

        tracing::info!(supplier_id = %supplier.id, code = %supplier.code, "Supplier created");

        Ok(supplier)
    }

    /// List suppliers
    pub async fn list(&self, query: SupplierQuery) -> AppResult<Vec<Supplier>> {
        let search = query.search.map(|s| format!("%{}%", s.to_lowercase()));

        let suppliers = sqlx::query_as::<_, Supplier>(&format!(
            r#"
            SELECT {SUPPLIER_COLUMNS}
            FROM suppliers
            WHERE ($1::text IS NULL OR LOWER(code) LIKE $1 OR LOWER(name) LIKE $1)
              AND ($2 OR is_active)
            ORDER BY name
            "#
        ))
        .bind(search)
        .bind(query.include_inactive)
        .fetch_all(&self.db)
        .await?;

        Ok(suppliers)
    }

    /// Get a supplier by ID
    pub async fn get(&self, supplier_id: Uuid) -> AppResult<Supplier> {
        sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1"
        ))
        .bind(supplier_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))
    }

    /// Update supplier details
    pub async fn update(&self, supplier_id: Uuid, input: UpdateSupplierInput) -> AppResult<Supplier> {
        input.validate()?;

        sqlx::query_as::<_, Supplier>(&format!(
            r#"
            UPDATE suppliers
            SET name = COALESCE($2, name),
                contact_person = COALESCE($3, contact_person),
                phone = COALESCE($4, phone),
                email = COALESCE($5, email),
                address = COALESCE($6, address),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(supplier_id)
        .bind(&input.name)
        .bind(&input.contact_person)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))
    }

    /// Deactivate a supplier. GRNs keep referring to it.
    pub async fn deactivate(&self, supplier_id: Uuid) -> AppResult<Supplier> {
        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            r#"
            UPDATE suppliers
            SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(supplier_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))?;

        tracing::info!(supplier_id = %supplier.id, "Supplier deactivated");

        Ok(supplier)
    }
}
