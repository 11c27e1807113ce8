//! Customer service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{validate_code, validate_non_negative_amount};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure, AppError, AppResult};

/// Customer service
#[derive(Clone)]
pub struct CustomerService {
    db: PgPool,
}

/// Customer record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit: Option<Decimal>,
    pub price_list_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a customer
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerInput {
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
    pub credit_limit: Option<Decimal>,
    pub price_list_id: Option<Uuid>,
}

/// Input for updating a customer
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCustomerInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub contact_person: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit: Option<Decimal>,
    pub price_list_id: Option<Uuid>,
}

/// Customer list filter
#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

/// What a customer owes across open invoices
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomerBalance {
    pub customer_id: Uuid,
    pub open_invoices: i64,
    pub total_invoiced: Decimal,
    pub total_paid: Decimal,
    pub outstanding: Decimal,
    pub credit_limit: Option<Decimal>,
}

const CUSTOMER_COLUMNS: &str = "id, code, name, contact_person, phone, email, address, credit_limit, \
     price_list_id, is_active, created_at, updated_at";

fn price_list_missing(err: sqlx::Error, field: &str) -> AppError {
    match err.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => AppError::NotFound("Price list".to_string()),
        _ => AppError::from_unique(err, field),
    }
}

impl CustomerService {
    /// Create a new CustomerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a customer
    pub async fn create(&self, input: CreateCustomerInput) -> AppResult<Customer> {
        input.validate()?;
        ensure("code", validate_code(&input.code))?;
        if let Some(limit) = input.credit_limit {
            ensure("credit_limit", validate_non_negative_amount(limit))?;
        }

        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            INSERT INTO customers (code, name, contact_person, phone, email, address, credit_limit, price_list_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.contact_person)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(input.credit_limit)
        .bind(input.price_list_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| price_list_missing(e, "code"))?;

        tracing::info!(customer_id = %customer.id, code = %customer.code, "Customer created");

        Ok(customer)
    }

    /// List customers
    pub async fn list(&self, query: CustomerQuery) -> AppResult<Vec<Customer>> {
        let search = query.search.map(|s| format!("%{}%", s.to_lowercase()));

        let customers = sqlx::query_as::<_, Customer>(&format!(
            r#"
            SELECT {CUSTOMER_COLUMNS}
            FROM customers
            WHERE ($1::text IS NULL OR LOWER(code) LIKE $1 OR LOWER(name) LIKE $1)
              AND ($2 OR is_active)
            ORDER BY name
            "#
        ))
        .bind(search)
        .bind(query.include_inactive)
        .fetch_all(&self.db)
        .await?;

        Ok(customers)
    }

    /// Get a customer by ID
    pub async fn get(&self, customer_id: Uuid) -> AppResult<Customer> {
        sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))
    }

    /// Update customer details
    pub async fn update(&self, customer_id: Uuid, input: UpdateCustomerInput) -> AppResult<Customer> {
        input.validate()?;
        if let Some(limit) = input.credit_limit {
            ensure("credit_limit", validate_non_negative_amount(limit))?;
        }

        sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers
            SET name = COALESCE($2, name),
                contact_person = COALESCE($3, contact_person),
                phone = COALESCE($4, phone),
                email = COALESCE($5, email),
                address = COALESCE($6, address),
                credit_limit = COALESCE($7, credit_limit),
                price_list_id = COALESCE($8, price_list_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(customer_id)
        .bind(&input.name)
        .bind(&input.contact_person)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(input.credit_limit)
        .bind(input.price_list_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| price_list_missing(e, "code"))?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))
    }

    /// Deactivate a customer. Invoices and quotations keep referring to it.
    pub async fn deactivate(&self, customer_id: Uuid) -> AppResult<Customer> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers
            SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(customer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))?;

        tracing::info!(customer_id = %customer.id, "Customer deactivated");

        Ok(customer)
    }

    /// Invoiced, paid and outstanding totals over non-cancelled invoices
    pub async fn balance(&self, customer_id: Uuid) -> AppResult<CustomerBalance> {
        let customer = self.get(customer_id).await?;
        let mut conn = self.db.acquire().await?;
        let mut balance = outstanding_for(&mut conn, customer_id).await?;
        balance.credit_limit = customer.credit_limit;
        Ok(balance)
    }
}

/// Open invoice totals for a customer
pub(crate) async fn outstanding_for(
    conn: &mut PgConnection,
    customer_id: Uuid,
) -> AppResult<CustomerBalance> {
    let balance = sqlx::query_as::<_, CustomerBalance>(
        r#"
        SELECT $1::uuid AS customer_id,
               COUNT(*) FILTER (WHERE status IN ('unpaid', 'partially_paid')) AS open_invoices,
               COALESCE(SUM(total), 0) AS total_invoiced,
               COALESCE(SUM(amount_paid), 0) AS total_paid,
               COALESCE(SUM(total - amount_paid), 0) AS outstanding,
               NULL::numeric AS credit_limit
        FROM sales_invoices
        WHERE customer_id = $1 AND status <> 'cancelled'
        "#,
    )
    .bind(customer_id)
    .fetch_one(conn)
    .await?;

    Ok(balance)
}

/// Active customer row locked for the rest of the transaction
pub(crate) async fn lock_active_customer(
    conn: &mut PgConnection,
    customer_id: Uuid,
) -> AppResult<Customer> {
    let customer = sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1 FOR UPDATE"
    ))
    .bind(customer_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Customer".to_string()))?;

    if !customer.is_active {
        return Err(AppError::validation(
            "customer_id",
            format!("Customer {} is inactive", customer.code),
        ));
    }
    Ok(customer)
}
