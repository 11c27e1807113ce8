//! Database fixtures for service tests
//!
//! Tests that need PostgreSQL read `DATABASE_URL`; when it is unset they
//! return early and pass. Every fixture uses fresh codes, so runs can share
//! one database.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use shared::{ItemType, LocationType};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::config::InventoryConfig;
use crate::services::items::{CreateItemInput, CreateLocationInput, Item, ItemService, Location};

pub async fn test_db() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return None;
    };

    let db = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to test database");
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("run migrations");
    Some(db)
}

pub fn settings() -> InventoryConfig {
    InventoryConfig {
        default_weight_tolerance_percent: Decimal::from(2),
        allow_negative_stock: false,
    }
}

pub fn user() -> Uuid {
    Uuid::new_v4()
}

/// A date no other test run is numbering documents on
pub fn unique_date() -> NaiveDate {
    let offset = (Uuid::new_v4().as_u128() % 2_000_000) as i64;
    NaiveDate::from_ymd_opt(2200, 1, 1).expect("valid date") + Duration::days(offset)
}

/// Fresh master-data code with the given prefix
pub fn unique_code(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..12]).to_uppercase()
}

pub async fn create_item(db: &PgPool, item_type: ItemType, unit_weight: Option<Decimal>) -> Item {
    ItemService::new(db.clone())
        .create_item(CreateItemInput {
            code: unique_code("IT"),
            name: "Test item".to_string(),
            item_type,
            unit: "pcs".to_string(),
            category: None,
            cost_price: Some(Decimal::from(10)),
            unit_weight,
            weight_tolerance_percent: None,
        })
        .await
        .expect("create item")
}

pub async fn create_location(db: &PgPool, location_type: LocationType) -> Location {
    ItemService::new(db.clone())
        .create_location(CreateLocationInput {
            code: unique_code("LOC"),
            name: "Test location".to_string(),
            location_type,
        })
        .await
        .expect("create location")
}

/// Ledger rows written for one document, by transaction type
pub async fn ledger_rows(db: &PgPool, reference_id: Uuid) -> Vec<(String, Decimal, Decimal)> {
    sqlx::query_as::<_, (String, Decimal, Decimal)>(
        r#"
        SELECT transaction_type, quantity_in, quantity_out
        FROM stock_ledger
        WHERE reference_id = $1
        ORDER BY transaction_type, created_at
        "#,
    )
    .bind(reference_id)
    .fetch_all(db)
    .await
    .expect("load ledger rows")
}
