//! Bill of materials (bom_peetu) service

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{material_requirements, validate_positive_quantity, BomComponent, ItemType};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{ensure, AppError, AppResult};

/// BOM service
#[derive(Clone)]
pub struct BomService {
    db: PgPool,
}

/// One component line of a finished item's BOM
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BomLine {
    pub id: Uuid,
    pub finished_item_id: Uuid,
    pub component_item_id: Uuid,
    pub component_code: String,
    pub component_name: String,
    pub unit: String,
    pub quantity_per_unit: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Component line on a set-BOM request
#[derive(Debug, Deserialize)]
pub struct BomComponentInput {
    pub component_item_id: Uuid,
    pub quantity_per_unit: Decimal,
}

/// Replace a finished item's components
#[derive(Debug, Deserialize)]
pub struct SetBomInput {
    pub components: Vec<BomComponentInput>,
}

/// Requirement for one component, with what is on hand
#[derive(Debug, Clone, Serialize)]
pub struct ComponentRequirement {
    pub component_item_id: Uuid,
    pub component_code: String,
    pub component_name: String,
    pub required_quantity: Decimal,
    pub current_stock: Decimal,
    pub shortfall: Decimal,
}

/// Materials needed to produce a quantity of a finished item
#[derive(Debug, Clone, Serialize)]
pub struct MaterialPlan {
    pub finished_item_id: Uuid,
    pub units: Decimal,
    pub requirements: Vec<ComponentRequirement>,
    pub can_produce: bool,
}

const BOM_SELECT: &str = r#"
    SELECT b.id, b.finished_item_id, b.component_item_id, i.code AS component_code,
           i.name AS component_name, i.unit, b.quantity_per_unit, b.created_at
    FROM bom_peetu b
    JOIN items i ON i.id = b.component_item_id
    WHERE b.finished_item_id = $1
    ORDER BY i.code
"#;

impl BomService {
    /// Create a new BomService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Replace the BOM of a finished item
    pub async fn set_components(
        &self,
        finished_item_id: Uuid,
        input: SetBomInput,
    ) -> AppResult<Vec<BomLine>> {
        if input.components.is_empty() {
            return Err(AppError::validation("components", "At least one component is required"));
        }
        let mut seen = HashSet::new();
        for component in &input.components {
            ensure("quantity_per_unit", validate_positive_quantity(component.quantity_per_unit))?;
            if component.component_item_id == finished_item_id {
                return Err(AppError::validation(
                    "component_item_id",
                    "An item cannot be a component of itself",
                ));
            }
            if !seen.insert(component.component_item_id) {
                return Err(AppError::validation(
                    "component_item_id",
                    "Each component may appear only once",
                ));
            }
        }

        let mut tx = self.db.begin().await?;

        let item_type = sqlx::query_scalar::<_, String>("SELECT item_type FROM items WHERE id = $1")
            .bind(finished_item_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Item".to_string()))?;
        if ItemType::from_str(&item_type) == Some(ItemType::Raw) {
            return Err(AppError::validation(
                "finished_item_id",
                "Raw materials cannot have a bill of materials",
            ));
        }

        sqlx::query("DELETE FROM bom_peetu WHERE finished_item_id = $1")
            .bind(finished_item_id)
            .execute(&mut *tx)
            .await?;

        for component in &input.components {
            sqlx::query(
                r#"
                INSERT INTO bom_peetu (finished_item_id, component_item_id, quantity_per_unit)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(finished_item_id)
            .bind(component.component_item_id)
            .bind(component.quantity_per_unit)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db) if db.is_foreign_key_violation() => {
                    AppError::NotFound("Component item".to_string())
                }
                _ => AppError::DatabaseError(e),
            })?;
        }

        tx.commit().await?;

        tracing::info!(
            finished_item_id = %finished_item_id,
            components = input.components.len(),
            "BOM replaced"
        );

        self.get(finished_item_id).await
    }

    /// Components of a finished item
    pub async fn get(&self, finished_item_id: Uuid) -> AppResult<Vec<BomLine>> {
        let lines = sqlx::query_as::<_, BomLine>(BOM_SELECT)
            .bind(finished_item_id)
            .fetch_all(&self.db)
            .await?;

        Ok(lines)
    }

    /// Materials needed for `units` of the finished item, against current stock
    pub async fn requirements(&self, finished_item_id: Uuid, units: Decimal) -> AppResult<MaterialPlan> {
        ensure("units", validate_positive_quantity(units))?;

        let lines = self.get(finished_item_id).await?;
        if lines.is_empty() {
            return Err(AppError::NotFound("Bill of materials".to_string()));
        }

        let stock: Vec<(Uuid, Decimal)> = sqlx::query_as(
            "SELECT id, current_stock FROM items WHERE id = ANY($1)",
        )
        .bind(lines.iter().map(|l| l.component_item_id).collect::<Vec<_>>())
        .fetch_all(&self.db)
        .await?;

        let components: Vec<BomComponent> = lines.iter().map(BomLine::component).collect();
        let requirements: Vec<ComponentRequirement> = material_requirements(&components, units)
            .into_iter()
            .zip(&lines)
            .map(|(req, line)| {
                let current_stock = stock
                    .iter()
                    .find(|(id, _)| *id == req.component_item_id)
                    .map(|(_, qty)| *qty)
                    .unwrap_or(Decimal::ZERO);
                ComponentRequirement {
                    component_item_id: req.component_item_id,
                    component_code: line.component_code.clone(),
                    component_name: line.component_name.clone(),
                    required_quantity: req.required_quantity,
                    current_stock,
                    shortfall: (req.required_quantity - current_stock).max(Decimal::ZERO),
                }
            })
            .collect();

        Ok(MaterialPlan {
            finished_item_id,
            units,
            can_produce: requirements.iter().all(|r| r.shortfall.is_zero()),
            requirements,
        })
    }

    /// Remove one component from a BOM
    pub async fn remove_component(
        &self,
        finished_item_id: Uuid,
        component_item_id: Uuid,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "DELETE FROM bom_peetu WHERE finished_item_id = $1 AND component_item_id = $2",
        )
        .bind(finished_item_id)
        .bind(component_item_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("BOM component".to_string()));
        }

        Ok(())
    }
}

impl BomLine {
    fn component(&self) -> BomComponent {
        BomComponent {
            component_item_id: self.component_item_id,
            quantity_per_unit: self.quantity_per_unit,
        }
    }
}

/// Load a finished item's components inside a transaction
pub(crate) async fn load_components(
    conn: &mut PgConnection,
    finished_item_id: Uuid,
) -> AppResult<Vec<BomComponent>> {
    let lines = sqlx::query_as::<_, BomLine>(BOM_SELECT)
        .bind(finished_item_id)
        .fetch_all(conn)
        .await?;

    Ok(lines.iter().map(BomLine::component).collect())
}
