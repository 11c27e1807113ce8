//! Bundle service
//!
//! Bundling packs `packs_per_bundle` repacked packs (plus packaging
//! materials) into one bundle item. The source packs are drawn from
//! repacking records oldest-first; deleting a bundle gives them back
//! newest-first.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    bundle_source_quantity, validate_packs_per_bundle, validate_positive_quantity, Allocation,
    LedgerDelta, LedgerTransactionType, ReferenceType,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::items::{apply_receipt_cost, ensure_location, fetch_active_item};
use super::ledger::{LedgerPosting, LedgerWriter};
use super::next_document_number;
use super::repacking::{consume_fifo, restore_lifo};
use crate::config::InventoryConfig;
use crate::error::{ensure, AppError, AppResult};

/// Bundle service
#[derive(Clone)]
pub struct BundleService {
    db: PgPool,
    writer: LedgerWriter,
}

/// Bundle record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Bundle {
    pub id: Uuid,
    pub bundle_no: String,
    pub source_item_id: Uuid,
    pub source_quantity: Decimal,
    pub bundle_item_id: Uuid,
    pub bundle_quantity: Decimal,
    pub packs_per_bundle: i32,
    pub location_id: Uuid,
    pub bundle_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl Bundle {
    fn source_posting(&self) -> LedgerPosting<'_> {
        LedgerPosting::new(
            self.source_item_id,
            self.location_id,
            LedgerTransactionType::BundleSource,
            ReferenceType::Bundle,
            self.id,
            LedgerDelta::outbound(self.source_quantity),
        )
    }

    fn output_posting(&self) -> LedgerPosting<'_> {
        LedgerPosting::new(
            self.bundle_item_id,
            self.location_id,
            LedgerTransactionType::BundleOutput,
            ReferenceType::Bundle,
            self.id,
            LedgerDelta::inbound(self.bundle_quantity),
        )
    }

    fn material_posting(&self, material: &BundleMaterial) -> LedgerPosting<'_> {
        LedgerPosting::new(
            material.item_id,
            self.location_id,
            LedgerTransactionType::BundleMaterial,
            ReferenceType::Bundle,
            self.id,
            LedgerDelta::outbound(material.quantity),
        )
    }
}

/// Packaging material consumed by a bundle
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BundleMaterial {
    pub id: Uuid,
    pub bundle_id: Uuid,
    pub item_id: Uuid,
    pub item_code: String,
    pub item_name: String,
    /// Total consumed for the whole bundle run
    pub quantity: Decimal,
}

/// Bundle with its materials and the repacking records it drew from
#[derive(Debug, Clone, Serialize)]
pub struct BundleDetail {
    #[serde(flatten)]
    pub bundle: Bundle,
    pub materials: Vec<BundleMaterial>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allocations: Vec<Allocation>,
}

/// Packaging material line on a bundle request
#[derive(Debug, Deserialize)]
pub struct BundleMaterialInput {
    pub item_id: Uuid,
    pub quantity_per_bundle: Decimal,
}

/// Input for creating bundles
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBundleInput {
    pub source_item_id: Uuid,
    pub bundle_item_id: Uuid,
    pub location_id: Uuid,
    pub bundle_quantity: Decimal,
    pub packs_per_bundle: i32,
    pub bundle_date: NaiveDate,
    #[serde(default)]
    pub materials: Vec<BundleMaterialInput>,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// Bundle list filter
#[derive(Debug, Deserialize)]
pub struct BundleQuery {
    pub bundle_item_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Outcome of deleting a bundle
#[derive(Debug, Clone, Serialize)]
pub struct BundleDeletion {
    pub bundle_id: Uuid,
    pub restored_quantity: Decimal,
    /// Source packs no repacking record could take back
    pub unrestored_quantity: Decimal,
}

const BUNDLE_COLUMNS: &str = "id, bundle_no, source_item_id, source_quantity, bundle_item_id, \
     bundle_quantity, packs_per_bundle, location_id, bundle_date, notes, created_at, created_by";

impl BundleService {
    /// Create a new BundleService instance
    pub fn new(db: PgPool, settings: &InventoryConfig) -> Self {
        Self {
            db,
            writer: LedgerWriter::new(settings),
        }
    }

    /// Create bundles atomically: FIFO-draw the source packs, post source out,
    /// bundle in and materials out
    pub async fn create(&self, user_id: Uuid, input: CreateBundleInput) -> AppResult<BundleDetail> {
        input.validate()?;
        ensure("bundle_quantity", validate_positive_quantity(input.bundle_quantity))?;
        ensure("packs_per_bundle", validate_packs_per_bundle(input.packs_per_bundle))?;
        if input.source_item_id == input.bundle_item_id {
            return Err(AppError::validation(
                "bundle_item_id",
                "Bundle item must differ from the source item",
            ));
        }
        let mut seen = HashSet::new();
        for material in &input.materials {
            ensure("materials", validate_positive_quantity(material.quantity_per_bundle))?;
            if !seen.insert(material.item_id) {
                return Err(AppError::validation("materials", "Material items must be unique"));
            }
            if material.item_id == input.source_item_id || material.item_id == input.bundle_item_id {
                return Err(AppError::validation(
                    "materials",
                    "Materials cannot include the source or bundle item",
                ));
            }
        }

        let source_quantity = bundle_source_quantity(input.bundle_quantity, input.packs_per_bundle);

        let mut tx = self.db.begin().await?;

        let source = fetch_active_item(&mut tx, input.source_item_id).await?;
        fetch_active_item(&mut tx, input.bundle_item_id).await?;
        ensure_location(&mut tx, input.location_id).await?;

        let allocations =
            consume_fifo(&mut tx, input.source_item_id, input.location_id, source_quantity).await?;

        let bundle_no =
            next_document_number(&mut tx, "bundles", "bundle_no", "BND", input.bundle_date).await?;

        let bundle = sqlx::query_as::<_, Bundle>(&format!(
            r#"
            INSERT INTO bundles (
                bundle_no, source_item_id, source_quantity, bundle_item_id, bundle_quantity,
                packs_per_bundle, location_id, bundle_date, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {BUNDLE_COLUMNS}
            "#
        ))
        .bind(&bundle_no)
        .bind(input.source_item_id)
        .bind(source_quantity)
        .bind(input.bundle_item_id)
        .bind(input.bundle_quantity)
        .bind(input.packs_per_bundle)
        .bind(input.location_id)
        .bind(input.bundle_date)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "bundle_no"))?;

        // cost of one bundle: its packs plus its share of every material
        let mut bundle_cost = source.cost_price * Decimal::from(input.packs_per_bundle);
        let mut materials = Vec::with_capacity(input.materials.len());
        for line in &input.materials {
            let item = fetch_active_item(&mut tx, line.item_id).await?;
            bundle_cost += item.cost_price * line.quantity_per_bundle;

            let material = sqlx::query_as::<_, BundleMaterial>(
                r#"
                INSERT INTO bundle_materials (bundle_id, item_id, quantity)
                VALUES ($1, $2, $3)
                RETURNING id, bundle_id, item_id, $4::text AS item_code, $5::text AS item_name, quantity
                "#,
            )
            .bind(bundle.id)
            .bind(line.item_id)
            .bind(line.quantity_per_bundle * input.bundle_quantity)
            .bind(&item.code)
            .bind(&item.name)
            .fetch_one(&mut *tx)
            .await?;

            self.writer
                .post(
                    &mut tx,
                    bundle
                        .material_posting(&material)
                        .unit_cost(item.cost_price)
                        .created_by(user_id),
                )
                .await?;
            materials.push(material);
        }

        self.writer
            .post(
                &mut tx,
                bundle
                    .source_posting()
                    .unit_cost(source.cost_price)
                    .created_by(user_id),
            )
            .await?;

        apply_receipt_cost(&mut tx, bundle.bundle_item_id, bundle.bundle_quantity, bundle_cost)
            .await?;
        self.writer
            .post(
                &mut tx,
                bundle
                    .output_posting()
                    .unit_cost(bundle_cost.round_dp(4))
                    .created_by(user_id),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            bundle_id = %bundle.id,
            bundle_no = %bundle.bundle_no,
            bundles = %bundle.bundle_quantity,
            source_packs = %bundle.source_quantity,
            records = allocations.len(),
            "Bundle created"
        );

        Ok(BundleDetail {
            bundle,
            materials,
            allocations,
        })
    }

    /// Get a bundle with its materials
    pub async fn get(&self, bundle_id: Uuid) -> AppResult<BundleDetail> {
        let bundle = sqlx::query_as::<_, Bundle>(&format!(
            "SELECT {BUNDLE_COLUMNS} FROM bundles WHERE id = $1"
        ))
        .bind(bundle_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Bundle".to_string()))?;

        let materials = self.materials(bundle_id).await?;

        Ok(BundleDetail {
            bundle,
            materials,
            allocations: Vec::new(),
        })
    }

    async fn materials(&self, bundle_id: Uuid) -> AppResult<Vec<BundleMaterial>> {
        let materials = sqlx::query_as::<_, BundleMaterial>(
            r#"
            SELECT bm.id, bm.bundle_id, bm.item_id, i.code AS item_code, i.name AS item_name, bm.quantity
            FROM bundle_materials bm
            JOIN items i ON i.id = bm.item_id
            WHERE bm.bundle_id = $1
            ORDER BY i.code
            "#,
        )
        .bind(bundle_id)
        .fetch_all(&self.db)
        .await?;

        Ok(materials)
    }

    /// List bundles, newest first
    pub async fn list(&self, query: BundleQuery) -> AppResult<Vec<Bundle>> {
        let bundles = sqlx::query_as::<_, Bundle>(&format!(
            r#"
            SELECT {BUNDLE_COLUMNS}
            FROM bundles
            WHERE ($1::uuid IS NULL OR bundle_item_id = $1)
              AND ($2::uuid IS NULL OR location_id = $2)
              AND ($3::date IS NULL OR bundle_date >= $3)
              AND ($4::date IS NULL OR bundle_date <= $4)
            ORDER BY bundle_date DESC, created_at DESC
            "#
        ))
        .bind(query.bundle_item_id)
        .bind(query.location_id)
        .bind(query.from_date)
        .bind(query.to_date)
        .fetch_all(&self.db)
        .await?;

        Ok(bundles)
    }

    /// Delete a bundle: restore source packs LIFO, reverse every ledger entry
    pub async fn delete(&self, user_id: Uuid, bundle_id: Uuid) -> AppResult<BundleDeletion> {
        let mut tx = self.db.begin().await?;

        let bundle = sqlx::query_as::<_, Bundle>(&format!(
            "SELECT {BUNDLE_COLUMNS} FROM bundles WHERE id = $1 FOR UPDATE"
        ))
        .bind(bundle_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Bundle".to_string()))?;

        let materials = sqlx::query_as::<_, BundleMaterial>(
            r#"
            SELECT bm.id, bm.bundle_id, bm.item_id, i.code AS item_code, i.name AS item_name, bm.quantity
            FROM bundle_materials bm
            JOIN items i ON i.id = bm.item_id
            WHERE bm.bundle_id = $1
            "#,
        )
        .bind(bundle_id)
        .fetch_all(&mut *tx)
        .await?;

        // the bundled stock must still be on hand to take it back out
        self.writer
            .reverse(&mut tx, &bundle.output_posting(), user_id)
            .await?;
        self.writer
            .reverse(&mut tx, &bundle.source_posting(), user_id)
            .await?;
        for material in &materials {
            self.writer
                .reverse(&mut tx, &bundle.material_posting(material), user_id)
                .await?;
        }

        let plan = restore_lifo(
            &mut tx,
            bundle.source_item_id,
            bundle.location_id,
            bundle.source_quantity,
        )
        .await?;

        sqlx::query("DELETE FROM bundles WHERE id = $1")
            .bind(bundle_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            bundle_id = %bundle_id,
            bundle_no = %bundle.bundle_no,
            restored = %plan.restored,
            unrestored = %plan.unrestored,
            "Bundle deleted"
        );

        Ok(BundleDeletion {
            bundle_id,
            restored_quantity: plan.restored,
            unrestored_quantity: plan.unrestored,
        })
    }
}
