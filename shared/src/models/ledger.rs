//! Stock ledger classification

use serde::{Deserialize, Serialize};

/// Business transaction that produced a ledger row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerTransactionType {
    OpeningStock,
    GrnReceipt,
    RepackSource,
    RepackOutput,
    BundleSource,
    BundleOutput,
    BundleMaterial,
    ProductionConsumption,
    ProductionOutput,
    TransferOut,
    TransferIn,
    Sale,
    Adjustment,
    /// Offsetting entry appended when a document is deleted
    Reversal,
}

impl LedgerTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerTransactionType::OpeningStock => "opening_stock",
            LedgerTransactionType::GrnReceipt => "grn_receipt",
            LedgerTransactionType::RepackSource => "repack_source",
            LedgerTransactionType::RepackOutput => "repack_output",
            LedgerTransactionType::BundleSource => "bundle_source",
            LedgerTransactionType::BundleOutput => "bundle_output",
            LedgerTransactionType::BundleMaterial => "bundle_material",
            LedgerTransactionType::ProductionConsumption => "production_consumption",
            LedgerTransactionType::ProductionOutput => "production_output",
            LedgerTransactionType::TransferOut => "transfer_out",
            LedgerTransactionType::TransferIn => "transfer_in",
            LedgerTransactionType::Sale => "sale",
            LedgerTransactionType::Adjustment => "adjustment",
            LedgerTransactionType::Reversal => "reversal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "opening_stock" => Some(LedgerTransactionType::OpeningStock),
            "grn_receipt" => Some(LedgerTransactionType::GrnReceipt),
            "repack_source" => Some(LedgerTransactionType::RepackSource),
            "repack_output" => Some(LedgerTransactionType::RepackOutput),
            "bundle_source" => Some(LedgerTransactionType::BundleSource),
            "bundle_output" => Some(LedgerTransactionType::BundleOutput),
            "bundle_material" => Some(LedgerTransactionType::BundleMaterial),
            "production_consumption" => Some(LedgerTransactionType::ProductionConsumption),
            "production_output" => Some(LedgerTransactionType::ProductionOutput),
            "transfer_out" => Some(LedgerTransactionType::TransferOut),
            "transfer_in" => Some(LedgerTransactionType::TransferIn),
            "sale" => Some(LedgerTransactionType::Sale),
            "adjustment" => Some(LedgerTransactionType::Adjustment),
            "reversal" => Some(LedgerTransactionType::Reversal),
            _ => None,
        }
    }
}

/// Document a ledger row points back to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    OpeningStock,
    Grn,
    Repacking,
    Bundle,
    ProductionBatch,
    TrolleyMovement,
    SalesInvoice,
    StockCount,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::OpeningStock => "opening_stock",
            ReferenceType::Grn => "grn",
            ReferenceType::Repacking => "repacking",
            ReferenceType::Bundle => "bundle",
            ReferenceType::ProductionBatch => "production_batch",
            ReferenceType::TrolleyMovement => "trolley_movement",
            ReferenceType::SalesInvoice => "sales_invoice",
            ReferenceType::StockCount => "stock_count",
        }
    }
}
