//! Bill of materials models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One component line of a finished item's bill of materials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BomComponent {
    pub component_item_id: Uuid,
    /// Quantity of the component needed to make one unit of the finished item
    pub quantity_per_unit: Decimal,
}

/// Component quantity needed for a production run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialRequirement {
    pub component_item_id: Uuid,
    pub required_quantity: Decimal,
}
