//! Item and location classification

use serde::{Deserialize, Serialize};

/// Kind of stock an item represents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Raw,
    SemiFinished,
    Finished,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Raw => "raw",
            ItemType::SemiFinished => "semi_finished",
            ItemType::Finished => "finished",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "raw" => Some(ItemType::Raw),
            "semi_finished" => Some(ItemType::SemiFinished),
            "finished" => Some(ItemType::Finished),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemType::Raw => write!(f, "Raw Material"),
            ItemType::SemiFinished => write!(f, "Semi-Finished"),
            ItemType::Finished => write!(f, "Finished Good"),
        }
    }
}

/// Role a physical location plays in the flow of goods
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Store,
    Production,
    Warehouse,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Store => "store",
            LocationType::Production => "production",
            LocationType::Warehouse => "warehouse",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "store" => Some(LocationType::Store),
            "production" => Some(LocationType::Production),
            "warehouse" => Some(LocationType::Warehouse),
            _ => None,
        }
    }
}
