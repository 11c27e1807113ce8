//! Production batch models

use serde::{Deserialize, Serialize};

/// Lifecycle of a production batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Planned,
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Planned => "planned",
            BatchStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(BatchStatus::Planned),
            "completed" => Some(BatchStatus::Completed),
            _ => None,
        }
    }
}
