//! Trolley transfer models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Availability of a physical trolley
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrolleyStatus {
    Available,
    InUse,
}

impl TrolleyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrolleyStatus::Available => "available",
            TrolleyStatus::InUse => "in_use",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(TrolleyStatus::Available),
            "in_use" => Some(TrolleyStatus::InUse),
            _ => None,
        }
    }
}

/// Status of a production-to-store trolley movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    Pending,
    Verified,
    Rejected,
    Completed,
}

impl MovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementStatus::Pending => "pending",
            MovementStatus::Verified => "verified",
            MovementStatus::Rejected => "rejected",
            MovementStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MovementStatus::Pending),
            "verified" => Some(MovementStatus::Verified),
            "rejected" => Some(MovementStatus::Rejected),
            "completed" => Some(MovementStatus::Completed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: MovementStatus) -> bool {
        matches!(
            (self, next),
            (MovementStatus::Pending, MovementStatus::Verified)
                | (MovementStatus::Pending, MovementStatus::Rejected)
                | (MovementStatus::Verified, MovementStatus::Completed)
                | (MovementStatus::Rejected, MovementStatus::Pending)
        )
    }

    pub fn transition(self, next: MovementStatus) -> Result<MovementStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError { from: self, to: next })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MovementStatus::Completed)
    }
}

impl std::fmt::Display for MovementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot move trolley movement from {from} to {to}")]
pub struct TransitionError {
    pub from: MovementStatus,
    pub to: MovementStatus,
}

/// Counts and weights captured at the weigh-in step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeighIn {
    pub expected_units: i32,
    pub actual_units: i32,
    pub expected_weight: Decimal,
    pub actual_weight: Decimal,
    /// Allowed absolute weight deviation as a percentage of the expected weight
    pub tolerance_percent: Decimal,
}

/// Outcome of the verification gate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationOutcome {
    pub passed: bool,
    /// actual - expected
    pub unit_variance: i32,
    /// actual - expected
    pub weight_variance: Decimal,
    pub weight_variance_percent: Option<Decimal>,
    pub allowed_weight_variance: Decimal,
    pub rejection_reason: Option<String>,
}
