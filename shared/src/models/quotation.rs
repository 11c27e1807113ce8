//! Quotation models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Quotation workflow status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::Sent => "sent",
            QuotationStatus::Accepted => "accepted",
            QuotationStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(QuotationStatus::Draft),
            "sent" => Some(QuotationStatus::Sent),
            "accepted" => Some(QuotationStatus::Accepted),
            "rejected" => Some(QuotationStatus::Rejected),
            _ => None,
        }
    }

    /// Draft -> Sent -> Accepted/Rejected. Accepted and rejected are terminal.
    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        matches!(
            (self, next),
            (QuotationStatus::Draft, QuotationStatus::Sent)
                | (QuotationStatus::Sent, QuotationStatus::Accepted)
                | (QuotationStatus::Sent, QuotationStatus::Rejected)
        )
    }
}

/// Priced quantity on a quotation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotationLine {
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl QuotationLine {
    pub fn line_total(&self) -> Decimal {
        (self.quantity * self.unit_price).round_dp(2)
    }
}

/// Computed quotation totals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotationTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
}
