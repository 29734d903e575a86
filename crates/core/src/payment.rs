//! Shared payment vocabulary.
//!
//! Orders and purchases derive their payment status from monetary deltas
//! with the same threshold rule, so the rule lives here once.

use serde::{Deserialize, Serialize};

/// How money changed hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Wechat,
    Alipay,
    Card,
    /// Sale on account: the customer's credit balance absorbs the amount.
    Credit,
}

impl PaymentMethod {
    /// All methods in reporting order, for stable per-method breakdowns.
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Cash,
        PaymentMethod::Wechat,
        PaymentMethod::Alipay,
        PaymentMethod::Card,
        PaymentMethod::Credit,
    ];
}

/// Payment progress of an order or purchase, always derived, never assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    /// Derive the status from the amount paid so far against the amount due.
    ///
    /// `paid >= due` is paid even when overpaid; a zero or negative due
    /// amount with nothing paid still counts as paid (nothing is owed).
    pub fn from_amounts(paid: i64, due: i64) -> Self {
        if paid >= due {
            PaymentStatus::Paid
        } else if paid > 0 {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }

    pub fn is_paid(self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}
