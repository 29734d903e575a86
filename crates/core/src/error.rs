//! Domain error model.

use thiserror::Error;

use crate::id::{CustomerId, ProductId, PurchaseOrderId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every failure carries enough context (aggregate id, attempted amount,
/// current limit/balance/stock) for the boundary layer to render a
/// user-facing message without re-reading the aggregate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An operation was attempted from a disallowed lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced aggregate or record is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// An outbound movement would take stock below zero.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, on hand {on_hand}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        on_hand: i64,
    },

    /// Extending credit would push the balance past the customer's limit.
    #[error(
        "credit limit exceeded for customer {customer_id}: \
         attempted {attempted}, balance {balance}, limit {limit}"
    )]
    CreditLimitExceeded {
        customer_id: CustomerId,
        attempted: i64,
        balance: i64,
        limit: i64,
    },

    /// A purchase payment would exceed the order's total amount.
    #[error(
        "overpayment on purchase {purchase_id}: \
         attempted {attempted}, already paid {paid}, total {total}"
    )]
    OverPayment {
        purchase_id: PurchaseOrderId,
        attempted: i64,
        paid: i64,
        total: i64,
    },

    /// A payment or repayment amount is outside the allowed bounds.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
