//! `shopledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod payment;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{
    AggregateId, AlertId, CustomerId, OperatorId, OrderId, ProductId, PurchaseOrderId, SupplierId,
};
pub use payment::{PaymentMethod, PaymentStatus};
