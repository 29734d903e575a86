//! Cross-aggregate engines. Each method is one business action: invariant
//! checks run before any write, then the affected aggregates are touched in a
//! fixed order.

mod credit;
mod inventory;
mod orders;
mod purchasing;
mod settlement;

pub use credit::CreditService;
pub use inventory::{InboundRequest, InventoryService, OutboundRequest};
pub use orders::{CreateOrderRequest, OrderEngine, PayOrderRequest};
pub use purchasing::{CreatePurchaseRequest, PurchaseWorkflow};
pub use settlement::SettlementAggregator;
