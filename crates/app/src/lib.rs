//! `shopledger-app`: application layer.
//!
//! Wires the aggregate arenas, the journal, document numbering and the
//! product catalog into a [`Shop`], and exposes the engines that fan business
//! actions out across aggregates. Each single-aggregate step is
//! all-or-nothing; cross-aggregate sequences run one way, invariant checks
//! first, and are not transactional.

pub mod catalog;
pub mod engines;
pub mod error;
pub mod numbers;
pub mod store;

#[cfg(test)]
mod integration_tests;

use std::sync::Arc;

use shopledger_core::AggregateId;
use shopledger_events::Journal;
use shopledger_finance::FinanceLedger;
use shopledger_inventory::Stock;
use shopledger_orders::Order;
use shopledger_parties::{Customer, Supplier};
use shopledger_purchasing::PurchaseOrder;

pub use catalog::{ProductCatalog, ProductInfo};
pub use engines::{
    CreditService, InventoryService, OrderEngine, PurchaseWorkflow, SettlementAggregator,
};
pub use error::{AppError, AppResult};
pub use numbers::DocumentNumbers;
pub use store::Arena;

/// The assembled back office: shared infrastructure plus one arena per
/// aggregate type. Engines are cheap views over this.
pub struct Shop {
    pub(crate) journal: Arc<Journal>,
    pub(crate) numbers: Arc<DocumentNumbers>,
    pub(crate) catalog: Arc<ProductCatalog>,
    pub(crate) orders: Arena<Order>,
    pub(crate) stocks: Arena<Stock>,
    pub(crate) customers: Arena<Customer>,
    pub(crate) suppliers: Arena<Supplier>,
    pub(crate) purchases: Arena<PurchaseOrder>,
    pub(crate) ledger: Arena<FinanceLedger>,
    pub(crate) ledger_id: AggregateId,
}

impl Default for Shop {
    fn default() -> Self {
        Self::new()
    }
}

impl Shop {
    pub fn new() -> Self {
        let journal = Arc::new(Journal::new());
        Self {
            numbers: Arc::new(DocumentNumbers::new()),
            catalog: Arc::new(ProductCatalog::new()),
            orders: Arena::new("order", Arc::clone(&journal), Order::empty),
            stocks: Arena::new("stock", Arc::clone(&journal), Stock::empty),
            customers: Arena::new("customer", Arc::clone(&journal), Customer::empty),
            suppliers: Arena::new("supplier", Arc::clone(&journal), Supplier::empty),
            purchases: Arena::new("purchase_order", Arc::clone(&journal), PurchaseOrder::empty),
            ledger: Arena::new("finance_ledger", Arc::clone(&journal), FinanceLedger::empty),
            ledger_id: AggregateId::new(),
            journal,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn order_engine(&self) -> OrderEngine<'_> {
        OrderEngine::new(self)
    }

    pub fn inventory(&self) -> InventoryService<'_> {
        InventoryService::new(self)
    }

    pub fn credit(&self) -> CreditService<'_> {
        CreditService::new(self)
    }

    pub fn purchasing(&self) -> PurchaseWorkflow<'_> {
        PurchaseWorkflow::new(self)
    }

    pub fn settlement(&self) -> SettlementAggregator<'_> {
        SettlementAggregator::new(self)
    }
}
