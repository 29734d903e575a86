//! Supplier aggregate.
//!
//! Mirrors the customer's credit ledger from the other side of the counter:
//! receiving purchased goods accrues a payable balance, paying the supplier
//! pays it down. Balance rows chain via `balance_before`/`balance_after` the
//! same way customer credit rows do.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopledger_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, OperatorId, PaymentMethod,
    PurchaseOrderId, SupplierId,
};
use shopledger_events::Event;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSupplier {
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: Option<String>,
    pub phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Increase what we owe the supplier, typically for a received purchase order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccruePayable {
    pub supplier_id: SupplierId,
    pub amount: i64,
    pub purchase_id: Option<PurchaseOrderId>,
    pub occurred_at: DateTime<Utc>,
}

/// Reduce the payable. The balance never goes below zero; paying more than is
/// owed is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayDownPayable {
    pub supplier_id: SupplierId,
    pub amount: i64,
    pub method: PaymentMethod,
    pub purchase_id: Option<PurchaseOrderId>,
    pub operator: Option<OperatorId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SupplierCommand {
    Register(RegisterSupplier),
    AccruePayable(AccruePayable),
    PayDownPayable(PayDownPayable),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SupplierEvent {
    Registered {
        supplier_id: SupplierId,
        name: String,
        contact: Option<String>,
        phone: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    PayableAccrued {
        supplier_id: SupplierId,
        amount: i64,
        balance_before: i64,
        balance_after: i64,
        purchase_id: Option<PurchaseOrderId>,
        occurred_at: DateTime<Utc>,
    },
    PayablePaid {
        supplier_id: SupplierId,
        amount: i64,
        balance_before: i64,
        balance_after: i64,
        method: PaymentMethod,
        purchase_id: Option<PurchaseOrderId>,
        operator: Option<OperatorId>,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for SupplierEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplierEvent::Registered { .. } => "parties.supplier.registered",
            SupplierEvent::PayableAccrued { .. } => "parties.supplier.payable_accrued",
            SupplierEvent::PayablePaid { .. } => "parties.supplier.payable_paid",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SupplierEvent::Registered { occurred_at, .. }
            | SupplierEvent::PayableAccrued { occurred_at, .. }
            | SupplierEvent::PayablePaid { occurred_at, .. } => *occurred_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Supplier {
    supplier_id: SupplierId,
    name: String,
    contact: Option<String>,
    phone: Option<String>,
    payable_balance: i64,
    total_purchased: i64,
    version: u64,
    created: bool,
}

impl Supplier {
    pub fn empty(supplier_id: SupplierId) -> Self {
        Self {
            supplier_id,
            name: String::new(),
            contact: None,
            phone: None,
            payable_balance: 0,
            total_purchased: 0,
            version: 0,
            created: false,
        }
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payable_balance(&self) -> i64 {
        self.payable_balance
    }

    pub fn total_purchased(&self) -> i64 {
        self.total_purchased
    }

    fn ensure_exists(&self) -> DomainResult<()> {
        if self.created {
            Ok(())
        } else {
            Err(DomainError::not_found(format!(
                "supplier {}",
                self.supplier_id
            )))
        }
    }

    fn handle_register(&self, cmd: &RegisterSupplier) -> DomainResult<Vec<SupplierEvent>> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "supplier {} already registered",
                cmd.supplier_id
            )));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("supplier name must not be empty"));
        }
        Ok(vec![SupplierEvent::Registered {
            supplier_id: cmd.supplier_id,
            name: cmd.name.clone(),
            contact: cmd.contact.clone(),
            phone: cmd.phone.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_accrue(&self, cmd: &AccruePayable) -> DomainResult<Vec<SupplierEvent>> {
        self.ensure_exists()?;
        if cmd.amount <= 0 {
            return Err(DomainError::invalid_amount(
                "payable amount must be positive",
            ));
        }
        Ok(vec![SupplierEvent::PayableAccrued {
            supplier_id: cmd.supplier_id,
            amount: cmd.amount,
            balance_before: self.payable_balance,
            balance_after: self.payable_balance + cmd.amount,
            purchase_id: cmd.purchase_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_pay_down(&self, cmd: &PayDownPayable) -> DomainResult<Vec<SupplierEvent>> {
        self.ensure_exists()?;
        if cmd.amount <= 0 {
            return Err(DomainError::invalid_amount(
                "payment amount must be positive",
            ));
        }
        if cmd.amount > self.payable_balance {
            return Err(DomainError::invalid_amount(format!(
                "payment of {} exceeds payable balance {}",
                cmd.amount, self.payable_balance
            )));
        }
        Ok(vec![SupplierEvent::PayablePaid {
            supplier_id: cmd.supplier_id,
            amount: cmd.amount,
            balance_before: self.payable_balance,
            balance_after: self.payable_balance - cmd.amount,
            method: cmd.method,
            purchase_id: cmd.purchase_id,
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        }])
    }
}

impl AggregateRoot for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.supplier_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Supplier {
    type Command = SupplierCommand;
    type Event = SupplierEvent;
    type Error = DomainError;

    fn handle(&self, command: &Self::Command) -> DomainResult<Vec<Self::Event>> {
        match command {
            SupplierCommand::Register(cmd) => self.handle_register(cmd),
            SupplierCommand::AccruePayable(cmd) => self.handle_accrue(cmd),
            SupplierCommand::PayDownPayable(cmd) => self.handle_pay_down(cmd),
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplierEvent::Registered {
                name,
                contact,
                phone,
                ..
            } => {
                self.name = name.clone();
                self.contact = contact.clone();
                self.phone = phone.clone();
                self.created = true;
            }
            SupplierEvent::PayableAccrued {
                amount,
                balance_after,
                ..
            } => {
                self.payable_balance = *balance_after;
                self.total_purchased += amount;
            }
            SupplierEvent::PayablePaid { balance_after, .. } => {
                self.payable_balance = *balance_after;
            }
        }
        self.version += 1;
    }
}
