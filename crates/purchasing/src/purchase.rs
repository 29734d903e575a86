//! Purchase order aggregate.
//!
//! Lifecycle is a one-way street: `Pending` → `Confirmed` → `Received`, with
//! `Cancelled` reachable from the first two states only. Once goods are
//! received the order can no longer be cancelled.
//!
//! Payments accumulate against the order total and may never exceed it; the
//! payment status is derived from the paid amount, never set directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopledger_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, OperatorId, PaymentMethod, PaymentStatus,
    ProductId, PurchaseOrderId, SupplierId,
};
use shopledger_events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Confirmed,
    Received,
    Cancelled,
}

impl PurchaseStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PurchaseStatus::Received | PurchaseStatus::Cancelled)
    }
}

/// A line as ordered. Quantity in units, weight in grams, price in cents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLineInput {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit: String,
    pub quantity: i64,
    pub weight: i64,
    pub unit_price: i64,
}

/// A line as stored, with received quantities filled in at receipt time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit: String,
    pub quantity: i64,
    pub weight: i64,
    pub unit_price: i64,
    pub amount: i64,
    pub received_quantity: i64,
    pub received_weight: i64,
}

/// What actually arrived for one line. Discrepancies against the ordered
/// quantity are recorded, not rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub line_no: u32,
    pub quantity: i64,
    pub weight: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchase {
    pub purchase_id: PurchaseOrderId,
    pub purchase_no: String,
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub lines: Vec<PurchaseLineInput>,
    pub remark: Option<String>,
    pub operator: Option<OperatorId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmPurchase {
    pub purchase_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivePurchase {
    pub purchase_id: PurchaseOrderId,
    pub receipts: Vec<ReceiptLine>,
    pub remark: Option<String>,
    pub operator: Option<OperatorId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelPurchase {
    pub purchase_id: PurchaseOrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPurchasePayment {
    pub purchase_id: PurchaseOrderId,
    pub amount: i64,
    pub method: PaymentMethod,
    pub operator: Option<OperatorId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PurchaseCommand {
    Create(CreatePurchase),
    Confirm(ConfirmPurchase),
    Receive(ReceivePurchase),
    Cancel(CancelPurchase),
    RecordPayment(RecordPurchasePayment),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PurchaseEvent {
    Created {
        purchase_id: PurchaseOrderId,
        purchase_no: String,
        supplier_id: SupplierId,
        supplier_name: String,
        lines: Vec<PurchaseLine>,
        total_amount: i64,
        remark: Option<String>,
        operator: Option<OperatorId>,
        occurred_at: DateTime<Utc>,
    },
    Confirmed {
        purchase_id: PurchaseOrderId,
        occurred_at: DateTime<Utc>,
    },
    Received {
        purchase_id: PurchaseOrderId,
        receipts: Vec<ReceiptLine>,
        remark: Option<String>,
        operator: Option<OperatorId>,
        occurred_at: DateTime<Utc>,
    },
    Cancelled {
        purchase_id: PurchaseOrderId,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    PaymentRecorded {
        purchase_id: PurchaseOrderId,
        amount: i64,
        method: PaymentMethod,
        operator: Option<OperatorId>,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for PurchaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseEvent::Created { .. } => "purchasing.purchase.created",
            PurchaseEvent::Confirmed { .. } => "purchasing.purchase.confirmed",
            PurchaseEvent::Received { .. } => "purchasing.purchase.received",
            PurchaseEvent::Cancelled { .. } => "purchasing.purchase.cancelled",
            PurchaseEvent::PaymentRecorded { .. } => "purchasing.purchase.payment_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseEvent::Created { occurred_at, .. }
            | PurchaseEvent::Confirmed { occurred_at, .. }
            | PurchaseEvent::Received { occurred_at, .. }
            | PurchaseEvent::Cancelled { occurred_at, .. }
            | PurchaseEvent::PaymentRecorded { occurred_at, .. } => *occurred_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PurchaseOrder {
    purchase_id: PurchaseOrderId,
    purchase_no: String,
    supplier_id: SupplierId,
    supplier_name: String,
    lines: Vec<PurchaseLine>,
    total_amount: i64,
    paid_amount: i64,
    payment_status: PaymentStatus,
    status: PurchaseStatus,
    remark: Option<String>,
    received_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    pub fn empty(purchase_id: PurchaseOrderId) -> Self {
        Self {
            purchase_id,
            purchase_no: String::new(),
            supplier_id: SupplierId::new(),
            supplier_name: String::new(),
            lines: Vec::new(),
            total_amount: 0,
            paid_amount: 0,
            payment_status: PaymentStatus::Unpaid,
            status: PurchaseStatus::Pending,
            remark: None,
            received_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn purchase_id(&self) -> PurchaseOrderId {
        self.purchase_id
    }

    pub fn purchase_no(&self) -> &str {
        &self.purchase_no
    }

    pub fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }

    pub fn lines(&self) -> &[PurchaseLine] {
        &self.lines
    }

    pub fn total_amount(&self) -> i64 {
        self.total_amount
    }

    pub fn paid_amount(&self) -> i64 {
        self.paid_amount
    }

    pub fn outstanding_amount(&self) -> i64 {
        self.total_amount - self.paid_amount
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn status(&self) -> PurchaseStatus {
        self.status
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    fn ensure_exists(&self) -> DomainResult<()> {
        if self.created {
            Ok(())
        } else {
            Err(DomainError::not_found(format!(
                "purchase order {}",
                self.purchase_id
            )))
        }
    }

    fn handle_create(&self, cmd: &CreatePurchase) -> DomainResult<Vec<PurchaseEvent>> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "purchase order {} already exists",
                cmd.purchase_id
            )));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "a purchase order needs at least one line",
            ));
        }

        let mut lines = Vec::with_capacity(cmd.lines.len());
        let mut total_amount = 0i64;
        for (idx, input) in cmd.lines.iter().enumerate() {
            if input.quantity <= 0 {
                return Err(DomainError::invalid_amount(format!(
                    "line {}: quantity must be positive",
                    idx + 1
                )));
            }
            if input.unit_price < 0 || input.weight < 0 {
                return Err(DomainError::invalid_amount(format!(
                    "line {}: price and weight must not be negative",
                    idx + 1
                )));
            }
            let amount = input.quantity * input.unit_price;
            total_amount += amount;
            lines.push(PurchaseLine {
                line_no: (idx + 1) as u32,
                product_id: input.product_id,
                product_name: input.product_name.clone(),
                unit: input.unit.clone(),
                quantity: input.quantity,
                weight: input.weight,
                unit_price: input.unit_price,
                amount,
                received_quantity: 0,
                received_weight: 0,
            });
        }

        Ok(vec![PurchaseEvent::Created {
            purchase_id: cmd.purchase_id,
            purchase_no: cmd.purchase_no.clone(),
            supplier_id: cmd.supplier_id,
            supplier_name: cmd.supplier_name.clone(),
            lines,
            total_amount,
            remark: cmd.remark.clone(),
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_confirm(&self, cmd: &ConfirmPurchase) -> DomainResult<Vec<PurchaseEvent>> {
        self.ensure_exists()?;
        if self.status != PurchaseStatus::Pending {
            return Err(DomainError::invalid_state(format!(
                "only a pending purchase order can be confirmed, this one is {:?}",
                self.status
            )));
        }
        Ok(vec![PurchaseEvent::Confirmed {
            purchase_id: cmd.purchase_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_receive(&self, cmd: &ReceivePurchase) -> DomainResult<Vec<PurchaseEvent>> {
        self.ensure_exists()?;
        if self.status != PurchaseStatus::Confirmed {
            return Err(DomainError::invalid_state(format!(
                "only a confirmed purchase order can be received, this one is {:?}",
                self.status
            )));
        }
        if cmd.receipts.is_empty() {
            return Err(DomainError::validation("a receipt needs at least one line"));
        }
        for receipt in &cmd.receipts {
            if !self.lines.iter().any(|l| l.line_no == receipt.line_no) {
                return Err(DomainError::validation(format!(
                    "receipt references unknown line {}",
                    receipt.line_no
                )));
            }
            if receipt.quantity < 0 || receipt.weight < 0 {
                return Err(DomainError::invalid_amount(format!(
                    "line {}: received quantity and weight must not be negative",
                    receipt.line_no
                )));
            }
        }
        Ok(vec![PurchaseEvent::Received {
            purchase_id: cmd.purchase_id,
            receipts: cmd.receipts.clone(),
            remark: cmd.remark.clone(),
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_cancel(&self, cmd: &CancelPurchase) -> DomainResult<Vec<PurchaseEvent>> {
        self.ensure_exists()?;
        match self.status {
            PurchaseStatus::Received => Err(DomainError::invalid_state(
                "a received purchase order cannot be cancelled",
            )),
            PurchaseStatus::Cancelled => Err(DomainError::invalid_state(
                "purchase order is already cancelled",
            )),
            PurchaseStatus::Pending | PurchaseStatus::Confirmed => {
                Ok(vec![PurchaseEvent::Cancelled {
                    purchase_id: cmd.purchase_id,
                    reason: cmd.reason.clone(),
                    occurred_at: cmd.occurred_at,
                }])
            }
        }
    }

    fn handle_payment(&self, cmd: &RecordPurchasePayment) -> DomainResult<Vec<PurchaseEvent>> {
        self.ensure_exists()?;
        if self.status == PurchaseStatus::Cancelled {
            return Err(DomainError::invalid_state(
                "a cancelled purchase order cannot be paid",
            ));
        }
        if cmd.amount <= 0 {
            return Err(DomainError::invalid_amount(
                "payment amount must be positive",
            ));
        }
        if self.paid_amount + cmd.amount > self.total_amount {
            return Err(DomainError::OverPayment {
                purchase_id: cmd.purchase_id,
                attempted: cmd.amount,
                paid: self.paid_amount,
                total: self.total_amount,
            });
        }
        Ok(vec![PurchaseEvent::PaymentRecorded {
            purchase_id: cmd.purchase_id,
            amount: cmd.amount,
            method: cmd.method,
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        }])
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.purchase_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseCommand;
    type Event = PurchaseEvent;
    type Error = DomainError;

    fn handle(&self, command: &Self::Command) -> DomainResult<Vec<Self::Event>> {
        match command {
            PurchaseCommand::Create(cmd) => self.handle_create(cmd),
            PurchaseCommand::Confirm(cmd) => self.handle_confirm(cmd),
            PurchaseCommand::Receive(cmd) => self.handle_receive(cmd),
            PurchaseCommand::Cancel(cmd) => self.handle_cancel(cmd),
            PurchaseCommand::RecordPayment(cmd) => self.handle_payment(cmd),
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseEvent::Created {
                purchase_no,
                supplier_id,
                supplier_name,
                lines,
                total_amount,
                remark,
                ..
            } => {
                self.purchase_no = purchase_no.clone();
                self.supplier_id = *supplier_id;
                self.supplier_name = supplier_name.clone();
                self.lines = lines.clone();
                self.total_amount = *total_amount;
                self.remark = remark.clone();
                self.payment_status = PaymentStatus::from_amounts(0, *total_amount);
                self.created = true;
            }
            PurchaseEvent::Confirmed { .. } => {
                self.status = PurchaseStatus::Confirmed;
            }
            PurchaseEvent::Received {
                receipts,
                occurred_at,
                ..
            } => {
                for receipt in receipts {
                    if let Some(line) =
                        self.lines.iter_mut().find(|l| l.line_no == receipt.line_no)
                    {
                        line.received_quantity = receipt.quantity;
                        line.received_weight = receipt.weight;
                    }
                }
                self.status = PurchaseStatus::Received;
                self.received_at = Some(*occurred_at);
            }
            PurchaseEvent::Cancelled { .. } => {
                self.status = PurchaseStatus::Cancelled;
            }
            PurchaseEvent::PaymentRecorded { amount, .. } => {
                self.paid_amount += amount;
                self.payment_status =
                    PaymentStatus::from_amounts(self.paid_amount, self.total_amount);
            }
        }
        self.version += 1;
    }
}
