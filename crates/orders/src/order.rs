use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopledger_core::{
    Aggregate, AggregateRoot, CustomerId, DomainError, OperatorId, OrderId, PaymentMethod,
    PaymentStatus, ProductId,
};
use shopledger_events::Event;

/// Sales order status lifecycle.
///
/// `pending → processing → completed`; `completed` and `cancelled` are
/// terminal. `completed` is never assigned directly: it is derived from
/// the payment status reaching `paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

/// Line input as supplied by the boundary layer (amount not yet computed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit: String,
    pub quantity: i64,
    /// Grams; optional per-line weight.
    pub weight: i64,
    /// Minor currency units (cents).
    pub unit_price: i64,
}

/// Ordered-line snapshot: what was sold, at what price, frozen at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit: String,
    pub quantity: i64,
    pub weight: i64,
    pub unit_price: i64,
    /// quantity × unit_price, in cents.
    pub amount: i64,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    order_no: String,
    customer_id: Option<CustomerId>,
    customer_name: Option<String>,
    lines: Vec<OrderLine>,
    fulfilled_lines: Vec<u32>,
    total_quantity: i64,
    total_weight: i64,
    gross_amount: i64,
    discount_amount: i64,
    net_amount: i64,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    paid_amount: i64,
    status: OrderStatus,
    remark: Option<String>,
    operator: Option<OperatorId>,
    ordered_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            order_no: String::new(),
            customer_id: None,
            customer_name: None,
            lines: Vec::new(),
            fulfilled_lines: Vec::new(),
            total_quantity: 0,
            total_weight: 0,
            gross_amount: 0,
            discount_amount: 0,
            net_amount: 0,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Unpaid,
            paid_amount: 0,
            status: OrderStatus::Pending,
            remark: None,
            operator: None,
            ordered_at: None,
            completed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn order_no(&self) -> &str {
        &self.order_no
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn line_fulfilled(&self, line_no: u32) -> bool {
        self.fulfilled_lines.contains(&line_no)
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total_quantity(&self) -> i64 {
        self.total_quantity
    }

    pub fn total_weight(&self) -> i64 {
        self.total_weight
    }

    pub fn gross_amount(&self) -> i64 {
        self.gross_amount
    }

    pub fn discount_amount(&self) -> i64 {
        self.discount_amount
    }

    pub fn net_amount(&self) -> i64 {
        self.net_amount
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn paid_amount(&self) -> i64 {
        self.paid_amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn remark(&self) -> Option<&str> {
        self.remark.as_deref()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub order_no: String,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub lines: Vec<LineInput>,
    pub payment_method: PaymentMethod,
    pub discount_amount: i64,
    /// Amount settled up front, in cents. Zero for a fully unpaid order.
    pub paid_amount: i64,
    /// Cash tendered, when the upfront payment is cash.
    pub received_amount: Option<i64>,
    pub remark: Option<String>,
    pub operator: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: i64,
    pub received_amount: Option<i64>,
    pub transaction_no: Option<String>,
    pub operator: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FulfillLine (mark one line's stock deduction as done).
///
/// The order only tracks the bookkeeping; the stock movement itself is the
/// caller's responsibility and happens against the inventory aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillLine {
    pub order_id: OrderId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AmendOrder (restricted patch: remark and non-derived status only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendOrder {
    pub order_id: OrderId,
    pub remark: Option<String>,
    pub status: Option<OrderStatus>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    CreateOrder(CreateOrder),
    RecordPayment(RecordPayment),
    FulfillLine(FulfillLine),
    CancelOrder(CancelOrder),
    AmendOrder(AmendOrder),
}

/// Event: OrderCreated. Carries the computed totals, not the raw input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub order_no: String,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub lines: Vec<OrderLine>,
    pub total_quantity: i64,
    pub total_weight: i64,
    pub gross_amount: i64,
    pub discount_amount: i64,
    pub net_amount: i64,
    pub payment_method: PaymentMethod,
    pub remark: Option<String>,
    pub operator: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded. One append-only row per payment event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: i64,
    pub received_amount: Option<i64>,
    /// Only meaningful for cash: received − amount.
    pub change_amount: Option<i64>,
    pub transaction_no: Option<String>,
    pub operator: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineFulfilled. At most one per line over the order's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineFulfilled {
    pub order_id: OrderId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderAmended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAmended {
    pub order_id: OrderId,
    pub remark: Option<String>,
    pub status: Option<OrderStatus>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderCreated(OrderCreated),
    PaymentRecorded(PaymentRecorded),
    LineFulfilled(LineFulfilled),
    OrderCancelled(OrderCancelled),
    OrderAmended(OrderAmended),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "orders.order.created",
            OrderEvent::PaymentRecorded(_) => "orders.order.payment_recorded",
            OrderEvent::LineFulfilled(_) => "orders.order.line_fulfilled",
            OrderEvent::OrderCancelled(_) => "orders.order.cancelled",
            OrderEvent::OrderAmended(_) => "orders.order.amended",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(e) => e.occurred_at,
            OrderEvent::PaymentRecorded(e) => e.occurred_at,
            OrderEvent::LineFulfilled(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
            OrderEvent::OrderAmended(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderCreated(e) => {
                self.id = e.order_id;
                self.order_no = e.order_no.clone();
                self.customer_id = e.customer_id;
                self.customer_name = e.customer_name.clone();
                self.lines = e.lines.clone();
                self.total_quantity = e.total_quantity;
                self.total_weight = e.total_weight;
                self.gross_amount = e.gross_amount;
                self.discount_amount = e.discount_amount;
                self.net_amount = e.net_amount;
                self.payment_method = e.payment_method;
                self.payment_status = PaymentStatus::from_amounts(0, e.net_amount);
                self.paid_amount = 0;
                self.status = if self.payment_status.is_paid() {
                    OrderStatus::Completed
                } else {
                    OrderStatus::Pending
                };
                self.remark = e.remark.clone();
                self.operator = Some(e.operator);
                self.ordered_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::PaymentRecorded(e) => {
                self.paid_amount += e.amount;
                self.payment_status = PaymentStatus::from_amounts(self.paid_amount, self.net_amount);
                if self.payment_status.is_paid() {
                    self.status = OrderStatus::Completed;
                    self.completed_at = Some(e.occurred_at);
                }
            }
            OrderEvent::LineFulfilled(e) => {
                self.fulfilled_lines.push(e.line_no);
            }
            OrderEvent::OrderCancelled(_) => {
                self.status = OrderStatus::Cancelled;
            }
            OrderEvent::OrderAmended(e) => {
                if let Some(remark) = &e.remark {
                    self.remark = Some(remark.clone());
                }
                if let Some(status) = e.status {
                    self.status = status;
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateOrder(cmd) => self.handle_create(cmd),
            OrderCommand::RecordPayment(cmd) => self.handle_payment(cmd),
            OrderCommand::FulfillLine(cmd) => self.handle_fulfill(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
            OrderCommand::AmendOrder(cmd) => self.handle_amend(cmd),
        }
    }
}

fn change_for(method: PaymentMethod, received: Option<i64>, amount: i64) -> Option<i64> {
    match (method, received) {
        (PaymentMethod::Cash, Some(r)) => Some(r - amount),
        _ => None,
    }
}

impl Order {
    fn ensure_exists(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("order {order_id}")));
        }
        if self.id != order_id {
            return Err(DomainError::conflict("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must have at least one line"));
        }
        if cmd.discount_amount < 0 {
            return Err(DomainError::validation("discount cannot be negative"));
        }
        if cmd.paid_amount < 0 {
            return Err(DomainError::invalid_amount("paid amount cannot be negative"));
        }

        let mut total_quantity = 0i64;
        let mut total_weight = 0i64;
        let mut gross_amount = 0i64;
        let mut lines = Vec::with_capacity(cmd.lines.len());

        for (idx, input) in cmd.lines.iter().enumerate() {
            if input.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "line {}: quantity must be positive",
                    idx + 1
                )));
            }
            if input.unit_price < 0 || input.weight < 0 {
                return Err(DomainError::validation(format!(
                    "line {}: unit price and weight cannot be negative",
                    idx + 1
                )));
            }

            let amount = input.quantity * input.unit_price;
            total_quantity += input.quantity;
            total_weight += input.weight;
            gross_amount += amount;

            lines.push(OrderLine {
                line_no: (idx as u32) + 1,
                product_id: input.product_id,
                product_name: input.product_name.clone(),
                unit: input.unit.clone(),
                quantity: input.quantity,
                weight: input.weight,
                unit_price: input.unit_price,
                amount,
            });
        }

        if cmd.discount_amount > gross_amount {
            return Err(DomainError::validation(
                "discount cannot exceed the gross amount",
            ));
        }
        let net_amount = gross_amount - cmd.discount_amount;

        let mut events = vec![OrderEvent::OrderCreated(OrderCreated {
            order_id: cmd.order_id,
            order_no: cmd.order_no.clone(),
            customer_id: cmd.customer_id,
            customer_name: cmd.customer_name.clone(),
            lines,
            total_quantity,
            total_weight,
            gross_amount,
            discount_amount: cmd.discount_amount,
            net_amount,
            payment_method: cmd.payment_method,
            remark: cmd.remark.clone(),
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        })];

        if cmd.paid_amount > 0 {
            events.push(OrderEvent::PaymentRecorded(PaymentRecorded {
                order_id: cmd.order_id,
                method: cmd.payment_method,
                amount: cmd.paid_amount,
                received_amount: cmd.received_amount,
                change_amount: change_for(cmd.payment_method, cmd.received_amount, cmd.paid_amount),
                transaction_no: None,
                operator: cmd.operator,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_payment(&self, cmd: &RecordPayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::invalid_state(format!(
                "order {} is cancelled and cannot take payments",
                self.order_no
            )));
        }
        if self.payment_status.is_paid() {
            return Err(DomainError::invalid_state(format!(
                "order {} is already paid in full",
                self.order_no
            )));
        }
        if cmd.amount <= 0 {
            return Err(DomainError::invalid_amount(format!(
                "payment amount must be positive, got {}",
                cmd.amount
            )));
        }

        // Overpayment is deliberately not capped here; the caller owns that
        // policy and the paid total simply crosses the threshold to `paid`.
        Ok(vec![OrderEvent::PaymentRecorded(PaymentRecorded {
            order_id: cmd.order_id,
            method: cmd.method,
            amount: cmd.amount,
            received_amount: cmd.received_amount,
            change_amount: change_for(cmd.method, cmd.received_amount, cmd.amount),
            transaction_no: cmd.transaction_no.clone(),
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fulfill(&self, cmd: &FulfillLine) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::invalid_state(format!(
                "order {} is cancelled and cannot be fulfilled",
                self.order_no
            )));
        }
        if !self.lines.iter().any(|l| l.line_no == cmd.line_no) {
            return Err(DomainError::not_found(format!(
                "order {} line {}",
                self.order_no, cmd.line_no
            )));
        }
        if self.fulfilled_lines.contains(&cmd.line_no) {
            return Err(DomainError::conflict(format!(
                "order {} line {} is already fulfilled",
                self.order_no, cmd.line_no
            )));
        }

        Ok(vec![OrderEvent::LineFulfilled(LineFulfilled {
            order_id: cmd.order_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        match self.status {
            OrderStatus::Completed => Err(DomainError::invalid_state(format!(
                "order {} is completed and cannot be cancelled",
                self.order_no
            ))),
            OrderStatus::Cancelled => Err(DomainError::invalid_state(format!(
                "order {} is already cancelled",
                self.order_no
            ))),
            OrderStatus::Pending | OrderStatus::Processing => {
                Ok(vec![OrderEvent::OrderCancelled(OrderCancelled {
                    order_id: cmd.order_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }

    fn handle_amend(&self, cmd: &AmendOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::invalid_state(format!(
                "order {} is cancelled and cannot be amended",
                self.order_no
            )));
        }
        if let Some(status) = cmd.status {
            // Completed/cancelled are derived or terminal; a patch may only
            // move between the open states.
            if status.is_terminal() {
                return Err(DomainError::validation(
                    "status patch may only target pending or processing",
                ));
            }
            if self.status == OrderStatus::Completed {
                return Err(DomainError::invalid_state(
                    "a completed order's status is derived from its payments",
                ));
            }
        }
        if cmd.remark.is_none() && cmd.status.is_none() {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::OrderAmended(OrderAmended {
            order_id: cmd.order_id,
            remark: cmd.remark.clone(),
            status: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}
