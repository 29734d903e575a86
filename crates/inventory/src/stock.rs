//! Per-product stock aggregate.
//!
//! One `Stock` exists per product. Movements adjust the on-hand quantity and
//! total weight; the quantity never goes negative, and an outbound that would
//! overdraw is rejected with [`DomainError::InsufficientStock`].
//!
//! Low-stock alerting is folded into the movement handlers: an outbound that
//! lands at or below the effective minimum raises an alert, an inbound that
//! climbs back above it clears the open one. At most one unhandled alert
//! exists per product at any time, which the state makes structural by holding
//! it in an `Option`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopledger_core::{
    Aggregate, AggregateRoot, AlertId, DomainError, DomainResult, OperatorId, OrderId, ProductId,
    PurchaseOrderId, SupplierId,
};
use shopledger_events::Event;

/// Where an inbound movement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboundKind {
    /// Goods received against a purchase order.
    Purchase,
    /// Customer return restocked.
    Return,
    /// Manual stocktake correction.
    Adjust,
}

/// Why an outbound movement left the shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundKind {
    /// Fulfilment of a sales order line.
    Sale,
    /// Damaged or expired goods written off.
    Damage,
    /// Manual stocktake correction.
    Adjust,
}

/// Severity of a low-stock alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl AlertLevel {
    /// Critical once the remaining quantity is at or below half the minimum.
    fn for_quantity(quantity: i64, min_quantity: i64) -> Self {
        if quantity * 2 <= min_quantity {
            AlertLevel::Critical
        } else {
            AlertLevel::Warning
        }
    }
}

/// The currently unhandled low-stock alert, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAlert {
    pub alert_id: AlertId,
    pub level: AlertLevel,
    pub current_stock: i64,
    pub min_stock: i64,
    pub raised_at: DateTime<Utc>,
}

/// Record goods arriving. Quantity in units, weight in grams.
///
/// `product_min_stock` is the product's default minimum, used when this stock
/// row carries no per-product override; the caller looks it up from the
/// catalog so the handler stays pure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordInbound {
    pub product_id: ProductId,
    pub inbound_no: String,
    pub kind: InboundKind,
    pub quantity: i64,
    pub weight: i64,
    pub unit_price: Option<i64>,
    pub purchase_id: Option<PurchaseOrderId>,
    pub supplier_id: Option<SupplierId>,
    pub batch_no: Option<String>,
    pub remark: Option<String>,
    pub product_min_stock: i64,
    pub operator: Option<OperatorId>,
    pub occurred_at: DateTime<Utc>,
}

/// Record goods leaving. Fails rather than overdraw the on-hand quantity.
///
/// `alert_id` is the identifier a newly raised alert will carry; the caller
/// mints it up front so the handler stays deterministic. It is ignored when
/// no alert fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOutbound {
    pub product_id: ProductId,
    pub outbound_no: String,
    pub kind: OutboundKind,
    pub quantity: i64,
    pub weight: i64,
    pub order_id: Option<OrderId>,
    pub reason: Option<String>,
    pub product_min_stock: i64,
    pub alert_id: AlertId,
    pub operator: Option<OperatorId>,
    pub occurred_at: DateTime<Utc>,
}

/// Set or clear the per-product threshold overrides. `None` leaves a field
/// unchanged; an explicit `0` for the minimum disables alerting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetThresholds {
    pub product_id: ProductId,
    pub min_quantity: Option<i64>,
    pub max_quantity: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Mark the open alert as dealt with by an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleAlert {
    pub product_id: ProductId,
    pub alert_id: AlertId,
    pub operator: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StockCommand {
    RecordInbound(RecordInbound),
    RecordOutbound(RecordOutbound),
    SetThresholds(SetThresholds),
    HandleAlert(HandleAlert),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StockEvent {
    InboundRecorded {
        product_id: ProductId,
        inbound_no: String,
        kind: InboundKind,
        quantity: i64,
        weight: i64,
        unit_price: Option<i64>,
        total_amount: Option<i64>,
        purchase_id: Option<PurchaseOrderId>,
        supplier_id: Option<SupplierId>,
        batch_no: Option<String>,
        remark: Option<String>,
        operator: Option<OperatorId>,
        occurred_at: DateTime<Utc>,
    },
    OutboundRecorded {
        product_id: ProductId,
        outbound_no: String,
        kind: OutboundKind,
        quantity: i64,
        weight: i64,
        order_id: Option<OrderId>,
        reason: Option<String>,
        operator: Option<OperatorId>,
        occurred_at: DateTime<Utc>,
    },
    AlertRaised {
        product_id: ProductId,
        alert_id: AlertId,
        level: AlertLevel,
        current_stock: i64,
        min_stock: i64,
        occurred_at: DateTime<Utc>,
    },
    /// Stock climbed back above the minimum; the open alert resolves itself.
    AlertCleared {
        product_id: ProductId,
        alert_id: AlertId,
        occurred_at: DateTime<Utc>,
    },
    AlertHandled {
        product_id: ProductId,
        alert_id: AlertId,
        operator: OperatorId,
        occurred_at: DateTime<Utc>,
    },
    ThresholdsSet {
        product_id: ProductId,
        min_quantity: i64,
        max_quantity: Option<i64>,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::InboundRecorded { .. } => "inventory.stock.inbound_recorded",
            StockEvent::OutboundRecorded { .. } => "inventory.stock.outbound_recorded",
            StockEvent::AlertRaised { .. } => "inventory.stock.alert_raised",
            StockEvent::AlertCleared { .. } => "inventory.stock.alert_cleared",
            StockEvent::AlertHandled { .. } => "inventory.stock.alert_handled",
            StockEvent::ThresholdsSet { .. } => "inventory.stock.thresholds_set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::InboundRecorded { occurred_at, .. }
            | StockEvent::OutboundRecorded { occurred_at, .. }
            | StockEvent::AlertRaised { occurred_at, .. }
            | StockEvent::AlertCleared { occurred_at, .. }
            | StockEvent::AlertHandled { occurred_at, .. }
            | StockEvent::ThresholdsSet { occurred_at, .. } => *occurred_at,
        }
    }
}

/// Stock row for a single product. Quantity starts at zero and the row exists
/// implicitly, so the first movement needs no separate creation step.
#[derive(Debug, Clone)]
pub struct Stock {
    product_id: ProductId,
    quantity: i64,
    total_weight: i64,
    /// Per-product minimum override; `0` means "use the product default".
    min_quantity: i64,
    max_quantity: Option<i64>,
    open_alert: Option<OpenAlert>,
    version: u64,
}

impl Stock {
    pub fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            quantity: 0,
            total_weight: 0,
            min_quantity: 0,
            max_quantity: None,
            open_alert: None,
            version: 0,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn total_weight(&self) -> i64 {
        self.total_weight
    }

    pub fn min_quantity(&self) -> i64 {
        self.min_quantity
    }

    pub fn max_quantity(&self) -> Option<i64> {
        self.max_quantity
    }

    pub fn open_alert(&self) -> Option<&OpenAlert> {
        self.open_alert.as_ref()
    }

    /// The minimum that alerting actually compares against: the per-product
    /// override when set, otherwise the catalog default. Zero disables.
    fn effective_min(&self, product_default: i64) -> i64 {
        if self.min_quantity > 0 {
            self.min_quantity
        } else {
            product_default
        }
    }

    fn handle_inbound(&self, cmd: &RecordInbound) -> DomainResult<Vec<StockEvent>> {
        if cmd.quantity <= 0 {
            return Err(DomainError::invalid_amount(
                "inbound quantity must be positive",
            ));
        }
        if cmd.weight < 0 {
            return Err(DomainError::invalid_amount(
                "inbound weight must not be negative",
            ));
        }
        if cmd.unit_price.is_some_and(|p| p < 0) {
            return Err(DomainError::invalid_amount(
                "inbound unit price must not be negative",
            ));
        }

        let total_amount = cmd.unit_price.map(|p| p * cmd.quantity);
        let mut events = vec![StockEvent::InboundRecorded {
            product_id: cmd.product_id,
            inbound_no: cmd.inbound_no.clone(),
            kind: cmd.kind,
            quantity: cmd.quantity,
            weight: cmd.weight,
            unit_price: cmd.unit_price,
            total_amount,
            purchase_id: cmd.purchase_id,
            supplier_id: cmd.supplier_id,
            batch_no: cmd.batch_no.clone(),
            remark: cmd.remark.clone(),
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        }];

        let remaining = self.quantity + cmd.quantity;
        let min = self.effective_min(cmd.product_min_stock);
        if let Some(alert) = &self.open_alert {
            if remaining > min {
                events.push(StockEvent::AlertCleared {
                    product_id: cmd.product_id,
                    alert_id: alert.alert_id,
                    occurred_at: cmd.occurred_at,
                });
            }
        }
        Ok(events)
    }

    fn handle_outbound(&self, cmd: &RecordOutbound) -> DomainResult<Vec<StockEvent>> {
        if cmd.quantity <= 0 {
            return Err(DomainError::invalid_amount(
                "outbound quantity must be positive",
            ));
        }
        if cmd.weight < 0 {
            return Err(DomainError::invalid_amount(
                "outbound weight must not be negative",
            ));
        }
        if cmd.quantity > self.quantity {
            return Err(DomainError::InsufficientStock {
                product_id: cmd.product_id,
                requested: cmd.quantity,
                on_hand: self.quantity,
            });
        }

        let mut events = vec![StockEvent::OutboundRecorded {
            product_id: cmd.product_id,
            outbound_no: cmd.outbound_no.clone(),
            kind: cmd.kind,
            quantity: cmd.quantity,
            weight: cmd.weight,
            order_id: cmd.order_id,
            reason: cmd.reason.clone(),
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        }];

        let remaining = self.quantity - cmd.quantity;
        let min = self.effective_min(cmd.product_min_stock);
        if min > 0 && remaining <= min && self.open_alert.is_none() {
            events.push(StockEvent::AlertRaised {
                product_id: cmd.product_id,
                alert_id: cmd.alert_id,
                level: AlertLevel::for_quantity(remaining, min),
                current_stock: remaining,
                min_stock: min,
                occurred_at: cmd.occurred_at,
            });
        }
        Ok(events)
    }

    fn handle_set_thresholds(&self, cmd: &SetThresholds) -> DomainResult<Vec<StockEvent>> {
        if cmd.min_quantity.is_some_and(|m| m < 0) {
            return Err(DomainError::validation(
                "minimum quantity must not be negative",
            ));
        }
        if cmd.max_quantity.is_some_and(|m| m < 0) {
            return Err(DomainError::validation(
                "maximum quantity must not be negative",
            ));
        }
        if cmd.min_quantity.is_none() && cmd.max_quantity.is_none() {
            return Ok(vec![]);
        }
        Ok(vec![StockEvent::ThresholdsSet {
            product_id: cmd.product_id,
            min_quantity: cmd.min_quantity.unwrap_or(self.min_quantity),
            max_quantity: cmd.max_quantity.or(self.max_quantity),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_alert(&self, cmd: &HandleAlert) -> DomainResult<Vec<StockEvent>> {
        let Some(alert) = &self.open_alert else {
            return Err(DomainError::not_found(format!(
                "no open alert for product {}",
                cmd.product_id
            )));
        };
        if alert.alert_id != cmd.alert_id {
            return Err(DomainError::not_found(format!("alert {}", cmd.alert_id)));
        }
        Ok(vec![StockEvent::AlertHandled {
            product_id: cmd.product_id,
            alert_id: cmd.alert_id,
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        }])
    }
}

impl AggregateRoot for Stock {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Stock {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn handle(&self, command: &Self::Command) -> DomainResult<Vec<Self::Event>> {
        match command {
            StockCommand::RecordInbound(cmd) => self.handle_inbound(cmd),
            StockCommand::RecordOutbound(cmd) => self.handle_outbound(cmd),
            StockCommand::SetThresholds(cmd) => self.handle_set_thresholds(cmd),
            StockCommand::HandleAlert(cmd) => self.handle_alert(cmd),
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::InboundRecorded {
                quantity, weight, ..
            } => {
                self.quantity += quantity;
                self.total_weight += weight;
            }
            StockEvent::OutboundRecorded {
                quantity, weight, ..
            } => {
                self.quantity -= quantity;
                // Weight bookkeeping is advisory; quantity carries the invariant.
                self.total_weight = (self.total_weight - weight).max(0);
            }
            StockEvent::AlertRaised {
                alert_id,
                level,
                current_stock,
                min_stock,
                occurred_at,
                ..
            } => {
                self.open_alert = Some(OpenAlert {
                    alert_id: *alert_id,
                    level: *level,
                    current_stock: *current_stock,
                    min_stock: *min_stock,
                    raised_at: *occurred_at,
                });
            }
            StockEvent::AlertCleared { .. } | StockEvent::AlertHandled { .. } => {
                self.open_alert = None;
            }
            StockEvent::ThresholdsSet {
                min_quantity,
                max_quantity,
                ..
            } => {
                self.min_quantity = *min_quantity;
                self.max_quantity = *max_quantity;
            }
        }
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn inbound(qty: i64, min: i64) -> StockCommand {
        StockCommand::RecordInbound(RecordInbound {
            product_id: ProductId::new(),
            inbound_no: "IN20250101001".into(),
            kind: InboundKind::Purchase,
            quantity: qty,
            weight: 0,
            unit_price: None,
            purchase_id: None,
            supplier_id: None,
            batch_no: None,
            remark: None,
            product_min_stock: min,
            operator: None,
            occurred_at: now(),
        })
    }

    fn outbound(qty: i64, min: i64) -> StockCommand {
        StockCommand::RecordOutbound(RecordOutbound {
            product_id: ProductId::new(),
            outbound_no: "OUT20250101001".into(),
            kind: OutboundKind::Sale,
            quantity: qty,
            weight: 0,
            order_id: None,
            reason: None,
            product_min_stock: min,
            alert_id: AlertId::new(),
            operator: None,
            occurred_at: now(),
        })
    }

    fn run(stock: &mut Stock, cmd: &StockCommand) -> DomainResult<Vec<StockEvent>> {
        let events = stock.handle(cmd)?;
        for event in &events {
            stock.apply(event);
        }
        Ok(events)
    }

    #[test]
    fn outbound_below_minimum_raises_a_warning() {
        let mut stock = Stock::empty(ProductId::new());
        run(&mut stock, &inbound(10, 5)).unwrap();

        let events = run(&mut stock, &outbound(6, 5)).unwrap();
        assert_eq!(stock.quantity(), 4);
        match &events[1] {
            StockEvent::AlertRaised {
                level,
                current_stock,
                min_stock,
                ..
            } => {
                assert_eq!(*level, AlertLevel::Warning);
                assert_eq!(*current_stock, 4);
                assert_eq!(*min_stock, 5);
            }
            other => panic!("expected AlertRaised, got {other:?}"),
        }
        assert!(stock.open_alert().is_some());
    }

    #[test]
    fn deep_drawdown_is_critical() {
        let mut stock = Stock::empty(ProductId::new());
        run(&mut stock, &inbound(10, 6)).unwrap();

        let events = run(&mut stock, &outbound(8, 6)).unwrap();
        // 2 remaining, minimum 6: at or below half the minimum.
        match &events[1] {
            StockEvent::AlertRaised { level, .. } => assert_eq!(*level, AlertLevel::Critical),
            other => panic!("expected AlertRaised, got {other:?}"),
        }
    }

    #[test]
    fn second_drawdown_does_not_stack_alerts() {
        let mut stock = Stock::empty(ProductId::new());
        run(&mut stock, &inbound(10, 5)).unwrap();
        run(&mut stock, &outbound(6, 5)).unwrap();

        let events = run(&mut stock, &outbound(1, 5)).unwrap();
        assert_eq!(events.len(), 1, "open alert must not be duplicated");
        assert!(stock.open_alert().is_some());
    }

    #[test]
    fn inbound_above_minimum_clears_the_alert() {
        let mut stock = Stock::empty(ProductId::new());
        run(&mut stock, &inbound(10, 5)).unwrap();
        run(&mut stock, &outbound(6, 5)).unwrap();

        let events = run(&mut stock, &inbound(5, 5)).unwrap();
        assert!(matches!(events[1], StockEvent::AlertCleared { .. }));
        assert!(stock.open_alert().is_none());
        assert_eq!(stock.quantity(), 9);
    }

    #[test]
    fn inbound_that_stays_at_minimum_keeps_the_alert() {
        let mut stock = Stock::empty(ProductId::new());
        run(&mut stock, &inbound(10, 5)).unwrap();
        run(&mut stock, &outbound(7, 5)).unwrap();

        // 3 + 2 = 5, not strictly above the minimum.
        let events = run(&mut stock, &inbound(2, 5)).unwrap();
        assert_eq!(events.len(), 1);
        assert!(stock.open_alert().is_some());
    }

    #[test]
    fn overdraw_is_rejected_with_context() {
        let mut stock = Stock::empty(ProductId::new());
        run(&mut stock, &inbound(3, 0)).unwrap();

        let err = stock.handle(&outbound(5, 0)).unwrap_err();
        match err {
            DomainError::InsufficientStock {
                requested, on_hand, ..
            } => {
                assert_eq!(requested, 5);
                assert_eq!(on_hand, 3);
            }
            other => panic!("expected InsufficientStock, got {other}"),
        }
        assert_eq!(stock.quantity(), 3);
    }

    #[test]
    fn zero_minimum_disables_alerting() {
        let mut stock = Stock::empty(ProductId::new());
        run(&mut stock, &inbound(10, 0)).unwrap();

        let events = run(&mut stock, &outbound(10, 0)).unwrap();
        assert_eq!(events.len(), 1);
        assert!(stock.open_alert().is_none());
    }

    #[test]
    fn override_minimum_wins_over_product_default() {
        let mut stock = Stock::empty(ProductId::new());
        run(&mut stock, &inbound(10, 2)).unwrap();
        let product_id = stock.product_id();
        run(
            &mut stock,
            &StockCommand::SetThresholds(SetThresholds {
                product_id,
                min_quantity: Some(8),
                max_quantity: None,
                occurred_at: now(),
            }),
        )
        .unwrap();

        // Product default of 2 would not fire at 7 remaining; the override does.
        let events = run(&mut stock, &outbound(3, 2)).unwrap();
        assert!(matches!(events[1], StockEvent::AlertRaised { .. }));
    }

    #[test]
    fn handling_the_open_alert_closes_it() {
        let mut stock = Stock::empty(ProductId::new());
        run(&mut stock, &inbound(10, 5)).unwrap();
        run(&mut stock, &outbound(6, 5)).unwrap();
        let alert_id = stock.open_alert().unwrap().alert_id;
        let product_id = stock.product_id();

        let events = run(
            &mut stock,
            &StockCommand::HandleAlert(HandleAlert {
                product_id,
                alert_id,
                operator: OperatorId::new(),
                occurred_at: now(),
            }),
        )
        .unwrap();
        assert!(matches!(events[0], StockEvent::AlertHandled { .. }));
        assert!(stock.open_alert().is_none());
    }

    #[test]
    fn handling_a_stale_alert_id_fails() {
        let mut stock = Stock::empty(ProductId::new());
        run(&mut stock, &inbound(10, 5)).unwrap();
        run(&mut stock, &outbound(6, 5)).unwrap();

        let err = stock
            .handle(&StockCommand::HandleAlert(HandleAlert {
                product_id: stock.product_id(),
                alert_id: AlertId::new(),
                operator: OperatorId::new(),
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    proptest! {
        /// Quantity always equals accepted inbound minus accepted outbound,
        /// never dips below zero, and at most one alert stays open.
        #[test]
        fn movements_reconcile(
            moves in proptest::collection::vec((any::<bool>(), 1i64..50), 1..60),
            min in 0i64..20,
        ) {
            let mut stock = Stock::empty(ProductId::new());
            let mut expected = 0i64;
            for (is_inbound, qty) in moves {
                let cmd = if is_inbound { inbound(qty, min) } else { outbound(qty, min) };
                match run(&mut stock, &cmd) {
                    Ok(_) => {
                        expected += if is_inbound { qty } else { -qty };
                    }
                    Err(DomainError::InsufficientStock { .. }) => {
                        prop_assert!(!is_inbound);
                        prop_assert!(qty > expected);
                    }
                    Err(other) => return Err(TestCaseError::fail(format!("{other}"))),
                }
                prop_assert!(stock.quantity() >= 0);
                prop_assert_eq!(stock.quantity(), expected);
            }
        }
    }
}
