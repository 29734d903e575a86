//! Order engine: sales order lifecycle plus its fan-out to customers,
//! finance and (caller-driven) stock.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use shopledger_core::{
    Aggregate, CustomerId, DomainError, ExpectedVersion, OperatorId, OrderId, PaymentMethod,
};
use shopledger_finance::{FinanceCategory, FinanceType, LedgerCommand, RecordEntry};
use shopledger_inventory::OutboundKind;
use shopledger_orders::{
    AmendOrder, CancelOrder, CreateOrder, FulfillLine, LineInput, Order, OrderCommand,
    OrderStatus, RecordPayment,
};
use shopledger_parties::{CustomerCommand, ExtendCredit, RecordOrderStats};

use crate::engines::inventory::OutboundRequest;
use crate::error::{AppError, AppResult};
use crate::Shop;

#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<LineInput>,
    pub payment_method: PaymentMethod,
    pub discount_amount: i64,
    /// Amount settled up front. Ignored for credit sales, which always put
    /// the full net amount on the customer's tab.
    pub paid_amount: i64,
    pub received_amount: Option<i64>,
    pub remark: Option<String>,
    pub operator: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PayOrderRequest {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: i64,
    pub received_amount: Option<i64>,
    pub transaction_no: Option<String>,
    pub operator: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

pub struct OrderEngine<'a> {
    shop: &'a Shop,
}

impl<'a> OrderEngine<'a> {
    pub(crate) fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    /// Create a sales order.
    ///
    /// Credit sales extend the customer's credit by the net amount before the
    /// order is written, so a breached limit aborts the whole action with
    /// nothing recorded. A credit order counts the tab as its payment and is
    /// born completed, so no sale income is recorded at creation; the income
    /// lands at repayment time as a customer_repay entry. Stock is untouched;
    /// fulfilment deducts it later via [`OrderEngine::fulfill_line`].
    pub fn create_order(&self, req: CreateOrderRequest) -> AppResult<Order> {
        let on_credit = req.payment_method == PaymentMethod::Credit;
        if on_credit && req.customer_id.is_none() {
            return Err(DomainError::validation("a credit sale needs a customer").into());
        }
        if let Some(customer_id) = req.customer_id {
            let known = self
                .shop
                .customers
                .read(customer_id, |c| c.exists())?
                .unwrap_or(false);
            if !known {
                return Err(DomainError::not_found(format!("customer {customer_id}")).into());
            }
        }

        let order_id = OrderId::new();
        let order_no = self
            .shop
            .numbers
            .next("ORD", req.occurred_at.date_naive());

        // Net amount as the aggregate will compute it; the dry run below
        // re-validates the lines before anything is written.
        let gross: i64 = req.lines.iter().map(|l| l.quantity * l.unit_price).sum();
        let net = gross - req.discount_amount;

        let cmd = OrderCommand::CreateOrder(CreateOrder {
            order_id,
            order_no: order_no.clone(),
            customer_id: req.customer_id,
            customer_name: match req.customer_id {
                Some(id) => self.shop.customers.read(id, |c| c.name().to_string())?,
                None => None,
            },
            lines: req.lines,
            payment_method: req.payment_method,
            discount_amount: req.discount_amount,
            paid_amount: if on_credit { net } else { req.paid_amount },
            received_amount: req.received_amount,
            remark: req.remark,
            operator: req.operator,
            occurred_at: req.occurred_at,
        });

        // Dry run: surface validation errors before the credit write.
        Order::empty(order_id)
            .handle(&cmd)
            .inspect_err(|err| warn!(%order_no, error = %err, "order rejected"))?;

        if let Some(customer_id) = req.customer_id.filter(|_| on_credit) {
            self.shop
                .customers
                .execute(
                    customer_id,
                    &CustomerCommand::ExtendCredit(ExtendCredit {
                        customer_id,
                        amount: net,
                        order_id: Some(order_id),
                        remark: Some(format!("credit sale {order_no}")),
                        operator: Some(req.operator),
                        occurred_at: req.occurred_at,
                    }),
                )
                .inspect_err(|err| {
                    warn!(%order_no, %customer_id, error = %err, "credit sale refused")
                })?;
        }

        self.shop.orders.execute(order_id, &cmd)?;
        let order = self
            .shop
            .orders
            .get(order_id)?
            .ok_or_else(|| AppError::Domain(DomainError::not_found(format!("order {order_id}"))))?;

        if let Some(customer_id) = req.customer_id {
            self.shop.customers.execute(
                customer_id,
                &CustomerCommand::RecordOrderStats(RecordOrderStats {
                    customer_id,
                    order_amount: order.net_amount(),
                    occurred_at: req.occurred_at,
                }),
            )?;
        }

        // Cash-equivalent income only; credit income is recognized when the
        // customer repays.
        if !on_credit && order.paid_amount() > 0 {
            self.record_sale_income(
                order.paid_amount(),
                req.payment_method,
                &order_no,
                req.operator,
                req.occurred_at,
            )?;
        }

        info!(
            %order_no,
            net_amount = order.net_amount(),
            paid_amount = order.paid_amount(),
            status = ?order.status(),
            "order created"
        );
        Ok(order)
    }

    /// Record a further payment on an open order.
    pub fn pay(&self, req: PayOrderRequest) -> AppResult<Order> {
        let on_credit = req.method == PaymentMethod::Credit;
        let cmd = OrderCommand::RecordPayment(RecordPayment {
            order_id: req.order_id,
            method: req.method,
            amount: req.amount,
            received_amount: req.received_amount,
            transaction_no: req.transaction_no,
            operator: req.operator,
            occurred_at: req.occurred_at,
        });

        // Dry run so a stale or already-paid order fails before the credit
        // ledger is touched.
        let order = self
            .shop
            .orders
            .get(req.order_id)?
            .ok_or_else(|| DomainError::not_found(format!("order {}", req.order_id)))?;
        order
            .handle(&cmd)
            .inspect_err(|err| warn!(order_no = %order.order_no(), error = %err, "payment rejected"))?;

        if on_credit {
            let customer_id = order
                .customer_id()
                .ok_or_else(|| DomainError::validation("a credit payment needs a customer"))?;
            self.shop.customers.execute(
                customer_id,
                &CustomerCommand::ExtendCredit(ExtendCredit {
                    customer_id,
                    amount: req.amount,
                    order_id: Some(req.order_id),
                    remark: Some(format!("credit payment on {}", order.order_no())),
                    operator: Some(req.operator),
                    occurred_at: req.occurred_at,
                }),
            )?;
        }

        self.shop.orders.execute(req.order_id, &cmd)?;
        let order = self
            .shop
            .orders
            .get(req.order_id)?
            .ok_or_else(|| DomainError::not_found(format!("order {}", req.order_id)))?;

        if !on_credit {
            let order_no = order.order_no().to_string();
            self.record_sale_income(req.amount, req.method, &order_no, req.operator, req.occurred_at)?;
        }

        info!(
            order_no = %order.order_no(),
            paid_amount = order.paid_amount(),
            payment_status = ?order.payment_status(),
            "payment recorded"
        );
        Ok(order)
    }

    /// Cancel an open order. Already-extended credit and recorded income are
    /// left standing; corrections are explicit follow-up entries.
    pub fn cancel(&self, order_id: OrderId, occurred_at: DateTime<Utc>) -> AppResult<Order> {
        self.shop
            .orders
            .execute(
                order_id,
                &OrderCommand::CancelOrder(CancelOrder {
                    order_id,
                    occurred_at,
                }),
            )
            .inspect_err(|err| warn!(%order_id, error = %err, "cancel rejected"))?;
        let order = self
            .shop
            .orders
            .get(order_id)?
            .ok_or_else(|| DomainError::not_found(format!("order {order_id}")))?;
        info!(order_no = %order.order_no(), "order cancelled");
        Ok(order)
    }

    /// Restricted patch: remark and non-derived status only. The caller
    /// works from a snapshot, so the patch carries the snapshot's version
    /// and fails with `Conflict` when the order has moved on since.
    pub fn update(
        &self,
        order_id: OrderId,
        expected: ExpectedVersion,
        remark: Option<String>,
        status: Option<OrderStatus>,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<Order> {
        self.shop
            .orders
            .execute_expecting(
                order_id,
                expected,
                &OrderCommand::AmendOrder(AmendOrder {
                    order_id,
                    remark,
                    status,
                    occurred_at,
                }),
            )
            .inspect_err(|err| warn!(%order_id, error = %err, "update rejected"))?;
        self.shop
            .orders
            .get(order_id)?
            .ok_or_else(|| DomainError::not_found(format!("order {order_id}")).into())
    }

    /// Deduct stock for one fulfilled line, as an outbound sale movement
    /// keyed back to the order, and mark the line fulfilled on the order so
    /// a second attempt fails instead of double-deducting. Caller-driven:
    /// nothing here runs at order creation time.
    pub fn fulfill_line(
        &self,
        order_id: OrderId,
        line_no: u32,
        operator: OperatorId,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let order = self
            .shop
            .orders
            .get(order_id)?
            .ok_or_else(|| DomainError::not_found(format!("order {order_id}")))?;

        // Dry run: cancelled order, unknown line and an already fulfilled
        // line all fail here, before stock is touched.
        let cmd = OrderCommand::FulfillLine(FulfillLine {
            order_id,
            line_no,
            occurred_at,
        });
        order
            .handle(&cmd)
            .inspect_err(|err| warn!(order_no = %order.order_no(), line_no, error = %err, "fulfilment rejected"))?;
        let line = order
            .lines()
            .iter()
            .find(|l| l.line_no == line_no)
            .ok_or_else(|| {
                DomainError::not_found(format!("order {} line {line_no}", order.order_no()))
            })?;

        // Check first so a doomed movement does not consume an OUT number.
        self.shop
            .inventory()
            .ensure_available(line.product_id, line.quantity)?;
        self.shop.inventory().outbound(OutboundRequest {
            product_id: line.product_id,
            kind: OutboundKind::Sale,
            quantity: line.quantity,
            weight: line.weight,
            order_id: Some(order_id),
            reason: None,
            operator: Some(operator),
            occurred_at,
        })?;
        self.shop.orders.execute(order_id, &cmd)?;
        info!(order_no = %order.order_no(), line_no, "line fulfilled");
        Ok(())
    }

    pub fn snapshot(&self, order_id: OrderId) -> AppResult<Option<Order>> {
        self.shop.orders.get(order_id)
    }

    fn record_sale_income(
        &self,
        amount: i64,
        method: PaymentMethod,
        order_no: &str,
        operator: OperatorId,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let finance_no = self.shop.numbers.next("FIN", occurred_at.date_naive());
        self.shop.ledger.execute(
            self.shop.ledger_id,
            &LedgerCommand::RecordEntry(RecordEntry {
                finance_no,
                kind: FinanceType::Income,
                category: FinanceCategory::Sale,
                amount,
                method,
                related_no: Some(order_no.to_string()),
                remark: None,
                operator: Some(operator),
                occurred_at,
            }),
        )?;
        Ok(())
    }
}
