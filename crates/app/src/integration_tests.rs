//! Cross-aggregate flows through the engines, end to end against one `Shop`.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use shopledger_core::{
    AggregateRoot, DomainError, ExpectedVersion, OperatorId, PaymentMethod, ProductId,
};
use shopledger_finance::{FinanceCategory, FinanceType};
use shopledger_inventory::{AlertLevel, InboundKind};
use shopledger_orders::{LineInput, OrderStatus};
use shopledger_purchasing::{PurchaseLineInput, PurchaseStatus, ReceiptLine};

use crate::engines::{CreateOrderRequest, CreatePurchaseRequest, InboundRequest, PayOrderRequest};
use crate::{AppError, ProductInfo, Shop};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

fn at(d: u32, hour: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day(d).and_hms_opt(hour, 0, 0).unwrap())
}

fn product(shop: &Shop, name: &str, min_stock: i64) -> ProductId {
    let id = ProductId::new();
    shop.catalog().upsert(
        id,
        ProductInfo {
            name: name.into(),
            unit: "piece".into(),
            min_stock,
        },
    );
    id
}

fn line(product_id: ProductId, qty: i64, price: i64) -> LineInput {
    LineInput {
        product_id,
        product_name: "Soy Sauce".into(),
        unit: "piece".into(),
        quantity: qty,
        weight: 0,
        unit_price: price,
    }
}

fn order_req(lines: Vec<LineInput>, discount: i64, paid: i64) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_id: None,
        lines,
        payment_method: PaymentMethod::Cash,
        discount_amount: discount,
        paid_amount: paid,
        received_amount: None,
        remark: None,
        operator: OperatorId::new(),
        occurred_at: at(5, 10),
    }
}

#[test]
fn cash_order_settles_immediately_and_lands_in_finance() {
    let shop = Shop::new();
    let p = product(&shop, "Soy Sauce", 0);

    let order = shop
        .order_engine()
        .create_order(order_req(vec![line(p, 3, 1_000), line(p, 2, 500)], 500, 3_500))
        .unwrap();

    assert!(order.order_no().starts_with("ORD20250305"));
    assert_eq!(order.gross_amount(), 4_000);
    assert_eq!(order.net_amount(), 3_500);
    assert_eq!(order.status(), OrderStatus::Completed);
    assert!(order.payment_status().is_paid());

    let entries = shop.settlement().entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, FinanceType::Income);
    assert_eq!(entries[0].category, FinanceCategory::Sale);
    assert_eq!(entries[0].amount, 3_500);
    assert_eq!(entries[0].related_no.as_deref(), Some(order.order_no()));
}

#[test]
fn partial_then_final_payment_completes_the_order() {
    let shop = Shop::new();
    let p = product(&shop, "Soy Sauce", 0);

    let order = shop
        .order_engine()
        .create_order(order_req(vec![line(p, 5, 1_000)], 0, 2_000))
        .unwrap();
    assert_eq!(order.status(), OrderStatus::Pending);

    let order = shop
        .order_engine()
        .pay(PayOrderRequest {
            order_id: order.id_typed(),
            method: PaymentMethod::Wechat,
            amount: 3_000,
            received_amount: None,
            transaction_no: Some("wx-123".into()),
            operator: OperatorId::new(),
            occurred_at: at(5, 14),
        })
        .unwrap();
    assert_eq!(order.status(), OrderStatus::Completed);
    assert_eq!(order.paid_amount(), 5_000);

    let entries = shop.settlement().entries().unwrap();
    let amounts: Vec<i64> = entries.iter().map(|e| e.amount).collect();
    assert_eq!(amounts, vec![2_000, 3_000]);
}

#[test]
fn credit_sale_rides_on_the_customer_tab() {
    let shop = Shop::new();
    let p = product(&shop, "Soy Sauce", 0);
    let customer_id = shop
        .credit()
        .register("Wang's Grocery".into(), None, 10_000, at(1, 9))
        .unwrap();

    let mut req = order_req(vec![line(p, 3, 1_000)], 0, 0);
    req.customer_id = Some(customer_id);
    req.payment_method = PaymentMethod::Credit;
    let order = shop.order_engine().create_order(req).unwrap();

    // The full net amount went on the tab and the order counts as paid.
    assert_eq!(order.status(), OrderStatus::Completed);
    let customer = shop.credit().snapshot(customer_id).unwrap().unwrap();
    assert_eq!(customer.credit_balance(), 3_000);
    assert_eq!(customer.total_orders(), 1);
    assert_eq!(customer.total_spent(), 3_000);

    // No income yet; that comes with the repayment.
    assert!(shop.settlement().entries().unwrap().is_empty());

    shop.credit()
        .repay(customer_id, 3_000, PaymentMethod::Cash, None, None, at(9, 9))
        .unwrap();
    let customer = shop.credit().snapshot(customer_id).unwrap().unwrap();
    assert_eq!(customer.credit_balance(), 0);

    let entries = shop.settlement().entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].category, FinanceCategory::CustomerRepay);

    let log = shop.credit().credit_log(customer_id).unwrap();
    assert_eq!(log.len(), 2);
}

#[test]
fn breached_credit_limit_aborts_the_whole_sale() {
    let shop = Shop::new();
    let p = product(&shop, "Soy Sauce", 0);
    let customer_id = shop
        .credit()
        .register("Wang's Grocery".into(), None, 2_000, at(1, 9))
        .unwrap();

    let mut req = order_req(vec![line(p, 3, 1_000)], 0, 0);
    req.customer_id = Some(customer_id);
    req.payment_method = PaymentMethod::Credit;
    let err = shop.order_engine().create_order(req).unwrap_err();
    assert!(matches!(
        err.as_domain(),
        Some(DomainError::CreditLimitExceeded { .. })
    ));

    // Nothing was written anywhere.
    let customer = shop.credit().snapshot(customer_id).unwrap().unwrap();
    assert_eq!(customer.credit_balance(), 0);
    assert_eq!(customer.total_orders(), 0);
    assert!(shop.settlement().entries().unwrap().is_empty());
}

#[test]
fn fulfilment_deducts_stock_and_drives_the_alert_lifecycle() {
    let shop = Shop::new();
    let p = product(&shop, "Rice 5kg", 5);
    shop.inventory()
        .inbound(InboundRequest {
            product_id: p,
            kind: InboundKind::Adjust,
            quantity: 10,
            weight: 0,
            unit_price: None,
            purchase_id: None,
            supplier_id: None,
            batch_no: None,
            remark: Some("opening stock".into()),
            operator: None,
            occurred_at: at(2, 8),
        })
        .unwrap();

    let order = shop
        .order_engine()
        .create_order(order_req(vec![line(p, 6, 2_500)], 0, 15_000))
        .unwrap();
    // Creation never touches stock.
    assert_eq!(shop.inventory().snapshot(p).unwrap().quantity(), 10);

    shop.order_engine()
        .fulfill_line(order.id_typed(), 1, OperatorId::new(), at(5, 11))
        .unwrap();
    let stock = shop.inventory().snapshot(p).unwrap();
    assert_eq!(stock.quantity(), 4);
    let alert = stock.open_alert().expect("4 <= min 5 must alert");
    assert_eq!(alert.level, AlertLevel::Warning);

    // Restock above the minimum clears it.
    shop.inventory()
        .inbound(InboundRequest {
            product_id: p,
            kind: InboundKind::Purchase,
            quantity: 6,
            weight: 0,
            unit_price: None,
            purchase_id: None,
            supplier_id: None,
            batch_no: None,
            remark: None,
            operator: None,
            occurred_at: at(6, 8),
        })
        .unwrap();
    assert!(shop.inventory().snapshot(p).unwrap().open_alert().is_none());

    // The movement log interleaves all products' movements by business time.
    let log = shop.inventory().movement_log().unwrap();
    let types: Vec<&str> = log.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        types,
        vec![
            "inventory.stock.inbound_recorded",
            "inventory.stock.outbound_recorded",
            "inventory.stock.inbound_recorded",
        ]
    );
}

#[test]
fn a_fulfilled_line_cannot_be_fulfilled_again() {
    let shop = Shop::new();
    let p = product(&shop, "Rice 5kg", 0);
    shop.inventory()
        .inbound(InboundRequest {
            product_id: p,
            kind: InboundKind::Adjust,
            quantity: 10,
            weight: 0,
            unit_price: None,
            purchase_id: None,
            supplier_id: None,
            batch_no: None,
            remark: None,
            operator: None,
            occurred_at: at(2, 8),
        })
        .unwrap();

    let order = shop
        .order_engine()
        .create_order(order_req(vec![line(p, 4, 1_000)], 0, 4_000))
        .unwrap();
    shop.order_engine()
        .fulfill_line(order.id_typed(), 1, OperatorId::new(), at(5, 11))
        .unwrap();

    let err = shop
        .order_engine()
        .fulfill_line(order.id_typed(), 1, OperatorId::new(), at(5, 12))
        .unwrap_err();
    assert!(matches!(err.as_domain(), Some(DomainError::Conflict(_))));
    // Stock was deducted exactly once.
    assert_eq!(shop.inventory().snapshot(p).unwrap().quantity(), 6);
}

#[test]
fn a_stale_patch_is_refused() {
    let shop = Shop::new();
    let p = product(&shop, "Soy Sauce", 0);
    let order = shop
        .order_engine()
        .create_order(order_req(vec![line(p, 5, 1_000)], 0, 0))
        .unwrap();
    let seen = order.version();

    let updated = shop
        .order_engine()
        .update(
            order.id_typed(),
            ExpectedVersion::Exact(seen),
            Some("deliver before noon".into()),
            None,
            at(5, 11),
        )
        .unwrap();
    assert_eq!(updated.remark(), Some("deliver before noon"));

    // A second patch against the same stale snapshot surfaces the conflict.
    let err = shop
        .order_engine()
        .update(
            order.id_typed(),
            ExpectedVersion::Exact(seen),
            Some("actually, evening".into()),
            None,
            at(5, 12),
        )
        .unwrap_err();
    assert!(matches!(err.as_domain(), Some(DomainError::Conflict(_))));
}

#[test]
fn overdrawn_fulfilment_is_rejected_and_stock_untouched() {
    let shop = Shop::new();
    let p = product(&shop, "Rice 5kg", 0);
    shop.inventory()
        .inbound(InboundRequest {
            product_id: p,
            kind: InboundKind::Adjust,
            quantity: 2,
            weight: 0,
            unit_price: None,
            purchase_id: None,
            supplier_id: None,
            batch_no: None,
            remark: None,
            operator: None,
            occurred_at: at(2, 8),
        })
        .unwrap();

    let order = shop
        .order_engine()
        .create_order(order_req(vec![line(p, 5, 2_500)], 0, 0))
        .unwrap();
    let err = shop
        .order_engine()
        .fulfill_line(order.id_typed(), 1, OperatorId::new(), at(5, 11))
        .unwrap_err();
    assert!(matches!(
        err.as_domain(),
        Some(DomainError::InsufficientStock { requested: 5, on_hand: 2, .. })
    ));
    assert_eq!(shop.inventory().snapshot(p).unwrap().quantity(), 2);
}

#[test]
fn purchase_receipt_feeds_stock_and_supplier_payable() {
    let shop = Shop::new();
    let p = product(&shop, "Flour 25kg", 0);
    let supplier_id = shop
        .purchasing()
        .register_supplier("North Farm".into(), None, None, at(1, 9))
        .unwrap();

    let po = shop
        .purchasing()
        .create(CreatePurchaseRequest {
            supplier_id,
            lines: vec![PurchaseLineInput {
                product_id: p,
                product_name: "Flour 25kg".into(),
                unit: "bag".into(),
                quantity: 10,
                weight: 250_000,
                unit_price: 5_000,
            }],
            remark: None,
            operator: None,
            occurred_at: at(3, 9),
        })
        .unwrap();
    assert!(po.purchase_no().starts_with("PO20250303"));

    shop.purchasing().confirm(po.purchase_id(), at(3, 10)).unwrap();
    let po = shop
        .purchasing()
        .receive(
            po.purchase_id(),
            vec![ReceiptLine { line_no: 1, quantity: 8, weight: 200_000 }],
            None,
            at(4, 9),
        )
        .unwrap();

    assert_eq!(po.status(), PurchaseStatus::Received);
    assert_eq!(po.lines()[0].received_quantity, 8);
    // Stock reflects what actually arrived; payable reflects the order.
    assert_eq!(shop.inventory().snapshot(p).unwrap().quantity(), 8);
    assert_eq!(shop.credit_supplier_payable(supplier_id), Some(50_000));
}

#[test]
fn purchase_payments_pay_down_the_supplier_and_hit_expenses() {
    let shop = Shop::new();
    let p = product(&shop, "Flour 25kg", 0);
    let supplier_id = shop
        .purchasing()
        .register_supplier("North Farm".into(), None, None, at(1, 9))
        .unwrap();
    let po = shop
        .purchasing()
        .create(CreatePurchaseRequest {
            supplier_id,
            lines: vec![PurchaseLineInput {
                product_id: p,
                product_name: "Flour 25kg".into(),
                unit: "bag".into(),
                quantity: 10,
                weight: 0,
                unit_price: 5_000,
            }],
            remark: None,
            operator: None,
            occurred_at: at(3, 9),
        })
        .unwrap();
    shop.purchasing().confirm(po.purchase_id(), at(3, 10)).unwrap();
    shop.purchasing()
        .receive(po.purchase_id(), vec![ReceiptLine { line_no: 1, quantity: 10, weight: 0 }], None, at(4, 9))
        .unwrap();

    let po2 = shop
        .purchasing()
        .pay(po.purchase_id(), 30_000, PaymentMethod::Card, None, at(4, 15))
        .unwrap();
    assert_eq!(po2.paid_amount(), 30_000);
    assert_eq!(shop.credit_supplier_payable(supplier_id), Some(20_000));

    // Overpayment is refused before any fan-out.
    let err = shop
        .purchasing()
        .pay(po.purchase_id(), 25_000, PaymentMethod::Card, None, at(4, 16))
        .unwrap_err();
    assert!(matches!(err.as_domain(), Some(DomainError::OverPayment { .. })));
    assert_eq!(shop.credit_supplier_payable(supplier_id), Some(20_000));

    let po3 = shop
        .purchasing()
        .pay(po.purchase_id(), 20_000, PaymentMethod::Cash, None, at(4, 17))
        .unwrap();
    assert!(po3.payment_status().is_paid());
    assert_eq!(shop.credit_supplier_payable(supplier_id), Some(0));

    let expenses: Vec<i64> = shop
        .settlement()
        .entries()
        .unwrap()
        .iter()
        .filter(|e| e.category == FinanceCategory::Purchase)
        .map(|e| e.amount)
        .collect();
    assert_eq!(expenses, vec![30_000, 20_000]);
}

#[test]
fn received_purchase_cannot_be_cancelled() {
    let shop = Shop::new();
    let p = product(&shop, "Flour 25kg", 0);
    let supplier_id = shop
        .purchasing()
        .register_supplier("North Farm".into(), None, None, at(1, 9))
        .unwrap();
    let po = shop
        .purchasing()
        .create(CreatePurchaseRequest {
            supplier_id,
            lines: vec![PurchaseLineInput {
                product_id: p,
                product_name: "Flour 25kg".into(),
                unit: "bag".into(),
                quantity: 1,
                weight: 0,
                unit_price: 5_000,
            }],
            remark: None,
            operator: None,
            occurred_at: at(3, 9),
        })
        .unwrap();
    shop.purchasing().confirm(po.purchase_id(), at(3, 10)).unwrap();
    shop.purchasing()
        .receive(po.purchase_id(), vec![ReceiptLine { line_no: 1, quantity: 1, weight: 0 }], None, at(4, 9))
        .unwrap();

    let err = shop
        .purchasing()
        .cancel(po.purchase_id(), Some("changed our mind".into()), at(4, 10))
        .unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::InvalidState(_))));
}

#[test]
fn daily_settlement_folds_the_day_and_is_idempotent() {
    let shop = Shop::new();
    let p = product(&shop, "Soy Sauce", 0);

    shop.order_engine()
        .create_order(order_req(vec![line(p, 2, 1_000)], 0, 2_000))
        .unwrap();
    shop.settlement()
        .record_entry(
            FinanceType::Expense,
            FinanceCategory::Rent,
            1_500,
            PaymentMethod::Card,
            None,
            None,
            at(5, 18),
        )
        .unwrap();

    let settlement = shop.settlement().settle(day(5), at(5, 23)).unwrap();
    assert_eq!(settlement.total_income, 2_000);
    assert_eq!(settlement.total_expense, 1_500);
    assert_eq!(settlement.net_amount, 500);
    assert_eq!(settlement.order_count, 1);
    let breakdown_income: i64 = settlement.by_method.iter().map(|b| b.income).sum();
    assert_eq!(breakdown_income, settlement.total_income);

    let again = shop.settlement().settle(day(5), at(6, 1)).unwrap();
    assert_eq!(again, settlement);

    let summary = shop.settlement().summary(day(5), day(5)).unwrap();
    assert_eq!(summary.net_amount, 500);
}

impl Shop {
    /// Test helper: a supplier's current payable balance.
    fn credit_supplier_payable(&self, supplier_id: shopledger_core::SupplierId) -> Option<i64> {
        self.suppliers
            .read(supplier_id, |s| s.payable_balance())
            .ok()
            .flatten()
    }
}
