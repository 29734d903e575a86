//! Walks one day of trading through the engines and prints the settlement.
//!
//! Run with `RUST_LOG=info` to watch the per-action log stream; set
//! `SHOPLEDGER_LOG=pretty` to get the plain-text log format.

use chrono::{TimeZone, Utc};

use shopledger_app::engines::{CreateOrderRequest, CreatePurchaseRequest, InboundRequest};
use shopledger_app::{ProductInfo, Shop};
use shopledger_core::{OperatorId, PaymentMethod, ProductId};
use shopledger_inventory::InboundKind;
use shopledger_orders::LineInput;
use shopledger_purchasing::{PurchaseLineInput, ReceiptLine};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match std::env::var("SHOPLEDGER_LOG").as_deref() {
        Ok("pretty") => shopledger_observability::init_pretty(),
        _ => shopledger_observability::init(),
    }

    let shop = Shop::new();
    let operator = OperatorId::new();
    let at = |hour: u32| {
        Utc.with_ymd_and_hms(2025, 3, 5, hour, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    };

    let rice = ProductId::new();
    shop.catalog().upsert(
        rice,
        ProductInfo {
            name: "Rice 5kg".into(),
            unit: "bag".into(),
            min_stock: 5,
        },
    );

    // Morning: goods arrive from the supplier.
    let supplier_id = shop
        .purchasing()
        .register_supplier("North Farm".into(), None, None, at(8))?;
    let po = shop.purchasing().create(CreatePurchaseRequest {
        supplier_id,
        lines: vec![PurchaseLineInput {
            product_id: rice,
            product_name: "Rice 5kg".into(),
            unit: "bag".into(),
            quantity: 20,
            weight: 100_000,
            unit_price: 2_200,
        }],
        remark: None,
        operator: Some(operator),
        occurred_at: at(8),
    })?;
    shop.purchasing().confirm(po.purchase_id(), at(8))?;
    shop.purchasing().receive(
        po.purchase_id(),
        vec![ReceiptLine {
            line_no: 1,
            quantity: 20,
            weight: 100_000,
        }],
        Some(operator),
        at(9),
    )?;
    shop.purchasing()
        .pay(po.purchase_id(), 44_000, PaymentMethod::Card, Some(operator), at(9))?;

    // A walk-in customer and a regular on credit.
    shop.order_engine().create_order(CreateOrderRequest {
        customer_id: None,
        lines: vec![LineInput {
            product_id: rice,
            product_name: "Rice 5kg".into(),
            unit: "bag".into(),
            quantity: 2,
            weight: 10_000,
            unit_price: 2_800,
        }],
        payment_method: PaymentMethod::Cash,
        discount_amount: 100,
        paid_amount: 5_500,
        received_amount: Some(6_000),
        remark: None,
        operator,
        occurred_at: at(10),
    })?;

    let customer_id = shop
        .credit()
        .register("Wang's Grocery".into(), Some("13800000000".into()), 50_000, at(11))?;
    let order = shop.order_engine().create_order(CreateOrderRequest {
        customer_id: Some(customer_id),
        lines: vec![LineInput {
            product_id: rice,
            product_name: "Rice 5kg".into(),
            unit: "bag".into(),
            quantity: 17,
            weight: 85_000,
            unit_price: 2_800,
        }],
        payment_method: PaymentMethod::Credit,
        discount_amount: 0,
        paid_amount: 0,
        received_amount: None,
        remark: None,
        operator,
        occurred_at: at(11),
    })?;
    // Fulfilling the big order drains stock below the minimum and raises
    // the low-stock alert in the log.
    shop.order_engine()
        .fulfill_line(order.id_typed(), 1, operator, at(11))?;

    // Evening: close the day.
    let settlement = shop.settlement().settle(at(23).date_naive(), at(23))?;
    println!("{}", serde_json::to_string_pretty(&settlement)?);
    Ok(())
}
