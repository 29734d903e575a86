//! Inventory service: movement recording, thresholds and the alert
//! lifecycle, with the product's default minimum resolved from the catalog.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use shopledger_core::{
    AlertId, DomainError, OperatorId, OrderId, ProductId, PurchaseOrderId, SupplierId,
};
use shopledger_events::JournalEntry;
use shopledger_inventory::{
    HandleAlert, InboundKind, OutboundKind, RecordInbound, RecordOutbound, SetThresholds, Stock,
    StockCommand, StockEvent,
};

use crate::error::AppResult;
use crate::Shop;

#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub product_id: ProductId,
    pub kind: InboundKind,
    pub quantity: i64,
    pub weight: i64,
    pub unit_price: Option<i64>,
    pub purchase_id: Option<PurchaseOrderId>,
    pub supplier_id: Option<SupplierId>,
    pub batch_no: Option<String>,
    pub remark: Option<String>,
    pub operator: Option<OperatorId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub product_id: ProductId,
    pub kind: OutboundKind,
    pub quantity: i64,
    pub weight: i64,
    pub order_id: Option<OrderId>,
    pub reason: Option<String>,
    pub operator: Option<OperatorId>,
    pub occurred_at: DateTime<Utc>,
}

pub struct InventoryService<'a> {
    shop: &'a Shop,
}

impl<'a> InventoryService<'a> {
    pub(crate) fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    /// Record goods arriving; returns the generated inbound number.
    pub fn inbound(&self, req: InboundRequest) -> AppResult<String> {
        let inbound_no = self.shop.numbers.next("IN", req.occurred_at.date_naive());
        let events = self
            .shop
            .stocks
            .execute(
                req.product_id,
                &StockCommand::RecordInbound(RecordInbound {
                    product_id: req.product_id,
                    inbound_no: inbound_no.clone(),
                    kind: req.kind,
                    quantity: req.quantity,
                    weight: req.weight,
                    unit_price: req.unit_price,
                    purchase_id: req.purchase_id,
                    supplier_id: req.supplier_id,
                    batch_no: req.batch_no,
                    remark: req.remark,
                    product_min_stock: self.shop.catalog.min_stock(req.product_id),
                    operator: req.operator,
                    occurred_at: req.occurred_at,
                }),
            )
            .inspect_err(|err| {
                warn!(product_id = %req.product_id, error = %err, "inbound rejected")
            })?;

        if events
            .iter()
            .any(|e| matches!(e, StockEvent::AlertCleared { .. }))
        {
            info!(product_id = %req.product_id, "low-stock alert cleared by inbound");
        }
        info!(%inbound_no, product_id = %req.product_id, quantity = req.quantity, "inbound recorded");
        Ok(inbound_no)
    }

    /// Record goods leaving; returns the generated outbound number.
    pub fn outbound(&self, req: OutboundRequest) -> AppResult<String> {
        let outbound_no = self.shop.numbers.next("OUT", req.occurred_at.date_naive());
        let events = self
            .shop
            .stocks
            .execute(
                req.product_id,
                &StockCommand::RecordOutbound(RecordOutbound {
                    product_id: req.product_id,
                    outbound_no: outbound_no.clone(),
                    kind: req.kind,
                    quantity: req.quantity,
                    weight: req.weight,
                    order_id: req.order_id,
                    reason: req.reason,
                    product_min_stock: self.shop.catalog.min_stock(req.product_id),
                    alert_id: AlertId::new(),
                    operator: req.operator,
                    occurred_at: req.occurred_at,
                }),
            )
            .inspect_err(|err| {
                warn!(product_id = %req.product_id, error = %err, "outbound rejected")
            })?;

        for event in &events {
            if let StockEvent::AlertRaised {
                level,
                current_stock,
                min_stock,
                ..
            } = event
            {
                warn!(
                    product_id = %req.product_id,
                    ?level,
                    current_stock,
                    min_stock,
                    "low-stock alert raised"
                );
            }
        }
        info!(%outbound_no, product_id = %req.product_id, quantity = req.quantity, "outbound recorded");
        Ok(outbound_no)
    }

    pub fn set_thresholds(
        &self,
        product_id: ProductId,
        min_quantity: Option<i64>,
        max_quantity: Option<i64>,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.shop.stocks.execute(
            product_id,
            &StockCommand::SetThresholds(SetThresholds {
                product_id,
                min_quantity,
                max_quantity,
                occurred_at,
            }),
        )?;
        info!(%product_id, ?min_quantity, ?max_quantity, "thresholds set");
        Ok(())
    }

    pub fn handle_alert(
        &self,
        product_id: ProductId,
        alert_id: AlertId,
        operator: OperatorId,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.shop
            .stocks
            .execute(
                product_id,
                &StockCommand::HandleAlert(HandleAlert {
                    product_id,
                    alert_id,
                    operator,
                    occurred_at,
                }),
            )
            .inspect_err(|err| warn!(%product_id, error = %err, "alert handling rejected"))?;
        info!(%product_id, %alert_id, "alert handled");
        Ok(())
    }

    /// Current stock state, or the implicit empty row for an untouched
    /// product.
    pub fn snapshot(&self, product_id: ProductId) -> AppResult<Stock> {
        Ok(self
            .shop
            .stocks
            .get(product_id)?
            .unwrap_or_else(|| Stock::empty(product_id)))
    }

    /// Every movement across all products, oldest first. Inbounds and
    /// outbounds interleave by business time.
    pub fn movement_log(&self) -> AppResult<Vec<JournalEntry>> {
        let mut entries = self
            .shop
            .journal
            .load_by_type("inventory.stock.inbound_recorded")?;
        entries.extend(
            self.shop
                .journal
                .load_by_type("inventory.stock.outbound_recorded")?,
        );
        entries.sort_by_key(|e| e.occurred_at);
        Ok(entries)
    }

    /// On-hand check without touching state.
    pub fn ensure_available(&self, product_id: ProductId, quantity: i64) -> AppResult<()> {
        let on_hand = self
            .shop
            .stocks
            .read(product_id, |s| s.quantity())?
            .unwrap_or(0);
        if quantity > on_hand {
            return Err(DomainError::InsufficientStock {
                product_id,
                requested: quantity,
                on_hand,
            }
            .into());
        }
        Ok(())
    }
}
